//! Orchestrator: drives planner turns, applies plans, drains progress, synthesizes the answer.
//!
//! One run per question:
//!
//! 1. ask the [`Planner`] for a plan;
//! 2. extract and validate it, then execute it against the run's [`SearchGraph`]
//!    (which dispatches search workers);
//! 3. drain the graph's event queue into [`RunEvent::Progress`] until no worker is
//!    active or the [`ExecutionTracker`] flags termination;
//! 4. consolidate references; finish when the plan added the response node,
//!    otherwise feed the references back to the planner and repeat.
//!
//! Every run ends with exactly one [`RunEvent::Terminal`] carrying a non-empty answer.

mod summary;

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::agent::{
    Conversation, ConversationTurn, Planner, PlannerReply, SearchAgent, Summarizer, SummaryRequest,
};
use crate::config::{ConfigError, EngineConfig};
use crate::graph::SearchGraph;
use crate::plan::{extract_plan, requests_response, PlanInterpreter};
use crate::references::{consolidate, Consolidated, ReferenceMap};
use crate::stream::{GraphEvent, GraphEventKind, ProgressUpdate, RunEvent, RunOutcome, TerminalEvent};
use crate::tracker::{ExecutionTracker, TrackerLimits, TrackerState};
use crate::worker::WorkerPool;

use summary::termination_summary;

/// Errors from building an orchestrator. Runs themselves never fail.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid engine config: {0}")]
    Config(#[from] ConfigError),
}

/// How the turn loop ended.
enum LoopExit {
    Summarize(RunOutcome),
    Answer(String),
    Forced(RunOutcome, String),
}

/// The caller dropped the run stream; nothing is listening any more.
struct Detached;

/// Per-run state, created fresh for every question.
struct RunState {
    question: String,
    graph: Arc<SearchGraph>,
    tracker: Arc<ExecutionTracker>,
    conversation: Conversation,
    references: ReferenceMap,
    tx: mpsc::Sender<RunEvent>,
}

impl RunState {
    async fn emit(&self, event: RunEvent) -> Result<(), Detached> {
        self.tx.send(event).await.map_err(|_| Detached)
    }
}

/// Search-graph engine for one planner/search-agent/summarizer trio.
///
/// Cheap to clone; each [`Orchestrator::run`] builds its own graph, tracker and worker
/// pool, so concurrent runs are isolated.
#[derive(Clone)]
pub struct Orchestrator {
    planner: Arc<dyn Planner>,
    summarizer: Arc<dyn Summarizer>,
    search_agent: Arc<dyn SearchAgent>,
    config: EngineConfig,
    interpreter: PlanInterpreter,
}

impl Orchestrator {
    /// Validates `config` and wires the collaborators.
    pub fn new(
        planner: Arc<dyn Planner>,
        summarizer: Arc<dyn Summarizer>,
        search_agent: Arc<dyn SearchAgent>,
        config: EngineConfig,
    ) -> Result<Self, RunError> {
        config.validate()?;
        let interpreter = PlanInterpreter::new(config.plan_handle.clone());
        Ok(Self {
            planner,
            summarizer,
            search_agent,
            config,
            interpreter,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts a run in a background task and returns its event stream.
    ///
    /// The stream ends right after the [`RunEvent::Terminal`] event. Must be called inside
    /// a tokio runtime.
    pub fn run(&self, question: impl Into<String>) -> ReceiverStream<RunEvent> {
        let (tx, rx) = mpsc::channel(128);
        let this = self.clone();
        let question = question.into();
        tokio::spawn(async move {
            this.drive(question, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Runs to completion, calling `on_event` for every event; returns the terminal event.
    pub async fn run_with_callback<F>(
        &self,
        question: impl Into<String>,
        mut on_event: Option<F>,
    ) -> TerminalEvent
    where
        F: FnMut(&RunEvent),
    {
        let mut stream = self.run(question);
        let mut terminal = None;
        while let Some(event) = stream.next().await {
            if let Some(f) = on_event.as_mut() {
                f(&event);
            }
            if let RunEvent::Terminal(t) = event {
                terminal = Some(t);
            }
        }
        terminal.unwrap_or_else(|| TerminalEvent {
            final_answer: "The search ended unexpectedly before an answer was produced."
                .to_string(),
            references: ReferenceMap::new(),
            outcome: RunOutcome::CollaboratorFailed {
                reason: "run task ended without a terminal event".to_string(),
            },
        })
    }

    /// Runs to completion and returns only the terminal event.
    pub async fn invoke(&self, question: impl Into<String>) -> TerminalEvent {
        self.run_with_callback(question, None::<fn(&RunEvent)>)
            .await
    }

    async fn drive(&self, question: String, tx: mpsc::Sender<RunEvent>) {
        let tracker = Arc::new(ExecutionTracker::new(TrackerLimits::from(&self.config)));
        let pool = Arc::new(WorkerPool::from_config(
            Arc::clone(&self.search_agent),
            &self.config,
        ));
        let graph = Arc::new(
            SearchGraph::new(Arc::clone(&pool))
                .with_tracker(Arc::clone(&tracker))
                .with_root(question.as_str()),
        );

        let mut state = RunState {
            conversation: Conversation::new(question.as_str()),
            question,
            graph,
            tracker,
            references: ReferenceMap::new(),
            tx,
        };

        let exit = self.turn_loop(&mut state).await;
        pool.halt();
        let Ok(exit) = exit else {
            tracing::info!("run stream dropped by caller; stopping run");
            pool.shutdown().await;
            return;
        };
        let terminal = self.finish(&state, exit).await;
        tracing::info!(
            outcome = ?terminal.outcome,
            references = terminal.references.len(),
            "run finished"
        );
        if state.emit(RunEvent::Terminal(terminal)).await.is_err() {
            tracing::debug!("terminal event not delivered: run stream dropped");
        }
        pool.shutdown().await;
    }

    /// Planner turns until a finish, a forced exit or a dropped stream.
    async fn turn_loop(&self, state: &mut RunState) -> Result<LoopExit, Detached> {
        for turn in 1..=self.config.max_turn {
            if let Some(exit) = forced_exit(&state.tracker) {
                return Ok(exit);
            }
            if state.tx.is_closed() {
                return Err(Detached);
            }
            tracing::info!(turn, "planner turn");

            let plan_text = match self.planner.plan(&state.conversation).await {
                Ok(PlannerReply::Plan(text)) => text,
                Ok(PlannerReply::Summarize) => {
                    return Ok(LoopExit::Summarize(RunOutcome::Finished));
                }
                Ok(PlannerReply::Answer(text)) => return Ok(LoopExit::Answer(text)),
                Err(e) => {
                    tracing::warn!(turn, error = %e, "planner failed");
                    let reason = format!("planner failed: {}", e);
                    return Ok(LoopExit::Forced(
                        RunOutcome::CollaboratorFailed {
                            reason: reason.clone(),
                        },
                        reason,
                    ));
                }
            };

            let plan = extract_plan(&plan_text);
            let instructions = match self.interpreter.validate(&plan) {
                Ok(instructions) if instructions.is_empty() => {
                    self.reject(state, turn, plan, "plan contains no instructions".to_string())
                        .await?;
                    continue;
                }
                Ok(instructions) => instructions,
                Err(e) => {
                    self.reject(state, turn, plan, e.to_string()).await?;
                    continue;
                }
            };

            let finish = requests_response(&instructions);
            let outcome = match self.interpreter.execute(&instructions, &state.graph) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.reject(state, turn, plan, e.to_string()).await?;
                    continue;
                }
            };
            let errors: Vec<String> = outcome.errors.iter().map(|e| e.to_string()).collect();
            state
                .emit(RunEvent::PlanApplied {
                    turn,
                    instructions: instructions.len(),
                    errors: errors.clone(),
                })
                .await?;

            self.drain(state).await?;
            let consolidated = consolidate(&state.graph.snapshot());
            state.references = consolidated.references.clone();

            if let Some(exit) = forced_exit(&state.tracker) {
                return Ok(exit);
            }
            if finish {
                return Ok(LoopExit::Summarize(RunOutcome::Finished));
            }
            state.conversation.turns.push(ConversationTurn {
                plan,
                feedback: feedback(&consolidated, &errors),
            });
        }
        Ok(LoopExit::Summarize(RunOutcome::TurnLimitReached))
    }

    async fn reject(
        &self,
        state: &mut RunState,
        turn: usize,
        plan: String,
        reason: String,
    ) -> Result<(), Detached> {
        tracing::warn!(turn, %reason, "plan rejected");
        state
            .emit(RunEvent::PlanRejected {
                turn,
                reason: reason.clone(),
            })
            .await?;
        state.conversation.turns.push(ConversationTurn {
            plan,
            feedback: format!("Plan rejected: {}", reason),
        });
        Ok(())
    }

    /// Forwards graph events until no worker is active or termination is flagged.
    ///
    /// Stops early with [`Detached`] once the caller has dropped the stream.
    async fn drain(&self, state: &mut RunState) -> Result<(), Detached> {
        let graph = Arc::clone(&state.graph);
        loop {
            while let Some(event) = graph.collector().try_next().await {
                self.forward(state, event).await?;
            }
            if state.tracker.should_terminate() {
                graph.pool().halt();
                return Ok(());
            }
            if graph.active_task_count() == 0 {
                // Workers publish before releasing their slot; pick up the last events.
                while let Some(event) = graph.collector().try_next().await {
                    self.forward(state, event).await?;
                }
                return Ok(());
            }
            if state.tx.is_closed() {
                return Err(Detached);
            }
            if let Some(event) = graph
                .collector()
                .next_timeout(self.config.drain_poll_interval)
                .await
            {
                self.forward(state, event).await?;
            }
        }
    }

    async fn forward(&self, state: &mut RunState, event: GraphEvent) -> Result<(), Detached> {
        if event.kind == GraphEventKind::NodeCompleted {
            state.references = consolidate(&state.graph.snapshot()).references;
        }
        let update = ProgressUpdate {
            current_node_id: event.node_id,
            kind: event.kind,
            node: event.node,
            adjacency: state.graph.adjacency_list(),
            references: state.references.clone(),
        };
        state.emit(RunEvent::Progress(update)).await
    }

    async fn finish(&self, state: &RunState, exit: LoopExit) -> TerminalEvent {
        let snapshot = state.graph.snapshot();
        let consolidated = consolidate(&snapshot);
        let forced = |outcome: RunOutcome, reason: &str| TerminalEvent {
            final_answer: termination_summary(
                &state.question,
                reason,
                &state.tracker.summary(),
                &snapshot,
                &consolidated,
            ),
            references: consolidated.references.clone(),
            outcome,
        };

        match exit {
            LoopExit::Forced(outcome, reason) => forced(outcome, &reason),
            LoopExit::Answer(text) if !text.trim().is_empty() => {
                state.tracker.mark_drained();
                TerminalEvent {
                    final_answer: text,
                    references: consolidated.references.clone(),
                    outcome: RunOutcome::Answered,
                }
            }
            LoopExit::Answer(_) => forced(
                RunOutcome::CollaboratorFailed {
                    reason: "planner returned an empty answer".to_string(),
                },
                "the planner returned an empty answer",
            ),
            LoopExit::Summarize(outcome) => {
                let request = SummaryRequest {
                    question: state.question.clone(),
                    references_text: consolidated.text.clone(),
                    references: consolidated.references.clone(),
                };
                match self.summarizer.summarize(request).await {
                    Ok(answer) if !answer.trim().is_empty() => {
                        state.tracker.mark_drained();
                        TerminalEvent {
                            final_answer: answer,
                            references: consolidated.references.clone(),
                            outcome,
                        }
                    }
                    Ok(_) => forced(
                        RunOutcome::CollaboratorFailed {
                            reason: "summarizer returned an empty answer".to_string(),
                        },
                        "the summarizer returned an empty answer",
                    ),
                    Err(e) => {
                        tracing::warn!(error = %e, "summarizer failed");
                        let reason = format!("summarizer failed: {}", e);
                        forced(
                            RunOutcome::CollaboratorFailed {
                                reason: reason.clone(),
                            },
                            &reason,
                        )
                    }
                }
            }
        }
    }
}

/// Forced exit when the tracker flagged a loop or timeout.
fn forced_exit(tracker: &ExecutionTracker) -> Option<LoopExit> {
    tracker.should_terminate();
    match tracker.state() {
        TrackerState::LoopDetected => {
            let pattern = tracker.loop_pattern()?;
            let reason = format!("loop detected ({})", pattern);
            Some(LoopExit::Forced(RunOutcome::LoopDetected { pattern }, reason))
        }
        TrackerState::TimedOut => Some(LoopExit::Forced(
            RunOutcome::TimedOut,
            "the time budget was exhausted".to_string(),
        )),
        TrackerState::Running | TrackerState::NormallyDrained => None,
    }
}

/// Feedback for the next planner turn: the consolidated references, then failed calls.
fn feedback(consolidated: &Consolidated, errors: &[String]) -> String {
    let mut out = if consolidated.text.is_empty() {
        "No search results are available yet.".to_string()
    } else {
        consolidated.text.clone()
    };
    if !errors.is_empty() {
        out.push_str("\n\nFailed graph calls:");
        for e in errors {
            out.push_str("\n- ");
            out.push_str(e);
        }
    }
    out
}
