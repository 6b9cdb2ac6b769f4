//! Caller-facing events produced by [`Orchestrator::run`](crate::orchestrator::Orchestrator::run).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Node};
use crate::references::ReferenceMap;
use crate::tracker::LoopPattern;

use super::GraphEventKind;

/// One progress update, republished from a graph event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub current_node_id: String,
    pub kind: GraphEventKind,
    /// Copy of the node at the time of the event.
    pub node: Option<Node>,
    /// Whole adjacency map, edge states refreshed.
    pub adjacency: BTreeMap<String, Vec<Edge>>,
    /// References consolidated from the nodes completed so far.
    pub references: ReferenceMap,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// A plan added the response node and the summarizer produced the answer.
    Finished,
    /// The planner answered directly without more graph work.
    Answered,
    /// Turn budget exhausted; the summarizer ran on what was gathered.
    TurnLimitReached,
    /// Forced termination: revisits or a repeating visit pattern.
    LoopDetected { pattern: LoopPattern },
    /// Forced termination: the run exceeded its wall-clock budget.
    TimedOut,
    /// The planner (or summarizer) failed; the answer is a partial summary.
    CollaboratorFailed { reason: String },
}

impl RunOutcome {
    /// True when the answer was built without the summarizer's normal path.
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            RunOutcome::LoopDetected { .. }
                | RunOutcome::TimedOut
                | RunOutcome::CollaboratorFailed { .. }
        )
    }
}

/// Last event of every run. `final_answer` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalEvent {
    pub final_answer: String,
    pub references: ReferenceMap,
    pub outcome: RunOutcome,
}

/// Event yielded by a run stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A node or edge changed.
    Progress(ProgressUpdate),
    /// A plan passed validation and was applied; `errors` lists failed calls.
    PlanApplied {
        turn: usize,
        instructions: usize,
        errors: Vec<String>,
    },
    /// A plan was rejected by validation; the graph was not touched.
    PlanRejected { turn: usize, reason: String },
    Terminal(TerminalEvent),
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Terminal(_))
    }
}
