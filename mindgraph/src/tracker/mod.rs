//! Execution tracker: counts node visits, detects revisit loops, enforces the run budget.
//!
//! State machine per run: `Running -> LoopDetected | TimedOut | NormallyDrained`. Once a
//! terminal state is reached it sticks. The tracker never stops work itself; the
//! orchestrator polls [`ExecutionTracker::should_terminate`] and halts dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Tracker state; every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Running,
    LoopDetected,
    TimedOut,
    NormallyDrained,
}

impl TrackerState {
    pub fn is_terminal(self) -> bool {
        self != TrackerState::Running
    }
}

/// What triggered loop detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopPattern {
    /// One node was visited more than the allowed number of times.
    Revisited { node_id: String, visits: u32 },
    /// The recent visit window ends in two equal adjacent runs of this sequence.
    Cycle { nodes: Vec<String> },
}

impl fmt::Display for LoopPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPattern::Revisited { node_id, visits } => {
                write!(f, "node \"{}\" visited {} times", node_id, visits)
            }
            LoopPattern::Cycle { nodes } => write!(f, "cyclic pattern: {}", nodes.join(" -> ")),
        }
    }
}

/// One visit, appended by [`ExecutionTracker::record_visit`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    /// Visits of this node so far, including this one.
    pub visit_count: u32,
    /// Tracker state right after this visit was recorded.
    pub flag: TrackerState,
}

/// Limits the tracker enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerLimits {
    pub max_node_visits: u32,
    /// Number of most recent visits inspected by the cycle check.
    pub window_size: usize,
    pub execution_timeout: Duration,
}

impl Default for TrackerLimits {
    fn default() -> Self {
        Self {
            max_node_visits: 3,
            window_size: 10,
            execution_timeout: Duration::from_secs(300),
        }
    }
}

impl From<&EngineConfig> for TrackerLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_node_visits: config.max_node_visits,
            window_size: config.loop_window,
            execution_timeout: config.execution_timeout,
        }
    }
}

/// Counters for the termination summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub total_visits: usize,
    pub unique_nodes: usize,
    pub elapsed: Duration,
    pub state: TrackerState,
    pub loop_pattern: Option<LoopPattern>,
}

struct TrackerInner {
    started: Instant,
    visits: HashMap<String, u32>,
    records: Vec<ExecutionRecord>,
    state: TrackerState,
    loop_pattern: Option<LoopPattern>,
}

impl TrackerInner {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            visits: HashMap::new(),
            records: Vec::new(),
            state: TrackerState::Running,
            loop_pattern: None,
        }
    }
}

/// Per-run visit log and termination guard.
///
/// **Interaction**: Shared (`Arc`) between the [`SearchGraph`](crate::graph::SearchGraph), which
/// records a visit on every search-node add, and the orchestrator, which polls it.
pub struct ExecutionTracker {
    limits: TrackerLimits,
    inner: Mutex<TrackerInner>,
}

impl ExecutionTracker {
    pub fn new(limits: TrackerLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(TrackerInner::new()),
        }
    }

    pub fn limits(&self) -> TrackerLimits {
        self.limits
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records one dispatch or revisit of `node_id` and runs loop detection.
    pub fn record_visit(&self, node_id: &str) -> TrackerState {
        let mut inner = self.lock();
        let count = {
            let c = inner.visits.entry(node_id.to_string()).or_insert(0);
            *c += 1;
            *c
        };

        if inner.state == TrackerState::Running {
            let window_start = inner
                .records
                .len()
                .saturating_sub(self.limits.window_size.saturating_sub(1));
            let mut window: Vec<&str> = inner.records[window_start..]
                .iter()
                .map(|r| r.node_id.as_str())
                .collect();
            window.push(node_id);

            let pattern = if count > self.limits.max_node_visits {
                Some(LoopPattern::Revisited {
                    node_id: node_id.to_string(),
                    visits: count,
                })
            } else {
                find_cycle(&window).map(|nodes| LoopPattern::Cycle { nodes })
            };
            if let Some(pattern) = pattern {
                tracing::warn!(node_id = %node_id, visits = count, %pattern, "loop detected");
                inner.state = TrackerState::LoopDetected;
                inner.loop_pattern = Some(pattern);
            }
        }

        let flag = inner.state;
        inner.records.push(ExecutionRecord {
            node_id: node_id.to_string(),
            timestamp: Utc::now(),
            visit_count: count,
            flag,
        });
        flag
    }

    /// Current state, latching `TimedOut` when the budget is exceeded.
    pub fn poll(&self) -> TrackerState {
        let mut inner = self.lock();
        if inner.state == TrackerState::Running
            && inner.started.elapsed() > self.limits.execution_timeout
        {
            tracing::warn!(
                elapsed_ms = inner.started.elapsed().as_millis() as u64,
                "execution time limit exceeded"
            );
            inner.state = TrackerState::TimedOut;
        }
        inner.state
    }

    /// True once a loop or timeout was flagged.
    pub fn should_terminate(&self) -> bool {
        matches!(
            self.poll(),
            TrackerState::LoopDetected | TrackerState::TimedOut
        )
    }

    /// Marks a normal end of the run. No effect once another terminal state is set.
    pub fn mark_drained(&self) {
        let mut inner = self.lock();
        if inner.state == TrackerState::Running {
            inner.state = TrackerState::NormallyDrained;
        }
    }

    pub fn state(&self) -> TrackerState {
        self.lock().state
    }

    pub fn loop_pattern(&self) -> Option<LoopPattern> {
        self.lock().loop_pattern.clone()
    }

    pub fn visits(&self, node_id: &str) -> u32 {
        self.lock().visits.get(node_id).copied().unwrap_or(0)
    }

    pub fn elapsed(&self) -> Duration {
        self.lock().started.elapsed()
    }

    /// Copy of the append-only visit log.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.lock().records.clone()
    }

    pub fn summary(&self) -> ExecutionSummary {
        let inner = self.lock();
        ExecutionSummary {
            total_visits: inner.records.len(),
            unique_nodes: inner.visits.len(),
            elapsed: inner.started.elapsed(),
            state: inner.state,
            loop_pattern: inner.loop_pattern.clone(),
        }
    }

    /// Clears visits and records and restarts the clock.
    pub fn reset(&self) {
        *self.lock() = TrackerInner::new();
    }
}

/// First sequence (length >= 2, shortest first) that appears twice back to back in `window`.
fn find_cycle(window: &[&str]) -> Option<Vec<String>> {
    let len = window.len();
    for cycle_len in 2..=len / 2 {
        for start in 0..=(len - 2 * cycle_len) {
            let first = &window[start..start + cycle_len];
            let second = &window[start + cycle_len..start + 2 * cycle_len];
            if first == second {
                return Some(first.iter().map(|s| s.to_string()).collect());
            }
        }
    }
    None
}
