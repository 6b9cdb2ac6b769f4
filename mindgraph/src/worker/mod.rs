//! Search worker pool: one task per search node, bounded by a semaphore.
//!
//! Each worker owns its node from dispatch to completion: it marks the node in
//! progress, builds the ancestor history, calls the [`SearchAgent`] under the per-node
//! timeout and writes the answer (or error) back. A drop guard always publishes the
//! finish event and releases the active-task slot, even if the agent panics.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::agent::{SearchAgent, SearchRequest};
use crate::config::EngineConfig;
use crate::graph::{SearchAnswer, SearchGraph};

/// Failure of one search node; recorded on the node as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("search failed: {0}")]
    Failed(String),
    #[error("search timed out after {0:?}")]
    Timeout(Duration),
    #[error("dispatch halted: run is terminating")]
    Halted,
}

/// Bounded pool of search workers shared by every node of one graph.
///
/// **Interaction**: [`SearchGraph::add_search_node`] calls [`WorkerPool::dispatch`]; the
/// orchestrator calls [`WorkerPool::halt`] when the tracker flags termination and
/// [`WorkerPool::shutdown`] at the end of a run.
pub struct WorkerPool {
    agent: Arc<dyn SearchAgent>,
    permits: Option<Arc<Semaphore>>,
    node_timeout: Duration,
    halted: AtomicBool,
    tasks: TaskTracker,
}

impl WorkerPool {
    /// `max_workers: None` leaves concurrency unbounded.
    pub fn new(
        agent: Arc<dyn SearchAgent>,
        max_workers: Option<usize>,
        node_timeout: Duration,
    ) -> Self {
        Self {
            agent,
            permits: max_workers.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            node_timeout,
            halted: AtomicBool::new(false),
            tasks: TaskTracker::new(),
        }
    }

    pub fn from_config(agent: Arc<dyn SearchAgent>, config: &EngineConfig) -> Self {
        Self::new(agent, config.max_workers, config.node_timeout())
    }

    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    /// Stops dispatching and closes the permit queue.
    ///
    /// Searches already running finish; workers still waiting for a permit or not yet
    /// started fail their node with [`SearchError::Halted`] without calling the agent.
    pub fn halt(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            if let Some(permits) = &self.permits {
                permits.close();
            }
            tracing::info!(in_flight = self.tasks.len(), "worker pool halted");
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Halts, then waits for every spawned worker to finish.
    pub async fn shutdown(&self) {
        self.halt();
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// Spawns the worker for `node_id`, or fails the node when the pool is halted.
    ///
    /// Returns whether a worker was spawned. Must be called inside a tokio runtime.
    pub(crate) fn dispatch(&self, graph: Arc<SearchGraph>, node_id: String) -> bool {
        if self.is_halted() {
            graph.reject_dispatch(&node_id);
            return false;
        }
        graph.begin_task();
        let worker = Worker {
            graph,
            node_id,
            agent: Arc::clone(&self.agent),
            permits: self.permits.clone(),
            timeout: self.node_timeout,
        };
        self.tasks.spawn(worker.run());
        true
    }
}

/// Releases the node's active-task slot when the worker ends, however it ends.
struct FinishGuard {
    graph: Arc<SearchGraph>,
    node_id: String,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.graph.finish_task(&self.node_id);
    }
}

struct Worker {
    graph: Arc<SearchGraph>,
    node_id: String,
    agent: Arc<dyn SearchAgent>,
    permits: Option<Arc<Semaphore>>,
    timeout: Duration,
}

impl Worker {
    async fn run(self) {
        let _guard = FinishGuard {
            graph: Arc::clone(&self.graph),
            node_id: self.node_id.clone(),
        };
        let _permit = match &self.permits {
            Some(sem) => match Arc::clone(sem).acquire_owned().await {
                Ok(p) => Some(p),
                // Closed by halt while queued.
                Err(_) => return self.abandon(),
            },
            None => None,
        };
        if self.graph.pool().is_halted() {
            return self.abandon();
        }

        let Some(node) = self.graph.start_node(&self.node_id) else {
            return;
        };
        let request = SearchRequest {
            query: node.content,
            topic: self.graph.root().map(|r| r.content).unwrap_or_default(),
            history: self.graph.ancestor_history(&self.node_id),
        };
        tracing::debug!(
            node_id = %self.node_id,
            history = request.history.len(),
            "search worker started"
        );

        let outcome = self.search(request).await;
        match &outcome {
            Ok(answer) => tracing::debug!(
                node_id = %self.node_id,
                citations = answer.citations.len(),
                "search node completed"
            ),
            Err(e) => tracing::warn!(node_id = %self.node_id, error = %e, "search node failed"),
        }
        self.graph.settle_node(&self.node_id, outcome);
    }

    fn abandon(&self) {
        tracing::debug!(node_id = %self.node_id, "search skipped: pool halted");
        self.graph.settle_node(&self.node_id, Err(SearchError::Halted));
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchAnswer, SearchError> {
        let call = AssertUnwindSafe(self.agent.search(request)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SearchError::Failed("search agent panicked".to_string())),
            Err(_) => Err(SearchError::Timeout(self.timeout)),
        }
    }
}
