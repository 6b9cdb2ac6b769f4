//! Ordered multi-producer / single-consumer queue of graph change events.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use crate::graph::{Edge, Node};

/// What changed on the graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphEventKind {
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    EdgeAdded,
    ResponseAdded,
}

/// One "node updated" event: the node copy and, for edge events, the source's
/// outgoing edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphEvent {
    pub node_id: String,
    pub kind: GraphEventKind,
    pub node: Option<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Single queue shared by all producers, so events come out in the order they were pushed.
///
/// The sender never closes while the collector lives, so `push` cannot fail; the
/// receiver sits behind an async mutex because there is exactly one consumer.
///
/// **Interaction**: Owned by [`SearchGraph`](crate::graph::SearchGraph); pushed to by the
/// worker pool and graph mutators; drained by the orchestrator.
pub struct StreamCollector {
    tx: mpsc::UnboundedSender<GraphEvent>,
    rx: Mutex<mpsc::UnboundedReceiver<GraphEvent>>,
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCollector {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn push(&self, event: GraphEvent) {
        let _ = self.tx.send(event);
    }

    /// Next queued event without waiting.
    pub async fn try_next(&self) -> Option<GraphEvent> {
        self.rx.lock().await.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub async fn next_timeout(&self, timeout: Duration) -> Option<GraphEvent> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// All currently queued events, in order.
    pub async fn drain(&self) -> Vec<GraphEvent> {
        let mut rx = self.rx.lock().await;
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }
}
