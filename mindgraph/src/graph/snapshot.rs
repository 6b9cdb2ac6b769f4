//! Point-in-time copies of the graph used for display, consolidation and wire export.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::edge::Edge;
use super::node::{Node, NodeKind, NodeStatus};

/// Copy of all nodes (insertion order) and the adjacency map, with edge states
/// recomputed from their targets at the time the snapshot was taken.
///
/// **Interaction**: Produced by [`SearchGraph::snapshot`](super::SearchGraph::snapshot);
/// consumed by [`crate::references::consolidate`] and [`crate::protocol`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub adjacency: BTreeMap<String, Vec<Edge>>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Root)
    }

    /// Search nodes that completed with an answer, in insertion order.
    pub fn answered_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_answered())
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    /// Completed / failed / pending search node ids.
    pub fn state_view(&self) -> GraphStateView {
        let mut view = GraphStateView::default();
        for node in self.nodes.iter().filter(|n| n.kind == NodeKind::Search) {
            match node.status {
                NodeStatus::Completed => view.completed.push(node.id.clone()),
                NodeStatus::Failed => view.failed.push(node.id.clone()),
                NodeStatus::Pending | NodeStatus::InProgress => view.pending.push(node.id.clone()),
            }
        }
        view
    }
}

/// Search node ids grouped by outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphStateView {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
    /// Pending or in progress.
    pub pending: Vec<String>,
}

impl GraphStateView {
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}
