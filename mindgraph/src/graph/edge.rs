//! Directed edges between nodes and their display state.

use serde::{Deserialize, Serialize};

use super::node::{Node, NodeKind, NodeStatus};

/// Progress of the work an edge leads to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    NotStarted,
    InProgress,
    Completed,
}

impl EdgeState {
    /// Derives the edge state from its target node.
    ///
    /// A failed target counts as `Completed`: nothing more will happen on that edge.
    pub fn for_target(target: &Node) -> Self {
        if target.kind != NodeKind::Search {
            return EdgeState::Completed;
        }
        match target.status {
            NodeStatus::Pending => EdgeState::NotStarted,
            NodeStatus::InProgress => EdgeState::InProgress,
            NodeStatus::Completed | NodeStatus::Failed => EdgeState::Completed,
        }
    }
}

/// Directed relation `from -> to`. Several edges may share a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    /// Random id, stable for the lifetime of the edge (used by renderers as a key).
    pub id: String,
    pub from: String,
    pub to: String,
    pub state: EdgeState,
}

impl Edge {
    pub(crate) fn new(from: impl Into<String>, to: impl Into<String>, state: EdgeState) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            from: from.into(),
            to: to.into(),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: edge state follows the target's status; failed counts as completed.
    #[test]
    fn state_follows_target_status() {
        let mut target = Node::search("s1", "q");
        assert_eq!(EdgeState::for_target(&target), EdgeState::NotStarted);
        target.status = NodeStatus::InProgress;
        assert_eq!(EdgeState::for_target(&target), EdgeState::InProgress);
        target.status = NodeStatus::Failed;
        assert_eq!(EdgeState::for_target(&target), EdgeState::Completed);
    }

    /// **Scenario**: edges into the response node are always completed.
    #[test]
    fn response_target_is_completed() {
        let response = Node::response("response");
        assert_eq!(EdgeState::for_target(&response), EdgeState::Completed);
    }

    /// **Scenario**: every edge gets its own id.
    #[test]
    fn edge_ids_are_unique() {
        let a = Edge::new("root", "s1", EdgeState::NotStarted);
        let b = Edge::new("root", "s1", EdgeState::NotStarted);
        assert_ne!(a.id, b.id);
    }
}
