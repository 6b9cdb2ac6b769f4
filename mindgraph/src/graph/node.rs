//! Node types for the search-task graph: kind, status, search answer.
//!
//! A [`Node`] is only ever handed out as a copy; the live record stays inside
//! [`SearchGraph`](super::SearchGraph) and is written by exactly one worker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Role of a node in the plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The user question; exactly one per graph, created first.
    Root,
    /// One sub-search dispatched to the worker pool.
    Search,
    /// Marks that the planner considers the graph complete; owns no work.
    Response,
}

/// Execution status of a node.
///
/// Search nodes move `Pending -> InProgress -> Completed | Failed`. Root and
/// response nodes are created `Completed` because they carry no work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl NodeStatus {
    /// True once the node will not change anymore.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }
}

/// Answer produced by the search agent for one node: text with `[[n]]`
/// markers plus the node-local citation map (`n -> url`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchAnswer {
    pub text: String,
    #[serde(default)]
    pub citations: BTreeMap<u32, String>,
}

impl SearchAnswer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: BTreeMap::new(),
        }
    }

    /// Adds one local citation (builder).
    pub fn with_citation(mut self, number: u32, url: impl Into<String>) -> Self {
        self.citations.insert(number, url.into());
        self
    }
}

/// One planning unit of the search graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Unique name assigned by the planner (`"root"` for the root node).
    pub id: String,
    /// Root: the question. Search: the sub-query. Response: empty.
    pub content: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    #[serde(default)]
    pub result: Option<SearchAnswer>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Node {
    pub(crate) fn root(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: question.into(),
            kind: NodeKind::Root,
            status: NodeStatus::Completed,
            result: None,
            error: None,
        }
    }

    pub(crate) fn search(id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: query.into(),
            kind: NodeKind::Search,
            status: NodeStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub(crate) fn response(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            kind: NodeKind::Response,
            status: NodeStatus::Completed,
            result: None,
            error: None,
        }
    }

    /// True for a search node that finished with an answer.
    pub fn is_answered(&self) -> bool {
        self.kind == NodeKind::Search
            && self.status == NodeStatus::Completed
            && self.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: search nodes start pending; root and response start completed.
    #[test]
    fn constructors_set_initial_status() {
        assert_eq!(Node::search("s1", "q").status, NodeStatus::Pending);
        assert_eq!(Node::root("root", "q").status, NodeStatus::Completed);
        let response = Node::response("response");
        assert_eq!(response.kind, NodeKind::Response);
        assert!(response.content.is_empty());
    }

    /// **Scenario**: status enums serialize in snake_case.
    #[test]
    fn status_serializes_snake_case() {
        let v = serde_json::to_value(NodeStatus::InProgress).unwrap();
        assert_eq!(v, "in_progress");
        let kind: NodeKind = serde_json::from_value(serde_json::json!("response")).unwrap();
        assert_eq!(kind, NodeKind::Response);
    }

    /// **Scenario**: a node deserializes without result/error fields.
    #[test]
    fn node_deserializes_with_defaults() {
        let node: Node = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "content": "weather",
            "kind": "search",
            "status": "pending"
        }))
        .unwrap();
        assert!(node.result.is_none());
        assert!(node.error.is_none());
        assert!(!node.is_answered());
    }
}
