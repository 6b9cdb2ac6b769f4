//! Search-task graph: nodes, edges, the concurrent [`SearchGraph`] and its snapshots.
//!
//! The graph is only mutated through its builder operations (`add_root`,
//! `add_search_node`, `add_response_node`, `add_edge`); these are the operations the
//! plan interpreter is allowed to reach. Search nodes are dispatched to the
//! [`WorkerPool`](crate::worker::WorkerPool) as soon as they are added. The orchestrator
//! seeds the root with `with_root` before sharing the graph.

mod edge;
mod node;
mod search_graph;
mod snapshot;

pub use edge::{Edge, EdgeState};
pub use node::{Node, NodeKind, NodeStatus, SearchAnswer};
pub use search_graph::{HistoryEntry, SearchGraph, ROOT_ID};
pub use snapshot::{GraphSnapshot, GraphStateView};

/// Usage errors raised by graph operations.
///
/// Fatal to the offending call only; the graph is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("root node already exists")]
    DuplicateRoot,
    #[error("node '{0}' already exists")]
    DuplicateNode(String),
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    #[error("node '{0}' not found")]
    NodeNotFound(String),
    #[error("graph has no root node")]
    MissingRoot,
}
