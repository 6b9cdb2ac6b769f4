//! Concurrent search graph shared by the plan interpreter, the workers and the orchestrator.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::stream::{GraphEvent, GraphEventKind, StreamCollector};
use crate::tracker::{ExecutionTracker, TrackerState};
use crate::worker::{SearchError, WorkerPool};

use super::edge::{Edge, EdgeState};
use super::node::{Node, NodeKind, NodeStatus, SearchAnswer};
use super::snapshot::{GraphSnapshot, GraphStateView};
use super::GraphError;

/// Id of the root node.
pub const ROOT_ID: &str = "root";

/// Completed ancestor passed to the search agent as context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub node_id: String,
    pub question: String,
    pub answer: SearchAnswer,
}

/// Search-task graph for one user query.
///
/// Node records live in a concurrent map so workers can write their own node while
/// the orchestrator reads snapshots. Adjacency and insertion order are behind
/// `RwLock`s that are never held across a node-map access that could block.
///
/// **Interaction**: Built by the orchestrator with a [`WorkerPool`] (and optionally an
/// [`ExecutionTracker`]); mutated by [`crate::plan::PlanInterpreter::execute`]; drained through
/// [`SearchGraph::collector`].
pub struct SearchGraph {
    nodes: DashMap<String, Node>,
    order: RwLock<Vec<String>>,
    adjacency: RwLock<HashMap<String, Vec<Edge>>>,
    active_tasks: AtomicUsize,
    collector: StreamCollector,
    pool: Arc<WorkerPool>,
    tracker: Option<Arc<ExecutionTracker>>,
}

impl std::fmt::Debug for SearchGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGraph")
            .field("nodes", &self.nodes.len())
            .field("active_tasks", &self.active_task_count())
            .finish()
    }
}

impl SearchGraph {
    /// Creates an empty graph whose search nodes are dispatched to `pool`.
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            nodes: DashMap::new(),
            order: RwLock::new(Vec::new()),
            adjacency: RwLock::new(HashMap::new()),
            active_tasks: AtomicUsize::new(0),
            collector: StreamCollector::new(),
            pool,
            tracker: None,
        }
    }

    /// Records every search-node add (including duplicate attempts) on `tracker`.
    pub fn with_tracker(mut self, tracker: Arc<ExecutionTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Seeds the root node while the graph is still being built.
    ///
    /// Calling it again replaces the question; the graph keeps a single root.
    pub fn with_root(self, question: impl Into<String>) -> Self {
        if self
            .nodes
            .insert(ROOT_ID.to_string(), Node::root(ROOT_ID, question))
            .is_none()
        {
            self.push_order(ROOT_ID);
        }
        self
    }

    /// Creates the root node holding the user question.
    pub fn add_root(&self, question: impl Into<String>) -> Result<Node, GraphError> {
        let node = Node::root(ROOT_ID, question);
        match self.nodes.entry(ROOT_ID.to_string()) {
            Entry::Occupied(_) => return Err(GraphError::DuplicateRoot),
            Entry::Vacant(slot) => {
                slot.insert(node.clone());
            }
        }
        self.push_order(ROOT_ID);
        Ok(node)
    }

    /// Adds a search node and dispatches its worker.
    ///
    /// The returned node is the freshly created `Pending` record; the worker may
    /// already be running when this returns. A duplicate id is still recorded as a
    /// visit on the tracker before it is rejected. A visit that trips loop detection
    /// halts the pool, so this and later nodes are failed instead of dispatched.
    pub fn add_search_node(
        self: &Arc<Self>,
        id: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<Node, GraphError> {
        let id = id.into();
        if !self.has_root() {
            return Err(GraphError::MissingRoot);
        }
        if let Some(tracker) = &self.tracker {
            if matches!(
                tracker.record_visit(&id),
                TrackerState::LoopDetected | TrackerState::TimedOut
            ) {
                self.pool.halt();
            }
        }
        let node = Node::search(id.clone(), query);
        self.insert_new(node.clone())?;
        tracing::debug!(node_id = %id, "search node added");
        self.pool.dispatch(Arc::clone(self), id);
        Ok(node)
    }

    /// Adds the response node that marks the plan as complete. Schedules no work.
    pub fn add_response_node(&self, id: impl Into<String>) -> Result<Node, GraphError> {
        let id = id.into();
        if !self.has_root() {
            return Err(GraphError::MissingRoot);
        }
        let node = Node::response(id.clone());
        self.insert_new(node.clone())?;
        self.collector.push(GraphEvent {
            node_id: id,
            kind: GraphEventKind::ResponseAdded,
            node: Some(node.clone()),
            edges: Vec::new(),
        });
        Ok(node)
    }

    /// Appends `from -> to` and publishes the source node with its outgoing edges.
    pub fn add_edge(&self, from: &str, to: &str) -> Result<Edge, GraphError> {
        let source = self
            .nodes
            .get(from)
            .map(|n| n.clone())
            .ok_or_else(|| GraphError::UnknownNode(from.to_string()))?;
        let target = self
            .nodes
            .get(to)
            .map(|n| n.clone())
            .ok_or_else(|| GraphError::UnknownNode(to.to_string()))?;

        let edge = Edge::new(from, to, EdgeState::for_target(&target));
        let edges = {
            let mut adjacency = self.adjacency.write().unwrap_or_else(|e| e.into_inner());
            let list = adjacency.entry(from.to_string()).or_default();
            list.push(edge.clone());
            list.clone()
        };
        self.collector.push(GraphEvent {
            node_id: from.to_string(),
            kind: GraphEventKind::EdgeAdded,
            node: Some(source),
            edges: self.refresh_edges(edges),
        });
        Ok(edge)
    }

    /// Copy of one node.
    pub fn read_node(&self, id: &str) -> Result<Node, GraphError> {
        self.nodes
            .get(id)
            .map(|n| n.clone())
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    pub fn root(&self) -> Option<Node> {
        self.nodes.get(ROOT_ID).map(|n| n.clone())
    }

    fn has_root(&self) -> bool {
        self.nodes.contains_key(ROOT_ID)
    }

    /// Copies of all nodes in insertion order.
    pub fn nodes(&self) -> Vec<Node> {
        let order = self.order.read().unwrap_or_else(|e| e.into_inner()).clone();
        order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.clone()))
            .collect()
    }

    /// Copy of the adjacency map with edge states recomputed from their targets.
    pub fn adjacency_list(&self) -> BTreeMap<String, Vec<Edge>> {
        let raw: Vec<(String, Vec<Edge>)> = {
            let adjacency = self.adjacency.read().unwrap_or_else(|e| e.into_inner());
            adjacency
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        raw.into_iter()
            .map(|(from, edges)| (from, self.refresh_edges(edges)))
            .collect()
    }

    /// Number of dispatched search workers that have not finished.
    pub fn active_task_count(&self) -> usize {
        self.active_tasks.load(Ordering::SeqCst)
    }

    /// Event queue fed by workers and by the edge/response mutators.
    pub fn collector(&self) -> &StreamCollector {
        &self.collector
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes(),
            adjacency: self.adjacency_list(),
        }
    }

    pub fn state_view(&self) -> GraphStateView {
        self.snapshot().state_view()
    }

    /// Completed search ancestors of `id`, nearest first, found by walking edges backwards.
    ///
    /// Ancestors that have not completed yet are skipped but still walked through.
    pub fn ancestor_history(&self, id: &str) -> Vec<HistoryEntry> {
        let parents: HashMap<String, Vec<String>> = {
            let adjacency = self.adjacency.read().unwrap_or_else(|e| e.into_inner());
            let mut parents: HashMap<String, Vec<String>> = HashMap::new();
            for edges in adjacency.values() {
                for edge in edges {
                    parents
                        .entry(edge.to.clone())
                        .or_default()
                        .push(edge.from.clone());
                }
            }
            parents
        };

        let mut history = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            for parent in parents.get(&current).into_iter().flatten() {
                if !seen.insert(parent.clone()) {
                    continue;
                }
                queue.push_back(parent.clone());
                let Ok(node) = self.read_node(parent) else {
                    continue;
                };
                if let (true, Some(answer)) = (node.is_answered(), node.result) {
                    history.push(HistoryEntry {
                        node_id: node.id,
                        question: node.content,
                        answer,
                    });
                }
            }
        }
        history
    }

    fn insert_new(&self, node: Node) -> Result<(), GraphError> {
        let id = node.id.clone();
        match self.nodes.entry(id.clone()) {
            Entry::Occupied(_) => return Err(GraphError::DuplicateNode(id)),
            Entry::Vacant(slot) => {
                slot.insert(node);
            }
        }
        self.push_order(&id);
        Ok(())
    }

    fn push_order(&self, id: &str) {
        self.order
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.to_string());
    }

    fn refresh_edges(&self, mut edges: Vec<Edge>) -> Vec<Edge> {
        for edge in &mut edges {
            if let Some(target) = self.nodes.get(&edge.to) {
                edge.state = EdgeState::for_target(&target);
            }
        }
        edges
    }

    fn publish(&self, id: &str, kind: GraphEventKind) {
        let node = self.nodes.get(id).map(|n| n.clone());
        self.collector.push(GraphEvent {
            node_id: id.to_string(),
            kind,
            node,
            edges: Vec::new(),
        });
    }

    /// Counts a worker as active. Called by the pool right before it spawns.
    pub(crate) fn begin_task(&self) {
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
    }

    /// Marks `id` in progress and returns its copy; `None` if it is gone or already settled.
    pub(crate) fn start_node(&self, id: &str) -> Option<Node> {
        let started = {
            let mut node = self.nodes.get_mut(id)?;
            if node.status != NodeStatus::Pending {
                return None;
            }
            node.status = NodeStatus::InProgress;
            node.clone()
        };
        self.publish(id, GraphEventKind::NodeStarted);
        Some(started)
    }

    /// Writes the worker outcome onto the node.
    pub(crate) fn settle_node(&self, id: &str, outcome: Result<SearchAnswer, SearchError>) {
        let Some(mut node) = self.nodes.get_mut(id) else {
            return;
        };
        match outcome {
            Ok(answer) => {
                node.status = NodeStatus::Completed;
                node.result = Some(answer);
                node.error = None;
            }
            Err(e) => {
                node.status = NodeStatus::Failed;
                node.error = Some(e.to_string());
            }
        }
    }

    /// Publishes the finish event, then releases the active-task slot.
    ///
    /// A node that is still unsettled here lost its worker (panic or abort) and is failed.
    pub(crate) fn finish_task(&self, id: &str) {
        let status = {
            match self.nodes.get_mut(id) {
                Some(mut node) => {
                    if !node.status.is_terminal() {
                        node.status = NodeStatus::Failed;
                        node.error = Some("search worker stopped before completion".to_string());
                    }
                    Some(node.status)
                }
                None => None,
            }
        };
        let kind = match status {
            Some(NodeStatus::Completed) => GraphEventKind::NodeCompleted,
            _ => GraphEventKind::NodeFailed,
        };
        self.publish(id, kind);
        self.active_tasks.fetch_sub(1, Ordering::SeqCst);
    }

    /// Fails a node the pool refused to dispatch. The active-task counter is untouched.
    pub(crate) fn reject_dispatch(&self, id: &str) {
        if let Some(mut node) = self.nodes.get_mut(id) {
            node.status = NodeStatus::Failed;
            node.error = Some(SearchError::Halted.to_string());
        }
        tracing::warn!(node_id = %id, "search node not dispatched: pool halted");
        self.publish(id, GraphEventKind::NodeFailed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::MockSearchAgent;
    use std::time::Duration;

    fn graph() -> Arc<SearchGraph> {
        let pool = WorkerPool::new(
            Arc::new(MockSearchAgent::responding(SearchAnswer::new("ok"))),
            Some(4),
            Duration::from_secs(5),
        );
        Arc::new(SearchGraph::new(Arc::new(pool)))
    }

    /// **Scenario**: a second root is rejected.
    #[tokio::test]
    async fn duplicate_root_rejected() {
        let g = graph();
        g.add_root("q").unwrap();
        assert_eq!(g.add_root("again"), Err(GraphError::DuplicateRoot));
    }

    /// **Scenario**: a builder-seeded root is the only root; a later add_root is a duplicate.
    #[tokio::test]
    async fn with_root_seeds_a_single_root() {
        let pool = WorkerPool::new(
            Arc::new(MockSearchAgent::responding(SearchAnswer::new("ok"))),
            Some(2),
            Duration::from_secs(5),
        );
        let g = SearchGraph::new(Arc::new(pool))
            .with_root("first")
            .with_root("what is the weather?");

        assert_eq!(g.root().unwrap().content, "what is the weather?");
        let ids: Vec<String> = g.nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![ROOT_ID]);
        assert_eq!(g.add_root("again"), Err(GraphError::DuplicateRoot));
    }

    /// **Scenario**: search nodes need a root.
    #[tokio::test]
    async fn search_node_requires_root() {
        let g = graph();
        assert_eq!(
            g.add_search_node("s1", "q").unwrap_err(),
            GraphError::MissingRoot
        );
        assert_eq!(g.active_task_count(), 0);
    }

    /// **Scenario**: duplicate search ids are rejected and nothing extra is dispatched.
    #[tokio::test]
    async fn duplicate_search_node_rejected() {
        let g = graph();
        g.add_root("q").unwrap();
        g.add_search_node("s1", "a").unwrap();
        assert_eq!(
            g.add_search_node("s1", "b").unwrap_err(),
            GraphError::DuplicateNode("s1".into())
        );
        assert_eq!(g.read_node("s1").unwrap().content, "a");
    }

    /// **Scenario**: edges need both endpoints.
    #[tokio::test]
    async fn edge_to_unknown_node_rejected() {
        let g = graph();
        g.add_root("q").unwrap();
        assert_eq!(
            g.add_edge("root", "missing").unwrap_err(),
            GraphError::UnknownNode("missing".into())
        );
        assert_eq!(
            g.add_edge("ghost", "root").unwrap_err(),
            GraphError::UnknownNode("ghost".into())
        );
        assert!(g.adjacency_list().is_empty());
    }

    /// **Scenario**: reading a missing node reports NodeNotFound.
    #[tokio::test]
    async fn read_missing_node() {
        let g = graph();
        assert_eq!(
            g.read_node("nope").unwrap_err(),
            GraphError::NodeNotFound("nope".into())
        );
    }

    /// **Scenario**: nodes are listed in insertion order.
    #[tokio::test]
    async fn nodes_keep_insertion_order() {
        let g = graph();
        g.add_root("q").unwrap();
        g.add_search_node("b", "1").unwrap();
        g.add_search_node("a", "2").unwrap();
        g.add_response_node("response").unwrap();
        let ids: Vec<String> = g.nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["root", "b", "a", "response"]);
    }

    /// **Scenario**: add_edge publishes the source node with all of its outgoing edges.
    #[tokio::test]
    async fn add_edge_publishes_source_adjacency() {
        let g = graph();
        g.add_root("q").unwrap();
        g.add_response_node("response").unwrap();
        g.add_edge("root", "response").unwrap();
        let events = g.collector().drain().await;
        let edge_event = events
            .iter()
            .find(|e| e.kind == GraphEventKind::EdgeAdded)
            .unwrap();
        assert_eq!(edge_event.node_id, "root");
        assert_eq!(edge_event.edges.len(), 1);
        assert_eq!(edge_event.edges[0].to, "response");
        assert_eq!(edge_event.edges[0].state, EdgeState::Completed);
    }
}
