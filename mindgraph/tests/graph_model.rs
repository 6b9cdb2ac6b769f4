//! Integration tests for SearchGraph: node lifecycle, edges, history, snapshots.

mod common;

use std::sync::Arc;

use common::{graph_with, wait_idle, weather_graph};
use mindgraph::{
    consolidate, EdgeState, GraphError, GraphEventKind, MockSearchAgent, NodeKind, NodeStatus,
    SearchAnswer,
};

#[tokio::test]
async fn search_node_completes_and_cites() {
    let graph = weather_graph();
    graph.add_search_node("s1", "weather today").unwrap();
    graph.add_edge("root", "s1").unwrap();
    wait_idle(&graph).await;

    let node = graph.read_node("s1").unwrap();
    assert_eq!(node.status, NodeStatus::Completed);
    assert_eq!(node.kind, NodeKind::Search);

    let consolidated = consolidate(&graph.snapshot());
    assert!(consolidated.text.contains("[[1]]"));
    assert!(consolidated.text.contains("## weather today"));
    assert_eq!(
        consolidated.references.get(&1).map(String::as_str),
        Some("http://wx.example")
    );
}

#[tokio::test]
async fn failing_agent_fails_node_and_releases_counter() {
    let graph = graph_with(Arc::new(MockSearchAgent::failing("provider down")), Some(2));
    graph.add_search_node("s1", "weather today").unwrap();
    graph.add_edge("root", "s1").unwrap();
    wait_idle(&graph).await;

    let node = graph.read_node("s1").unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
    assert!(node.error.unwrap().contains("provider down"));
    assert_eq!(graph.active_task_count(), 0);

    let consolidated = consolidate(&graph.snapshot());
    assert!(consolidated.text.is_empty());
    assert!(consolidated.references.is_empty());
    assert!(consolidated.nodes.is_empty());
}

#[tokio::test]
async fn edges_over_existing_nodes_never_fail() {
    let graph = weather_graph();
    let mut known = vec!["root".to_string()];
    for i in 0..12 {
        let id = format!("n{}", i);
        graph.add_search_node(id.as_str(), format!("query {}", i)).unwrap();
        // Connect to a deterministic spread of earlier nodes, including repeats.
        for step in [1usize, 2, 5] {
            let from = &known[(i * step) % known.len()];
            graph.add_edge(from, &id).unwrap();
        }
        known.push(id);
    }
    wait_idle(&graph).await;
    let adjacency = graph.adjacency_list();
    let edges: usize = adjacency.values().map(Vec::len).sum();
    assert_eq!(edges, 36);
    assert_eq!(graph.snapshot().edge_count(), 36);
}

#[tokio::test]
async fn usage_errors_are_reported() {
    let graph = weather_graph();
    assert_eq!(graph.add_root("again"), Err(GraphError::DuplicateRoot));
    assert_eq!(
        graph.add_edge("root", "nowhere").unwrap_err(),
        GraphError::UnknownNode("nowhere".into())
    );
    assert_eq!(
        graph.read_node("nowhere").unwrap_err(),
        GraphError::NodeNotFound("nowhere".into())
    );
    graph.add_response_node("response").unwrap();
    assert_eq!(
        graph.add_response_node("response").unwrap_err(),
        GraphError::DuplicateNode("response".into())
    );
}

#[tokio::test]
async fn edge_states_follow_targets() {
    let graph = graph_with(
        Arc::new(MockSearchAgent::responding(SearchAnswer::new("ok")).with_delay(
            std::time::Duration::from_millis(50),
        )),
        Some(1),
    );
    graph.add_search_node("a", "first").unwrap();
    graph.add_search_node("b", "second").unwrap();
    graph.add_edge("root", "a").unwrap();
    graph.add_edge("root", "b").unwrap();

    // One permit: "b" cannot have started while "a" sleeps.
    let early = graph.adjacency_list();
    let b_edge = early["root"].iter().find(|e| e.to == "b").unwrap();
    assert_eq!(b_edge.state, EdgeState::NotStarted);

    wait_idle(&graph).await;
    let late = graph.adjacency_list();
    assert!(late["root"].iter().all(|e| e.state == EdgeState::Completed));
}

#[tokio::test]
async fn history_contains_completed_ancestors_only() {
    let graph = weather_graph();
    graph.add_search_node("s1", "weather today").unwrap();
    graph.add_edge("root", "s1").unwrap();
    wait_idle(&graph).await;

    graph.add_search_node("s2", "umbrella needed?").unwrap();
    graph.add_edge("s1", "s2").unwrap();
    wait_idle(&graph).await;

    let history = graph.ancestor_history("s2");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].node_id, "s1");
    assert_eq!(history[0].question, "weather today");
    assert!(graph.ancestor_history("s1").is_empty());
}

#[tokio::test]
async fn collector_sees_start_and_finish_in_order() {
    let graph = weather_graph();
    graph.add_search_node("s1", "weather today").unwrap();
    wait_idle(&graph).await;

    let kinds: Vec<GraphEventKind> = graph
        .collector()
        .drain()
        .await
        .into_iter()
        .filter(|e| e.node_id == "s1")
        .map(|e| e.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![GraphEventKind::NodeStarted, GraphEventKind::NodeCompleted]
    );
}

#[tokio::test]
async fn state_view_partitions_nodes() {
    let graph = graph_with(
        Arc::new(MockSearchAgent::from_fn(|req| {
            if req.query == "bad" {
                Err(mindgraph::SearchError::Failed("nope".into()))
            } else {
                Ok(SearchAnswer::new("fine"))
            }
        })),
        None,
    );
    graph.add_search_node("good", "good").unwrap();
    graph.add_search_node("bad", "bad").unwrap();
    wait_idle(&graph).await;

    let view = graph.state_view();
    assert!(view.completed.contains(&"good".to_string()));
    assert_eq!(view.failed, vec!["bad".to_string()]);
    assert!(view.pending.is_empty());
    assert!(view.is_settled());
}
