//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mindgraph::{MockSearchAgent, SearchAgent, SearchAnswer, SearchGraph, WorkerPool};

/// Answer used by the weather scenarios.
pub fn weather_answer() -> SearchAnswer {
    SearchAnswer::new("sunny [[1]]").with_citation(1, "http://wx.example")
}

/// Graph with a root, backed by a pool of `max_workers` around `agent`.
pub fn graph_with(agent: Arc<dyn SearchAgent>, max_workers: Option<usize>) -> Arc<SearchGraph> {
    let pool = WorkerPool::new(agent, max_workers, Duration::from_secs(5));
    let graph = Arc::new(SearchGraph::new(Arc::new(pool)));
    graph.add_root("what is the weather?").unwrap();
    graph
}

pub fn weather_graph() -> Arc<SearchGraph> {
    graph_with(Arc::new(MockSearchAgent::responding(weather_answer())), Some(4))
}

/// Polls until no worker is active; panics after five seconds.
pub async fn wait_idle(graph: &SearchGraph) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while graph.active_task_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("workers did not finish in time");
}

/// Polls until `agent` has been called `n` times; panics after five seconds.
pub async fn wait_calls(agent: &MockSearchAgent, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while agent.calls() < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("searches did not start in time");
}
