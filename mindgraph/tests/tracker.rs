//! Integration tests for ExecutionTracker wired into SearchGraph.

mod common;

use std::sync::Arc;
use std::time::Duration;

use mindgraph::{
    ExecutionTracker, GraphError, LoopPattern, MockSearchAgent, SearchAnswer, SearchGraph,
    TrackerLimits, TrackerState, WorkerPool,
};

fn tracked_graph(limits: TrackerLimits) -> (Arc<SearchGraph>, Arc<ExecutionTracker>) {
    let agent = Arc::new(MockSearchAgent::responding(SearchAnswer::new("ok")));
    let pool = WorkerPool::new(agent, Some(4), Duration::from_secs(5));
    let tracker = Arc::new(ExecutionTracker::new(limits));
    let graph = Arc::new(SearchGraph::new(Arc::new(pool)).with_tracker(Arc::clone(&tracker)));
    graph.add_root("q").unwrap();
    (graph, tracker)
}

#[tokio::test]
async fn ten_redispatches_flag_loop_on_fourth_visit() {
    let (graph, tracker) = tracked_graph(TrackerLimits::default());
    for i in 0..10 {
        let result = graph.add_search_node("s1", "same query");
        if i == 0 {
            assert!(result.is_ok());
        } else {
            assert_eq!(result.unwrap_err(), GraphError::DuplicateNode("s1".into()));
        }
    }

    let records = tracker.records();
    assert_eq!(records.len(), 10);
    assert_eq!(records[2].flag, TrackerState::Running);
    assert_eq!(records[3].flag, TrackerState::LoopDetected);
    assert_eq!(records[3].visit_count, 4);
    assert_eq!(
        tracker.loop_pattern(),
        Some(LoopPattern::Revisited {
            node_id: "s1".into(),
            visits: 4
        })
    );
    assert!(tracker.should_terminate());
    assert!(graph.pool().is_halted());
    common::wait_idle(&graph).await;
}

#[tokio::test]
async fn interleaved_revisits_are_caught_within_the_window() {
    let limits = TrackerLimits::default();
    let (graph, tracker) = tracked_graph(limits);
    let mut visits = 0;
    for i in 0..limits.window_size * 2 {
        if tracker.state() != TrackerState::Running {
            break;
        }
        let _ = graph.add_search_node("hot", "q");
        let _ = graph.add_search_node(format!("cold{}", i), "q");
        visits += 1;
    }
    assert_eq!(tracker.state(), TrackerState::LoopDetected);
    assert!(visits <= limits.max_node_visits as usize + limits.window_size);
    common::wait_idle(&graph).await;
}

#[tokio::test]
async fn alternating_duplicates_form_a_cycle() {
    let (graph, tracker) = tracked_graph(TrackerLimits::default());
    graph.add_search_node("a", "q").unwrap();
    graph.add_search_node("b", "q").unwrap();
    let _ = graph.add_search_node("a", "q");
    let _ = graph.add_search_node("b", "q");

    assert_eq!(tracker.state(), TrackerState::LoopDetected);
    assert_eq!(
        tracker.loop_pattern(),
        Some(LoopPattern::Cycle {
            nodes: vec!["a".into(), "b".into()]
        })
    );
    common::wait_idle(&graph).await;
}

#[tokio::test]
async fn nodes_added_after_loop_are_not_dispatched() {
    let (graph, tracker) = tracked_graph(TrackerLimits {
        max_node_visits: 1,
        ..TrackerLimits::default()
    });
    graph.add_search_node("x", "q").unwrap();
    let _ = graph.add_search_node("x", "q");
    assert!(tracker.should_terminate());

    graph.add_search_node("y", "q").unwrap();
    let y = graph.read_node("y").unwrap();
    assert_eq!(y.status, mindgraph::NodeStatus::Failed);
    common::wait_idle(&graph).await;
}

#[test]
fn wall_clock_budget_latches_timeout() {
    let tracker = ExecutionTracker::new(TrackerLimits {
        execution_timeout: Duration::from_millis(10),
        ..TrackerLimits::default()
    });
    assert!(!tracker.should_terminate());
    std::thread::sleep(Duration::from_millis(25));
    assert!(tracker.should_terminate());
    assert_eq!(tracker.state(), TrackerState::TimedOut);

    // A later visit does not replace the timeout with a loop.
    for _ in 0..5 {
        tracker.record_visit("z");
    }
    assert_eq!(tracker.state(), TrackerState::TimedOut);
    assert!(tracker.loop_pattern().is_none());
}

#[test]
fn summary_and_reset() {
    let tracker = ExecutionTracker::new(TrackerLimits::default());
    tracker.record_visit("a");
    tracker.record_visit("b");
    tracker.record_visit("a");
    let summary = tracker.summary();
    assert_eq!(summary.total_visits, 3);
    assert_eq!(summary.unique_nodes, 2);
    assert_eq!(tracker.visits("a"), 2);

    tracker.mark_drained();
    assert_eq!(tracker.state(), TrackerState::NormallyDrained);
    tracker.reset();
    assert_eq!(tracker.state(), TrackerState::Running);
    assert!(tracker.records().is_empty());
}
