//! Integration tests for plan extraction, validation and execution against a live graph.

mod common;

use common::{wait_idle, weather_graph};
use mindgraph::plan::{requests_response, Expr, GraphCall};
use mindgraph::{extract_plan, GraphError, NodeStatus, PlanError, PlanInterpreter, PlanValue};

fn rejection(plan: &str) -> String {
    match PlanInterpreter::default().validate(plan) {
        Err(PlanError::UnsafePlan(reason)) => reason,
        other => panic!("expected UnsafePlan for {:?}, got {:?}", plan, other),
    }
}

#[tokio::test]
async fn forbidden_constructs_leave_graph_untouched() {
    let cases = [
        ("import os", "import statements are not allowed"),
        ("from os import path", "import statements are not allowed"),
        ("def f():\n    pass", "function and class definitions are not allowed"),
        ("class X:\n    pass", "function and class definitions are not allowed"),
        ("global graph", "global and nonlocal statements are not allowed"),
        ("for n in graph.nodes:\n    pass", "control flow is not allowed"),
        ("graph.delete_node(\"root\")", "method 'delete_node' is not allowed"),
        ("graph._nodes", "attribute '_nodes' is not allowed"),
        ("os.system(\"rm -rf /\")", "only graph method calls are allowed"),
        ("print(\"hi\")", "only graph method calls are allowed"),
        (
            "graph.add_node(\"s1\", \"ok\")\nimport os",
            "import statements are not allowed",
        ),
    ];
    let graph = weather_graph();
    let interpreter = PlanInterpreter::default();
    for (plan, expected) in cases {
        let reason = rejection(plan);
        assert!(
            reason.contains(expected),
            "plan {:?}: {:?} does not mention {:?}",
            plan,
            reason,
            expected
        );
        assert!(interpreter.run(plan, &graph).is_err());
    }
    assert_eq!(graph.nodes().len(), 1);
    assert_eq!(graph.active_task_count(), 0);
    assert!(graph.adjacency_list().is_empty());
}

#[test]
fn syntax_errors_are_unsafe_plans() {
    for plan in [
        "graph.add_node(\"s1\"",
        "graph.add_node(\"s1\", \"q\").status",
        "graph.nodes[0]",
        "x = 1 + 2",
        "graph.add_node(\"s1\", content)",
        "[1, 2]",
    ] {
        let reason = rejection(plan);
        assert!(!reason.is_empty());
    }
}

#[tokio::test]
async fn valid_plan_mutates_graph() {
    let graph = weather_graph();
    let plan = extract_plan(
        "Here is the plan:\n```python\nfrom mindsearch.agent.graph import WebSearchGraph\n\
         graph.add_node(node_name=\"s1\", node_content=\"weather today\")\n\
         graph.add_edge(start_node=\"root\", end_node=\"s1\")\n\
         graph.add_response_node()\n\
         graph.add_edge(\"s1\", \"response\")\n```",
    );
    let interpreter = PlanInterpreter::default();
    let instructions = interpreter.validate(&plan).unwrap();
    assert_eq!(instructions.len(), 4);
    assert!(requests_response(&instructions));
    assert!(matches!(
        &instructions[0].expr,
        Expr::Call(GraphCall::AddSearchNode { id, .. }) if id == "s1"
    ));

    let outcome = interpreter.execute(&instructions, &graph).unwrap();
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.added_nodes, vec!["s1".to_string()]);
    wait_idle(&graph).await;

    let ids: Vec<String> = graph.nodes().into_iter().map(|n| n.id).collect();
    assert_eq!(ids, vec!["root", "s1", "response"]);
    assert_eq!(graph.read_node("s1").unwrap().status, NodeStatus::Completed);
    assert_eq!(graph.adjacency_list()["root"][0].to, "s1");
}

#[tokio::test]
async fn value_is_last_expression_statement() {
    let graph = weather_graph();
    let interpreter = PlanInterpreter::default();

    let outcome = interpreter
        .run("graph.add_node(\"s1\", \"q\"); graph.node(\"s1\")", &graph)
        .unwrap();
    match outcome.value {
        PlanValue::Node(node) => assert_eq!(node.id, "s1"),
        other => panic!("expected node, got {:?}", other),
    }

    let outcome = interpreter.run("\"marker\"\nall = graph.nodes", &graph).unwrap();
    assert_eq!(outcome.value, PlanValue::Str("marker".into()));

    let outcome = interpreter.run("n = graph.node(\"root\")\nn", &graph).unwrap();
    assert!(matches!(outcome.value, PlanValue::Node(ref n) if n.id == "root"));
    wait_idle(&graph).await;
}

#[tokio::test]
async fn usage_errors_fail_only_their_call() {
    let graph = weather_graph();
    let outcome = PlanInterpreter::default()
        .run(
            "graph.add_edge(\"root\", \"ghost\")\n\
             graph.add_node(\"s1\", \"q\")\n\
             graph.add_node(\"s1\", \"again\")\n\
             graph.add_edge(\"root\", \"s1\")",
            &graph,
        )
        .unwrap();
    assert_eq!(
        outcome.errors,
        vec![
            GraphError::UnknownNode("ghost".into()),
            GraphError::DuplicateNode("s1".into()),
        ]
    );
    assert_eq!(graph.adjacency_list()["root"].len(), 1);
    wait_idle(&graph).await;
}

#[tokio::test]
async fn execute_refuses_graph_without_root() {
    let pool = mindgraph::WorkerPool::new(
        std::sync::Arc::new(mindgraph::MockSearchAgent::responding(
            common::weather_answer(),
        )),
        Some(1),
        std::time::Duration::from_secs(1),
    );
    let graph = std::sync::Arc::new(mindgraph::SearchGraph::new(std::sync::Arc::new(pool)));
    let result = PlanInterpreter::default().run("graph.add_node(\"s1\", \"q\")", &graph);
    assert_eq!(result.unwrap_err(), PlanError::MissingRoot);
    assert!(graph.nodes().is_empty());
}

#[test]
fn custom_handle_is_the_only_target() {
    let interpreter = PlanInterpreter::new("g");
    assert!(interpreter.validate("g.add_node(\"a\", \"b\")").is_ok());
    assert!(interpreter.validate("graph.add_node(\"a\", \"b\")").is_err());
    assert!(interpreter.validate("g = 1").is_err());
}
