//! Integration tests for reference consolidation over graph snapshots.


use std::collections::{BTreeMap, HashSet};

use mindgraph::{consolidate, GraphSnapshot, Node, NodeKind, NodeStatus, SearchAnswer};

fn answered(id: &str, query: &str, answer: SearchAnswer) -> Node {
    Node {
        id: id.to_string(),
        content: query.to_string(),
        kind: NodeKind::Search,
        status: NodeStatus::Completed,
        result: Some(answer),
        error: None,
    }
}

fn root() -> Node {
    Node {
        id: "root".to_string(),
        content: "question".to_string(),
        kind: NodeKind::Root,
        status: NodeStatus::Completed,
        result: None,
        error: None,
    }
}

fn snapshot(nodes: Vec<Node>) -> GraphSnapshot {
    GraphSnapshot {
        nodes,
        adjacency: BTreeMap::new(),
    }
}

#[test]
fn renumbers_by_first_appearance_across_nodes() {
    let a = SearchAnswer::new("x [[2]] y [[1]]")
        .with_citation(1, "http://one")
        .with_citation(2, "http://two")
        .with_citation(3, "http://three");
    let b = SearchAnswer::new("z [[1]]").with_citation(1, "http://four");
    let out = consolidate(&snapshot(vec![
        root(),
        answered("a", "first query", a),
        answered("b", "second query", b),
    ]));

    assert_eq!(
        out.text,
        "## first query\n\nx [[1]] y [[2]]\n\n## second query\n\nz [[4]]"
    );
    let expected: BTreeMap<u32, String> = [
        (1, "http://two"),
        (2, "http://one"),
        (3, "http://three"),
        (4, "http://four"),
    ]
    .into_iter()
    .map(|(n, u)| (n, u.to_string()))
    .collect();
    assert_eq!(out.references, expected);
    assert_eq!(out.nodes, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn consolidation_is_idempotent() {
    let snap = snapshot(vec![
        root(),
        answered(
            "a",
            "q1",
            SearchAnswer::new("[[3]] and [[1]]")
                .with_citation(1, "http://a1")
                .with_citation(3, "http://a3"),
        ),
        answered(
            "b",
            "q2",
            SearchAnswer::new("[[1]]").with_citation(1, "http://b1"),
        ),
    ]);
    let first = consolidate(&snap);
    let second = consolidate(&snap);
    assert_eq!(first, second);
}

#[test]
fn global_numbers_never_collide() {
    let nodes: Vec<Node> = (0..5)
        .map(|i| {
            let mut answer = SearchAnswer::new(format!("fact [[1]] and [[2]] from {}", i));
            answer = answer
                .with_citation(1, format!("http://n{}/1", i))
                .with_citation(2, format!("http://n{}/2", i));
            answered(&format!("n{}", i), &format!("q{}", i), answer)
        })
        .collect();
    let out = consolidate(&snapshot(nodes));

    assert_eq!(out.references.len(), 10);
    let urls: HashSet<&String> = out.references.values().collect();
    assert_eq!(urls.len(), 10);
    assert_eq!(out.references.keys().copied().collect::<Vec<_>>(), (1..=10).collect::<Vec<u32>>());
}

#[test]
fn malformed_nodes_are_skipped() {
    let blank_url = SearchAnswer::new("bad [[1]]").with_citation(1, "  ");
    let empty_text = SearchAnswer::new("   ");
    let good = SearchAnswer::new("good [[1]]").with_citation(1, "http://good");
    let mut failed = answered("f", "failed", SearchAnswer::new("ignored"));
    failed.status = NodeStatus::Failed;

    let out = consolidate(&snapshot(vec![
        root(),
        answered("blank", "b", blank_url),
        answered("empty", "e", empty_text),
        failed,
        answered("good", "g", good),
    ]));

    assert_eq!(out.nodes, vec!["good".to_string()]);
    assert_eq!(out.references.get(&1).map(String::as_str), Some("http://good"));
    let skipped: Vec<&str> = out.skipped.iter().map(|s| s.node_id.as_str()).collect();
    assert_eq!(skipped, vec!["blank", "empty"]);
}

#[test]
fn marker_without_url_keeps_its_slot() {
    let dangling = SearchAnswer::new("see [[7]]");
    let next = SearchAnswer::new("then [[1]]").with_citation(1, "http://next");
    let out = consolidate(&snapshot(vec![
        answered("d", "dangling", dangling),
        answered("n", "next", next),
    ]));

    assert!(out.text.contains("see [[1]]"));
    assert!(out.text.contains("then [[2]]"));
    assert!(!out.references.contains_key(&1));
    assert_eq!(out.references.get(&2).map(String::as_str), Some("http://next"));
}

#[test]
fn uncited_entries_follow_cited_ones() {
    let answer = SearchAnswer::new("only [[5]]")
        .with_citation(2, "http://two")
        .with_citation(5, "http://five");
    let out = consolidate(&snapshot(vec![answered("a", "q", answer)]));
    assert_eq!(out.text, "## q\n\nonly [[1]]");
    assert_eq!(out.references.get(&1).map(String::as_str), Some("http://five"));
    assert_eq!(out.references.get(&2).map(String::as_str), Some("http://two"));
}
