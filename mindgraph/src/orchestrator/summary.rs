//! Best-effort answer used when a run is forced to stop.

use std::fmt::Write;

use crate::graph::GraphSnapshot;
use crate::references::Consolidated;
use crate::tracker::ExecutionSummary;

const PREVIEW_CHARS: usize = 100;

/// Builds the partial answer from whatever completed. Never empty.
pub(crate) fn termination_summary(
    question: &str,
    reason: &str,
    execution: &ExecutionSummary,
    snapshot: &GraphSnapshot,
    consolidated: &Consolidated,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: {}", question);
    let _ = writeln!(out);
    let _ = writeln!(out, "The search was stopped early: {}.", reason);
    let _ = writeln!(out);
    let _ = writeln!(out, "Execution Summary:");
    let _ = writeln!(out, "- Total node visits: {}", execution.total_visits);
    let _ = writeln!(out, "- Unique nodes: {}", execution.unique_nodes);
    let _ = writeln!(
        out,
        "- Execution time: {:.2}s",
        execution.elapsed.as_secs_f64()
    );
    if let Some(pattern) = &execution.loop_pattern {
        let _ = writeln!(out, "- Loop pattern: {}", pattern);
    }

    let _ = writeln!(out);
    let answered: Vec<_> = snapshot.answered_nodes().collect();
    if answered.is_empty() {
        let _ = writeln!(out, "No search results were completed.");
    } else {
        let _ = writeln!(out, "Available results:");
        for node in answered {
            let text = node.result.as_ref().map(|r| r.text.as_str()).unwrap_or("");
            let _ = writeln!(out, "- {}: {}", node.id, preview(text));
        }
    }

    if !consolidated.references.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "References:");
        for (n, url) in &consolidated.references {
            let _ = writeln!(out, "[{}] {}", n, url);
        }
    }
    out.trim_end().to_string()
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
