//! Pulls the plan out of a planner message.

use once_cell::sync::Lazy;
use regex::Regex;

static GRAPH_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:from\s+[\w.]+\s+)?import\s+WebSearchGraph\b").expect("graph import pattern")
});
static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[^\n]*\n(.+?)```").expect("fenced block pattern"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]*)`").expect("inline code pattern"));

/// Returns the plan text inside `message`.
///
/// Boilerplate `from x import WebSearchGraph` lines are dropped first. Then the first
/// fenced block wins, then the first inline code span, then the whole text.
pub fn extract_plan(message: &str) -> String {
    let text = GRAPH_IMPORT.replace_all(message, "");
    if let Some(caps) = FENCED_BLOCK.captures(&text) {
        return caps[1].to_string();
    }
    if let Some(caps) = INLINE_CODE.captures(&text) {
        return caps[1].to_string();
    }
    text.into_owned()
}
