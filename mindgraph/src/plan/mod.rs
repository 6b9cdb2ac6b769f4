//! Sandboxed plan interpreter.
//!
//! Plans are short, untrusted, Python-call-shaped texts emitted by the planner, e.g.
//!
//! ```text
//! graph.add_node(node_name="s1", node_content="weather today")
//! graph.add_edge(start_node="root", end_node="s1")
//! ```
//!
//! [`PlanInterpreter::validate`] tokenizes and parses the text against a fixed grammar
//! and allow-list, producing [`Instruction`]s or [`PlanError::UnsafePlan`]. Nothing is
//! evaluated during validation, so a rejected plan never touches the graph.
//! [`PlanInterpreter::execute`] then dispatches each instruction to the bound
//! [`SearchGraph`](crate::graph::SearchGraph).

mod extract;
mod interpreter;
mod lexer;
mod parser;

pub use extract::extract_plan;
pub use interpreter::{requests_response, PlanInterpreter, PlanOutcome, PlanValue};
pub use parser::{Expr, GraphAttribute, GraphCall, Instruction, Literal};

/// Plan-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// Validation rejected the plan; the graph was not touched.
    #[error("unsafe plan: {0}")]
    UnsafePlan(String),
    /// `execute` was called on a graph without a root node.
    #[error("graph has no root node")]
    MissingRoot,
}

impl PlanError {
    pub(crate) fn unsafe_plan(reason: impl Into<String>) -> Self {
        PlanError::UnsafePlan(reason.into())
    }

    pub(crate) fn syntax(reason: impl std::fmt::Display) -> Self {
        PlanError::UnsafePlan(format!("invalid syntax: {}", reason))
    }
}
