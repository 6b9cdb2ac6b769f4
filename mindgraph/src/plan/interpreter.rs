//! Validation entry point and the whitelist-checked dispatcher.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::graph::{Edge, GraphError, Node, SearchGraph};

use super::lexer::tokenize;
use super::parser::{Expr, GraphAttribute, GraphCall, Instruction, Literal, Parser};
use super::PlanError;

/// Value of a plan expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PlanValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    Node(Node),
    Nodes(Vec<Node>),
    Adjacency(BTreeMap<String, Vec<Edge>>),
    Edge(Edge),
}

impl From<Literal> for PlanValue {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::None => PlanValue::None,
            Literal::Bool(b) => PlanValue::Bool(b),
            Literal::Int(n) => PlanValue::Int(n),
            Literal::Str(s) => PlanValue::Str(s),
        }
    }
}

/// Result of executing a validated plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Value of the last expression statement (`None` when there is none).
    pub value: PlanValue,
    /// Graph usage errors of individual calls; later calls still ran.
    pub errors: Vec<GraphError>,
    /// Search nodes this plan created, in order.
    pub added_nodes: Vec<String>,
}

/// True when the plan adds the response node, i.e. asks for the final answer.
pub fn requests_response(instructions: &[Instruction]) -> bool {
    instructions
        .iter()
        .any(|i| matches!(i.expr, Expr::Call(GraphCall::AddResponseNode { .. })))
}

/// Capability-scoped plan evaluator bound to one graph handle name.
///
/// **Interaction**: Used by the orchestrator on each planner turn: `validate` the
/// extracted plan text, then `execute` it against the run's [`SearchGraph`].
#[derive(Debug, Clone)]
pub struct PlanInterpreter {
    handle: String,
}

impl Default for PlanInterpreter {
    fn default() -> Self {
        Self::new("graph")
    }
}

impl PlanInterpreter {
    /// `handle` is the only identifier plans may call methods on.
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Parses `plan` against the allow-list. Pure: never touches a graph.
    pub fn validate(&self, plan: &str) -> Result<Vec<Instruction>, PlanError> {
        let tokens = tokenize(plan)?;
        Parser::new(&tokens, &self.handle).parse()
    }

    /// Applies `instructions` in order.
    ///
    /// A usage error fails only its own call: it is logged, collected in
    /// [`PlanOutcome::errors`], and yields `None`. Refuses to start on a graph
    /// without a root.
    pub fn execute(
        &self,
        instructions: &[Instruction],
        graph: &Arc<SearchGraph>,
    ) -> Result<PlanOutcome, PlanError> {
        if graph.root().is_none() {
            return Err(PlanError::MissingRoot);
        }
        let mut locals: HashMap<String, PlanValue> = HashMap::new();
        let mut outcome = PlanOutcome {
            value: PlanValue::None,
            errors: Vec::new(),
            added_nodes: Vec::new(),
        };

        for instruction in instructions {
            let value = match &instruction.expr {
                Expr::Call(call) => match self.call(call, graph) {
                    Ok(value) => {
                        if let GraphCall::AddSearchNode { id, .. } = call {
                            outcome.added_nodes.push(id.clone());
                        }
                        value
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "plan call failed");
                        outcome.errors.push(e);
                        PlanValue::None
                    }
                },
                Expr::Attribute(attr) => read_attribute(*attr, graph),
                Expr::Literal(literal) => literal.clone().into(),
                Expr::Name(name) => locals.get(name).cloned().unwrap_or(PlanValue::None),
            };
            match &instruction.target {
                Some(name) => {
                    locals.insert(name.clone(), value);
                }
                None => outcome.value = value,
            }
        }
        Ok(outcome)
    }

    /// `validate` followed by `execute`.
    pub fn run(&self, plan: &str, graph: &Arc<SearchGraph>) -> Result<PlanOutcome, PlanError> {
        let instructions = self.validate(plan)?;
        self.execute(&instructions, graph)
    }

    fn call(&self, call: &GraphCall, graph: &Arc<SearchGraph>) -> Result<PlanValue, GraphError> {
        match call {
            GraphCall::AddSearchNode { id, content } => {
                graph.add_search_node(id.as_str(), content.as_str()).map(PlanValue::Node)
            }
            GraphCall::AddResponseNode { id } => {
                graph.add_response_node(id.as_str()).map(PlanValue::Node)
            }
            GraphCall::AddEdge { from, to } => graph.add_edge(from, to).map(PlanValue::Edge),
            GraphCall::ReadNode { id } => graph.read_node(id).map(PlanValue::Node),
        }
    }
}

fn read_attribute(attr: GraphAttribute, graph: &SearchGraph) -> PlanValue {
    match attr {
        GraphAttribute::Nodes => PlanValue::Nodes(graph.nodes()),
        GraphAttribute::AdjacencyList => PlanValue::Adjacency(graph.adjacency_list()),
        GraphAttribute::ActiveTaskCount => {
            PlanValue::Int(i64::try_from(graph.active_task_count()).unwrap_or(i64::MAX))
        }
    }
}
