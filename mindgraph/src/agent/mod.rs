//! Collaborator contracts consumed by the engine: planner, search agent, summarizer.
//!
//! Real implementations (model clients, search providers) live outside this crate;
//! [`mock`] ships scripted versions for tests and examples.

mod mock;

pub use mock::{MockPlanner, MockSearchAgent, MockSummarizer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::graph::{HistoryEntry, SearchAnswer};
use crate::references::ReferenceMap;
use crate::worker::SearchError;

/// One planner round: the plan it sent and what the engine reported back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub plan: String,
    /// Reference text of the round, the rejection reason, or failed-call messages.
    pub feedback: String,
}

/// Conversation state given to the planner on every turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub question: String,
    pub turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            turns: Vec::new(),
        }
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }
}

/// What the planner wants next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerReply {
    /// Plan text (possibly fenced) for the plan interpreter.
    Plan(String),
    /// No more graph work; summarize what was gathered.
    Summarize,
    /// Final answer without further graph work.
    Answer(String),
}

/// Produces plans from the conversation so far.
///
/// **Interaction**: Called once per turn by [`Orchestrator`](crate::orchestrator::Orchestrator).
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, conversation: &Conversation) -> Result<PlannerReply, AgentError>;
}

/// Arguments of one sub-search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    /// The search node's content.
    pub query: String,
    /// The root question.
    pub topic: String,
    /// Completed ancestors, nearest first.
    pub history: Vec<HistoryEntry>,
}

/// Performs one sub-search. Owns its own retries against upstream providers.
///
/// **Interaction**: Called by the worker pool, once per search node, under the per-node timeout.
#[async_trait]
pub trait SearchAgent: Send + Sync {
    async fn search(&self, request: SearchRequest) -> Result<SearchAnswer, SearchError>;
}

/// Input of the final synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub question: String,
    /// Consolidated node answers with global citation numbers.
    pub references_text: String,
    pub references: ReferenceMap,
}

/// Writes the final answer from the consolidated references.
///
/// **Interaction**: Called once by the orchestrator when the finish condition holds.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: SummaryRequest) -> Result<String, AgentError>;
}
