//! # MindGraph
//!
//! A search-task graph engine. A [`Planner`] decomposes a question into sub-searches by
//! emitting short plans; the engine validates each plan in a sandbox, applies it to a
//! directed graph of search nodes, runs the searches concurrently through a bounded
//! [`WorkerPool`], streams progress, consolidates citations into one global numbering,
//! and hands the result to a [`Summarizer`] for the final answer.
//!
//! ## Design principles
//!
//! - **Plans are data**: planner output is parsed against a fixed allow-list into
//!   [`Instruction`]s; nothing is evaluated until validation succeeds, so a rejected plan
//!   never touches the graph.
//! - **One writer per node**: each search node is settled by exactly one worker; readers
//!   only ever see copies ([`Node`], [`GraphSnapshot`]).
//! - **Always an answer**: every run ends with one [`TerminalEvent`] carrying non-empty text,
//!   also when a loop or timeout forces termination ([`ExecutionTracker`]).
//!
//! ## Main modules
//!
//! - [`graph`]: [`SearchGraph`], [`Node`], [`Edge`], [`GraphSnapshot`].
//! - [`plan`]: [`extract_plan`], [`PlanInterpreter`], [`PlanError`].
//! - [`worker`]: [`WorkerPool`], [`SearchError`].
//! - [`tracker`]: [`ExecutionTracker`], [`LoopPattern`], [`TrackerState`].
//! - [`references`]: [`consolidate`], [`ReferenceMap`].
//! - [`stream`]: [`StreamCollector`], [`RunEvent`], [`ProgressUpdate`].
//! - [`orchestrator`]: [`Orchestrator`] with `run` / `run_with_callback` / `invoke`.
//! - [`agent`]: collaborator traits and mocks ([`MockPlanner`], [`MockSearchAgent`], [`MockSummarizer`]).
//! - [`protocol`]: wire bridge to the `stream-event` crate ([`RunEncoder`], [`decode`]).
//! - [`config`]: [`EngineConfig`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mindgraph::{
//!     EngineConfig, MockPlanner, MockSearchAgent, MockSummarizer, Orchestrator, PlannerReply,
//!     SearchAnswer,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let planner = MockPlanner::scripted(vec![PlannerReply::Plan(
//!     "graph.add_node(\"s1\", \"weather today\")\n\
//!      graph.add_edge(\"root\", \"s1\")\n\
//!      graph.add_response_node()"
//!         .to_string(),
//! )]);
//! let agent = MockSearchAgent::responding(
//!     SearchAnswer::new("Sunny [[1]].").with_citation(1, "http://wx.example"),
//! );
//! let orchestrator = Orchestrator::new(
//!     Arc::new(planner),
//!     Arc::new(MockSummarizer::echo()),
//!     Arc::new(agent),
//!     EngineConfig::default(),
//! )
//! .expect("valid config");
//!
//! let terminal = orchestrator.invoke("weather?").await;
//! println!("{}", terminal.final_answer);
//! # }
//! ```
//!
//! Run the demo: `cargo run -p mindgraph-examples --example mock_search -- "weather?"`

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod plan;
pub mod protocol;
pub mod references;
pub mod stream;
pub mod tracker;
pub mod worker;

pub use agent::{
    Conversation, ConversationTurn, MockPlanner, MockSearchAgent, MockSummarizer, Planner,
    PlannerReply, SearchAgent, SearchRequest, Summarizer, SummaryRequest,
};
pub use config::{ConfigError, EngineConfig, MAX_TURN_LIMIT};
pub use error::AgentError;
pub use graph::{
    Edge, EdgeState, GraphError, GraphSnapshot, GraphStateView, HistoryEntry, Node, NodeKind,
    NodeStatus, SearchAnswer, SearchGraph, ROOT_ID,
};
pub use orchestrator::{Orchestrator, RunError};
pub use plan::{extract_plan, Instruction, PlanError, PlanInterpreter, PlanOutcome, PlanValue};
pub use protocol::{decode, ProtocolError, RunEncoder};
pub use references::{consolidate, Consolidated, ReferenceMap, SkippedNode};
pub use stream::{
    GraphEvent, GraphEventKind, ProgressUpdate, RunEvent, RunOutcome, StreamCollector,
    TerminalEvent,
};
pub use tracker::{
    ExecutionRecord, ExecutionSummary, ExecutionTracker, LoopPattern, TrackerLimits, TrackerState,
};
pub use worker::{SearchError, WorkerPool};

/// Test subscriber for unit tests in `src/**`; see `tests/init_logging.rs` for the
/// integration-test counterpart.
#[cfg(test)]
mod test_logging {
    use tracing_subscriber::EnvFilter;

    #[ctor::ctor]
    fn install_test_subscriber() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}
