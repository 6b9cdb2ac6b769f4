//! Example: one full run with scripted collaborators, printed as wire messages.
//!
//! The planner splits the question into two sub-searches, then asks for the response
//! node; the search agent cites a made-up URL per query; the summarizer echoes the
//! consolidated references. Each event is printed as one JSON line.
//!
//! Config comes from `MINDGRAPH_*` variables, `.env` and `$XDG_CONFIG_HOME/mindgraph/config.toml`.
//!
//! Run: `cargo run -p mindgraph-examples --example mock_search -- "why is the sky blue?"`

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mindgraph::{
    EngineConfig, MockPlanner, MockSearchAgent, MockSummarizer, Orchestrator, PlannerReply,
    RunEncoder, SearchAnswer,
};
use tokio_stream::StreamExt;

#[derive(Parser, Debug)]
#[command(name = "mock_search")]
#[command(about = "Run the search graph engine with mock collaborators")]
struct Args {
    /// Root question
    #[arg(default_value = "why is the sky blue?")]
    question: String,

    /// Overrides MINDGRAPH_MAX_TURN
    #[arg(long, value_name = "N")]
    max_turn: Option<usize>,

    /// Milliseconds each mock search sleeps before answering
    #[arg(long, default_value_t = 50)]
    search_delay_ms: u64,

    /// Pretty-print each message
    #[arg(long)]
    pretty: bool,
}

fn scripted_plans() -> Vec<PlannerReply> {
    let first = "```python\n\
        graph.add_node(\"physics\", \"light scattering in the atmosphere\")\n\
        graph.add_edge(\"root\", \"physics\")\n\
        graph.add_node(\"history\", \"who explained Rayleigh scattering\")\n\
        graph.add_edge(\"root\", \"history\")\n\
        ```";
    let second = "```python\n\
        graph.add_response_node()\n\
        graph.add_edge(\"physics\", \"response\")\n\
        graph.add_edge(\"history\", \"response\")\n\
        ```";
    vec![
        PlannerReply::Plan(first.to_string()),
        PlannerReply::Plan(second.to_string()),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut config = EngineConfig::load("mindgraph", None)?;
    let _guard = env_config::init_tracing("mindgraph=info")?;
    if let Some(max_turn) = args.max_turn {
        config = config.with_max_turn(max_turn);
    }

    let agent = MockSearchAgent::from_fn(|request| {
        let slug: String = request
            .query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        Ok(SearchAnswer::new(format!("Notes on {} [[1]].", request.query))
            .with_citation(1, format!("https://example.org/{}", slug)))
    })
    .with_delay(Duration::from_millis(args.search_delay_ms));

    let orchestrator = Orchestrator::new(
        Arc::new(MockPlanner::scripted(scripted_plans())),
        Arc::new(MockSummarizer::echo()),
        Arc::new(agent),
        config,
    )?;

    let mut encoder = RunEncoder::new();
    tracing::info!(session_id = encoder.session_id(), "starting run");
    let mut stream = orchestrator.run(args.question);
    while let Some(event) = stream.next().await {
        let value = encoder.encode(&event)?;
        if args.pretty {
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            println!("{}", value);
        }
    }
    Ok(())
}
