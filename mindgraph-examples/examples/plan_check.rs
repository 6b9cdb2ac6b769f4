//! Example: validate a plan without running it.
//!
//! Reads planner output (fenced or bare) from a file or stdin, extracts the plan and
//! prints the accepted instructions or the rejection reason.
//!
//! Run: `echo 'graph.add_node("a", "q")' | cargo run -p mindgraph-examples --example plan_check`

use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use mindgraph::{extract_plan, PlanInterpreter};

#[derive(Parser, Debug)]
#[command(name = "plan_check")]
struct Args {
    /// Plan file; stdin when omitted
    path: Option<PathBuf>,

    /// Identifier plans may call methods on
    #[arg(long, default_value = "graph")]
    handle: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let text = match &args.path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let plan = extract_plan(&text);
    match PlanInterpreter::new(args.handle).validate(&plan) {
        Ok(instructions) => {
            println!("accepted: {} instruction(s)", instructions.len());
            for (i, instruction) in instructions.iter().enumerate() {
                println!("{:>3}: {:?}", i + 1, instruction);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("rejected: {}", e);
            std::process::exit(1);
        }
    }
}
