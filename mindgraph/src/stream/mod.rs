//! Streaming: the graph's internal event queue and the caller-facing run events.
//!
//! Workers and graph mutators push [`GraphEvent`]s into the [`StreamCollector`]; the
//! orchestrator drains it and republishes each event as a [`RunEvent::Progress`].

mod collector;
mod event;

pub use collector::{GraphEvent, GraphEventKind, StreamCollector};
pub use event::{ProgressUpdate, RunEvent, RunOutcome, TerminalEvent};
