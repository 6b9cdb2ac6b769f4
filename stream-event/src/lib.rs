//! Wire protocol for run streams: one JSON object per event, `type` + payload + envelope.
//!
//! This crate does not depend on mindgraph. Engine types travel as `serde_json::Value`
//! payloads; mindgraph's `protocol` module converts in both directions and calls
//! [`to_json`] / [`from_json`].

pub mod envelope;
pub mod event;

pub use envelope::{from_json, to_json, Envelope, EnvelopeState, WireError};
pub use event::ProtocolEvent;
