//! Wire bridge: [`RunEvent`] and [`GraphSnapshot`] to and from the `stream-event` protocol.
//!
//! Engine types serialize into the `Value` payloads of [`ProtocolEvent`]; citation numbers
//! travel as decimal string keys. [`RunEncoder`] adds the envelope (`session_id`,
//! `event_id`) to every message; [`decode`] reverses it. Node ids, statuses and edge states
//! survive a round trip unchanged.

use std::collections::BTreeMap;

use serde_json::Value;

pub use stream_event::{Envelope, EnvelopeState, ProtocolEvent, WireError};

use crate::graph::{Edge, GraphSnapshot, Node};
use crate::references::ReferenceMap;
use crate::stream::{GraphEventKind, ProgressUpdate, RunEvent, RunOutcome, TerminalEvent};

/// Conversion errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("unknown node event '{0}'")]
    UnknownNodeEvent(String),
    #[error("citation key '{0}' is not a number")]
    BadCitationKey(String),
    #[error("expected {expected}, got '{got}' event")]
    Unexpected { expected: &'static str, got: String },
}

fn kind_name(kind: GraphEventKind) -> &'static str {
    match kind {
        GraphEventKind::NodeStarted => "node_started",
        GraphEventKind::NodeCompleted => "node_completed",
        GraphEventKind::NodeFailed => "node_failed",
        GraphEventKind::EdgeAdded => "edge_added",
        GraphEventKind::ResponseAdded => "response_added",
    }
}

fn kind_from_name(name: &str) -> Result<GraphEventKind, ProtocolError> {
    Ok(match name {
        "node_started" => GraphEventKind::NodeStarted,
        "node_completed" => GraphEventKind::NodeCompleted,
        "node_failed" => GraphEventKind::NodeFailed,
        "edge_added" => GraphEventKind::EdgeAdded,
        "response_added" => GraphEventKind::ResponseAdded,
        other => return Err(ProtocolError::UnknownNodeEvent(other.to_string())),
    })
}

fn references_to_wire(references: &ReferenceMap) -> BTreeMap<String, String> {
    references
        .iter()
        .map(|(n, url)| (n.to_string(), url.clone()))
        .collect()
}

fn references_from_wire(wire: BTreeMap<String, String>) -> Result<ReferenceMap, ProtocolError> {
    wire.into_iter()
        .map(|(key, url)| {
            key.parse::<u32>()
                .map(|n| (n, url))
                .map_err(|_| ProtocolError::BadCitationKey(key))
        })
        .collect()
}

fn event_name(event: &ProtocolEvent) -> String {
    event
        .to_value()
        .ok()
        .and_then(|v| v.get("type").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

/// Converts one run event into its wire form (no envelope).
pub fn run_event_to_protocol(event: &RunEvent) -> Result<ProtocolEvent, ProtocolError> {
    let pe = match event {
        RunEvent::Progress(update) => ProtocolEvent::NodeUpdate {
            id: update.current_node_id.clone(),
            event: kind_name(update.kind).to_string(),
            node: update.node.as_ref().map(serde_json::to_value).transpose()?,
            adjacency: serde_json::to_value(&update.adjacency)?,
            references: references_to_wire(&update.references),
        },
        RunEvent::PlanApplied {
            turn,
            instructions,
            errors,
        } => ProtocolEvent::PlanApplied {
            turn: *turn,
            instructions: *instructions,
            errors: errors.clone(),
        },
        RunEvent::PlanRejected { turn, reason } => ProtocolEvent::PlanRejected {
            turn: *turn,
            reason: reason.clone(),
        },
        RunEvent::Terminal(terminal) => ProtocolEvent::Final {
            answer: terminal.final_answer.clone(),
            references: references_to_wire(&terminal.references),
            outcome: serde_json::to_value(&terminal.outcome)?,
        },
    };
    Ok(pe)
}

/// Inverse of [`run_event_to_protocol`]. A `snapshot` event is not a run event.
pub fn run_event_from_protocol(event: ProtocolEvent) -> Result<RunEvent, ProtocolError> {
    let re = match event {
        ProtocolEvent::NodeUpdate {
            id,
            event,
            node,
            adjacency,
            references,
        } => RunEvent::Progress(ProgressUpdate {
            current_node_id: id,
            kind: kind_from_name(&event)?,
            node: node.map(serde_json::from_value::<Node>).transpose()?,
            adjacency: serde_json::from_value::<BTreeMap<String, Vec<Edge>>>(adjacency)?,
            references: references_from_wire(references)?,
        }),
        ProtocolEvent::PlanApplied {
            turn,
            instructions,
            errors,
        } => RunEvent::PlanApplied {
            turn,
            instructions,
            errors,
        },
        ProtocolEvent::PlanRejected { turn, reason } => RunEvent::PlanRejected { turn, reason },
        ProtocolEvent::Final {
            answer,
            references,
            outcome,
        } => RunEvent::Terminal(TerminalEvent {
            final_answer: answer,
            references: references_from_wire(references)?,
            outcome: serde_json::from_value::<RunOutcome>(outcome)?,
        }),
        other => {
            return Err(ProtocolError::Unexpected {
                expected: "run event",
                got: event_name(&other),
            })
        }
    };
    Ok(re)
}

pub fn snapshot_to_protocol(snapshot: &GraphSnapshot) -> Result<ProtocolEvent, ProtocolError> {
    Ok(ProtocolEvent::Snapshot {
        nodes: snapshot
            .nodes
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<_, _>>()?,
        adjacency: serde_json::to_value(&snapshot.adjacency)?,
    })
}

pub fn snapshot_from_protocol(event: ProtocolEvent) -> Result<GraphSnapshot, ProtocolError> {
    match event {
        ProtocolEvent::Snapshot { nodes, adjacency } => Ok(GraphSnapshot {
            nodes: nodes
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<_, _>>()?,
            adjacency: serde_json::from_value(adjacency)?,
        }),
        other => Err(ProtocolError::Unexpected {
            expected: "snapshot",
            got: event_name(&other),
        }),
    }
}

/// Encodes the messages of one session, numbering them from 1.
///
/// **Interaction**: Feed it every [`RunEvent`] from
/// [`Orchestrator::run`](crate::orchestrator::Orchestrator::run), in order.
pub struct RunEncoder {
    state: EnvelopeState,
}

impl Default for RunEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunEncoder {
    /// New session with a random id.
    pub fn new() -> Self {
        Self::with_session_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            state: EnvelopeState::new(session_id),
        }
    }

    pub fn session_id(&self) -> &str {
        self.state.session_id()
    }

    pub fn encode(&mut self, event: &RunEvent) -> Result<Value, ProtocolError> {
        let pe = run_event_to_protocol(event)?;
        Ok(stream_event::to_json(&pe, &mut self.state)?)
    }

    pub fn encode_snapshot(&mut self, snapshot: &GraphSnapshot) -> Result<Value, ProtocolError> {
        let pe = snapshot_to_protocol(snapshot)?;
        Ok(stream_event::to_json(&pe, &mut self.state)?)
    }
}

/// Splits a wire message into its envelope and run event.
pub fn decode(value: Value) -> Result<(Envelope, RunEvent), ProtocolError> {
    let (envelope, pe) = stream_event::from_json(value)?;
    Ok((envelope, run_event_from_protocol(pe)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKind, NodeStatus, SearchAnswer};

    fn completed_node() -> Node {
        Node {
            id: "s1".to_string(),
            content: "weather today".to_string(),
            kind: NodeKind::Search,
            status: NodeStatus::Completed,
            result: Some(SearchAnswer::new("Sunny [[1]].").with_citation(1, "http://wx.example")),
            error: None,
        }
    }

    /// **Scenario**: A progress update survives encode/decode, including citation keys.
    #[test]
    fn progress_update_round_trips() {
        let update = RunEvent::Progress(ProgressUpdate {
            current_node_id: "s1".to_string(),
            kind: GraphEventKind::NodeCompleted,
            node: Some(completed_node()),
            adjacency: BTreeMap::new(),
            references: ReferenceMap::from([(1, "http://wx.example".to_string())]),
        });
        let mut encoder = RunEncoder::with_session_id("sess-1");
        let value = encoder.encode(&update).unwrap();
        assert_eq!(value["type"], "node_update");
        assert_eq!(value["event"], "node_completed");
        assert_eq!(value["session_id"], "sess-1");

        let (envelope, decoded) = decode(value).unwrap();
        assert_eq!(envelope.event_id, 1);
        assert_eq!(envelope.session_id, "sess-1");
        assert_eq!(decoded, update);
    }

    /// **Scenario**: Unknown node event names and non-numeric citation keys are rejected.
    #[test]
    fn malformed_wire_values_are_errors() {
        assert!(matches!(
            kind_from_name("node_enter"),
            Err(ProtocolError::UnknownNodeEvent(_))
        ));
        let wire = BTreeMap::from([("one".to_string(), "http://x".to_string())]);
        assert!(matches!(
            references_from_wire(wire),
            Err(ProtocolError::BadCitationKey(_))
        ));
    }

    /// **Scenario**: A snapshot event is not a run event and vice versa.
    #[test]
    fn snapshot_and_run_events_do_not_mix() {
        let snapshot = snapshot_to_protocol(&GraphSnapshot::default()).unwrap();
        assert!(matches!(
            run_event_from_protocol(snapshot),
            Err(ProtocolError::Unexpected { .. })
        ));
        let rejected = ProtocolEvent::PlanRejected {
            turn: 1,
            reason: "x".to_string(),
        };
        assert!(snapshot_from_protocol(rejected).is_err());
    }
}
