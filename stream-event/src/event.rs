//! Protocol event types (type + payload, no envelope).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stream event on the wire.
///
/// Naming: `id` in a payload is a graph node id (e.g. `"s1"`); the envelope never carries
/// a node id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    /// A node started, completed, failed, gained an edge, or the response node was added.
    NodeUpdate {
        id: String,
        /// `node_started`, `node_completed`, `node_failed`, `edge_added`, `response_added`.
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<Value>,
        /// Source node id -> outgoing edges.
        adjacency: Value,
        /// Citation number (decimal string) -> URL.
        #[serde(default)]
        references: BTreeMap<String, String>,
    },
    PlanApplied {
        turn: usize,
        instructions: usize,
        #[serde(default)]
        errors: Vec<String>,
    },
    PlanRejected {
        turn: usize,
        reason: String,
    },
    /// Whole-graph view: nodes in insertion order plus adjacency.
    Snapshot {
        nodes: Vec<Value>,
        adjacency: Value,
    },
    /// Last event of a run.
    Final {
        answer: String,
        #[serde(default)]
        references: BTreeMap<String, String>,
        outcome: Value,
    },
}

impl ProtocolEvent {
    /// Serializes to a JSON object without envelope fields.
    ///
    /// Use [`crate::to_json`] to get the envelope injected.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parses a JSON object; envelope fields, if present, are ignored.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ProtocolEvent::Final { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::ProtocolEvent;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn node_update_uses_payload_id_and_string_reference_keys() {
        let event = ProtocolEvent::NodeUpdate {
            id: "s1".to_string(),
            event: "node_completed".to_string(),
            node: None,
            adjacency: json!({}),
            references: BTreeMap::from([("1".to_string(), "http://wx.example".to_string())]),
        };
        let value = event.to_value().unwrap();

        assert_eq!(value["type"], "node_update");
        assert_eq!(value["id"], "s1");
        assert_eq!(value["references"]["1"], "http://wx.example");
        assert!(value.get("node").is_none());
    }

    #[test]
    fn parses_final_with_extra_envelope_keys() {
        let value = json!({
            "type": "final",
            "answer": "Sunny.",
            "references": {"1": "http://wx.example"},
            "outcome": {"kind": "finished"},
            "session_id": "sess-1",
            "event_id": 9
        });
        let event = ProtocolEvent::from_value(value).unwrap();
        assert!(event.is_final());
        match event {
            ProtocolEvent::Final { references, .. } => {
                assert_eq!(references.get("1").map(String::as_str), Some("http://wx.example"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(ProtocolEvent::from_value(json!({"type": "node_enter", "id": "x"})).is_err());
    }
}
