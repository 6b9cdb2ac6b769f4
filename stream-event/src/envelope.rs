//! Envelope (`session_id`, `event_id`) stamped on every wire message of a run.
//!
//! A session is one run. Event ids start at 1 and grow by one per message, so a reader
//! can spot gaps and reorder messages delivered out of band.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::event::ProtocolEvent;

const SESSION_KEY: &str = "session_id";
const EVENT_KEY: &str = "event_id";

/// Errors reading or writing a wire message.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("wire message is not a JSON object")]
    NotAnObject,
    #[error("wire message has no valid '{0}'")]
    MissingEnvelope(&'static str),
}

/// Envelope fields of one message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Envelope {
    pub session_id: String,
    pub event_id: u64,
}

impl Envelope {
    /// Writes the envelope keys into `message`, replacing payload keys of the same name.
    pub fn stamp(&self, message: &mut Map<String, Value>) {
        message.insert(SESSION_KEY.to_string(), Value::String(self.session_id.clone()));
        message.insert(EVENT_KEY.to_string(), Value::from(self.event_id));
    }

    /// Reads the envelope keys of a message. Both must be present.
    pub fn read(message: &Value) -> Result<Self, WireError> {
        let session_id = message
            .get(SESSION_KEY)
            .and_then(Value::as_str)
            .ok_or(WireError::MissingEnvelope(SESSION_KEY))?;
        let event_id = message
            .get(EVENT_KEY)
            .and_then(Value::as_u64)
            .ok_or(WireError::MissingEnvelope(EVENT_KEY))?;
        Ok(Self {
            session_id: session_id.to_string(),
            event_id,
        })
    }
}

/// Envelope counter for one session.
#[derive(Debug, Clone)]
pub struct EnvelopeState {
    session_id: String,
    issued: u64,
}

impl EnvelopeState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            issued: 0,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Id of the last issued envelope; 0 before the first message.
    pub fn last_event_id(&self) -> u64 {
        self.issued
    }

    /// Envelope for the next message.
    pub fn next_envelope(&mut self) -> Envelope {
        self.issued += 1;
        Envelope {
            session_id: self.session_id.clone(),
            event_id: self.issued,
        }
    }
}

/// Serializes `event` and stamps it with the next envelope of `state`.
///
/// The counter only advances for messages that serialized.
pub fn to_json(event: &ProtocolEvent, state: &mut EnvelopeState) -> Result<Value, WireError> {
    let Value::Object(mut message) = event.to_value()? else {
        return Err(WireError::NotAnObject);
    };
    state.next_envelope().stamp(&mut message);
    Ok(Value::Object(message))
}

/// Splits a wire message into its envelope and event.
pub fn from_json(message: Value) -> Result<(Envelope, ProtocolEvent), WireError> {
    if !message.is_object() {
        return Err(WireError::NotAnObject);
    }
    let envelope = Envelope::read(&message)?;
    let event = ProtocolEvent::from_value(message)?;
    Ok((envelope, event))
}
