//! Logbook webhook payloads.
//!
//! ```text
//! {"type": "result-added",   "result": {"id": 123}}
//! {"type": "result-updated", "result": {"id": 123}}
//! {"type": "result-deleted", "result_id": 123}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use thiserror::Error;

/// Identifier of a logbook result.
///
/// Kept in its JSON shape so it is echoed and dispatched exactly as received:
/// `123.0` stays `123.0` and `-5` stays `-5`. Zero, `""`, `null` and `false`
/// are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultId {
    Number(Number),
    Text(String),
}

impl ResultId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(ResultId::Number(n.clone())),
            Value::String(s) if !s.is_empty() => Some(ResultId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultId::Number(n) => write!(f, "{}", n),
            ResultId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ResultId {
    fn from(n: u64) -> Self {
        ResultId::Number(n.into())
    }
}

/// The recognised event tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "result-added")]
    ResultAdded,
    #[serde(rename = "result-updated")]
    ResultUpdated,
    #[serde(rename = "result-deleted")]
    ResultDeleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ResultAdded => "result-added",
            EventKind::ResultUpdated => "result-updated",
            EventKind::ResultDeleted => "result-deleted",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "result-added" => Some(EventKind::ResultAdded),
            "result-updated" => Some(EventKind::ResultUpdated),
            "result-deleted" => Some(EventKind::ResultDeleted),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `result-added`, id from `result.id`.
    Added { result_id: ResultId },
    /// `result-updated`, id from `result.id`.
    Updated { result_id: ResultId },
    /// `result-deleted`, id from top-level `result_id`.
    Deleted { result_id: ResultId },
}

impl WebhookEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WebhookEvent::Added { .. } => EventKind::ResultAdded,
            WebhookEvent::Updated { .. } => EventKind::ResultUpdated,
            WebhookEvent::Deleted { .. } => EventKind::ResultDeleted,
        }
    }

    pub fn result_id(&self) -> &ResultId {
        match self {
            WebhookEvent::Added { result_id }
            | WebhookEvent::Updated { result_id }
            | WebhookEvent::Deleted { result_id } => result_id,
        }
    }
}

/// Why a body could not be turned into a [`WebhookEvent`].
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing event type")]
    MissingType,

    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Missing {field} in {kind} event")]
    MissingField { field: &'static str, kind: EventKind },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    result_id: Option<Value>,
}

/// Parse a raw request body.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, ParseError> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    let tag = match envelope.kind {
        Some(Value::String(tag)) => tag,
        Some(Value::Null) | None => return Err(ParseError::MissingType),
        Some(other) => return Err(ParseError::UnknownType(other.to_string())),
    };
    let kind = EventKind::from_tag(&tag).ok_or(ParseError::UnknownType(tag))?;

    match kind {
        EventKind::ResultAdded | EventKind::ResultUpdated => {
            let result_id = envelope
                .result
                .as_ref()
                .and_then(|r| r.get("id"))
                .and_then(ResultId::from_value)
                .ok_or(ParseError::MissingField { field: "result.id", kind })?;
            Ok(if kind == EventKind::ResultAdded {
                WebhookEvent::Added { result_id }
            } else {
                WebhookEvent::Updated { result_id }
            })
        }
        EventKind::ResultDeleted => {
            let result_id = envelope
                .result_id
                .as_ref()
                .and_then(ResultId::from_value)
                .ok_or(ParseError::MissingField { field: "result_id", kind })?;
            Ok(WebhookEvent::Deleted { result_id })
        }
    }
}
