//! Streamed event records
//!
//! Every record has the shape `{"type": ..., "payload": ...}` and is framed as
//! one JSON value per line (NDJSON).

use serde::{Deserialize, Serialize};

use crate::model::claim::Claim;
use crate::model::job::ProgressPhase;

/// Content type of the claim stream
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub phase: ProgressPhase,
    pub processed: u64,
    pub total: u64,
    /// Unix seconds when the snapshot was taken
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// `done` carries an empty object so every record has a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonePayload {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    Progress(ProgressPayload),
    Claim(Claim),
    Done(DonePayload),
    Error(ErrorPayload),
}

impl StreamEvent {
    pub fn progress(phase: ProgressPhase, processed: u64, total: u64) -> Self {
        StreamEvent::Progress(ProgressPayload {
            phase,
            processed,
            total,
            ts: chrono::Utc::now().timestamp(),
        })
    }

    pub fn done() -> Self {
        StreamEvent::Done(DonePayload::default())
    }

    /// Error event; `message` must already be free of credentials and document content
    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Whether this event ends a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done(_) | StreamEvent::Error(_))
    }

    /// Encode as one newline-terminated JSON line
    pub fn to_ndjson_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}
