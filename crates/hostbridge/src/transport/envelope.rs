//! Wire envelopes exchanged with the host.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{"type": <kind>, "params": {...}}`
#[derive(Debug, Serialize)]
pub struct CommandEnvelope<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub params: &'a Map<String, Value>,
}

impl CommandEnvelope<'_> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(self).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

/// `{"status": "success"|"error", "result": ..., "error": ..., "message": ...}`
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    pub status: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// What a parsed response means for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Value),
    /// The host rejected the command; carries its error text
    Rejected(String),
}

impl ResponseEnvelope {
    pub fn parse(raw: &[u8]) -> Result<Self, TransportError> {
        serde_json::from_slice(raw).map_err(|e| {
            TransportError::Malformed(format!("{} ({} bytes)", e, raw.len()))
        })
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }

    /// Host error text: `error`, then `message`, then a generic fallback.
    pub fn error_text(&self) -> String {
        [&self.error, &self.message]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .unwrap_or_else(|| "Unknown error from host".to_string())
    }

    pub fn into_reply(self) -> Reply {
        if self.is_error() {
            Reply::Rejected(self.error_text())
        } else {
            Reply::Success(self.result)
        }
    }
}
