//! Error types for the bridge.
//!
//! Three disjoint failure kinds reach callers: local validation, a remote
//! command rejected by the host, and connection-level transport failures.
//! Only the last one is retried.

use thiserror::Error;

/// A parameter failed local validation before anything was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Offending parameter, when the failure is tied to one.
    pub param: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            param: None,
            message: message.into(),
        }
    }

    pub fn for_param(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            param: Some(param.into()),
            message: message.into(),
        }
    }
}

/// Failures of a single round trip on the socket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not open the TCP connection
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket read/write error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Per-read timeout elapsed while waiting for the response
    #[error("Timed out waiting for response after {received} bytes")]
    Timeout { received: usize },

    /// Peer closed the socket before sending anything
    #[error("Connection closed before any response data was received")]
    Closed,

    /// Peer closed the socket in the middle of a response
    #[error("Connection closed with incomplete response ({received} bytes received)")]
    Incomplete { received: usize },

    /// Response bytes are not a valid response envelope
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Liveness probe did not come back with pong
    #[error("Liveness probe failed: {0}")]
    Probe(String),
}

/// Coarse classification callers can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Command,
    Connection,
}

/// Errors surfaced by the dispatcher and the transport.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Parameters were rejected locally
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The host answered with `status: "error"`
    #[error("Command error: {0}")]
    Command(String),

    /// Transport failed on every attempt
    #[error("Connection error after {attempts} attempt(s): {cause}")]
    Connection {
        attempts: u32,
        #[source]
        cause: TransportError,
    },
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::Validation(_) => ErrorKind::Validation,
            BridgeError::Command(_) => ErrorKind::Command,
            BridgeError::Connection { .. } => ErrorKind::Connection,
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
