//! Command dispatch: validate, normalize, send.
//!
//! The dispatcher owns the tool registry and a shared `Transport`. The
//! transport sits behind a mutex held for the whole round trip, so every
//! command is written and its full response read before the next command's
//! bytes go out.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult, TransportError, ValidationError};
use crate::schema::{ToolRegistry, ToolSchema};
use crate::transport::{Connection, Transport};
use crate::validation::validate_and_convert;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Request flag asking for validation only.
pub const VALIDATE_ONLY_KEY: &str = "validate_only";
/// Camel-case alias some clients send.
pub const VALIDATE_ONLY_ALIAS: &str = "validateOnly";

/// Dispatches tool commands through validation to a `Transport`.
pub struct Dispatcher<T: Transport> {
    registry: Arc<ToolRegistry>,
    transport: Arc<Mutex<T>>,
}

impl<T: Transport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl Dispatcher<Connection> {
    /// Dispatcher over a real connection with the built-in tools.
    pub fn from_config(config: BridgeConfig) -> Self {
        Self::new(ToolRegistry::builtin(), Connection::new(config))
    }

    /// Probe the connection, reconnecting under the retry policy if needed.
    pub fn ensure_live(&self) -> BridgeResult<()> {
        self.lock_transport().ensure_live()
    }
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(registry: ToolRegistry, transport: T) -> Self {
        Self {
            registry: Arc::new(registry),
            transport: Arc::new(Mutex::new(transport)),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Registered tools, for introspection.
    pub fn tools(&self) -> impl Iterator<Item = &ToolSchema> {
        self.registry.tools()
    }

    /// Shared handle to the transport.
    pub fn transport(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.transport)
    }

    fn lock_transport(&self) -> MutexGuard<'_, T> {
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and normalize `params` for `kind` without sending anything.
    /// Tools missing from the registry pass through unchanged.
    pub fn validate(
        &self,
        kind: &str,
        params: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut params = params.clone();
        let action = extract_action(&mut params);
        normalize(self.registry.get(kind), &action, &params)
    }

    /// Run one command end to end.
    ///
    /// With the validate-only flag set, validation failures come back as
    /// `{"valid": false, "reason": ...}` and locally verifiable actions return
    /// `{"valid": true}` without touching the transport. Everything else is
    /// validated (errors propagate) and sent.
    pub fn dispatch(&self, kind: &str, params: &Map<String, Value>) -> BridgeResult<Value> {
        let mut params = params.clone();
        let action = extract_action(&mut params);
        let tool = self.registry.get(kind);
        let normalized = normalize(tool, &action, &params);

        if is_validate_only(&params) {
            match &normalized {
                Err(e) => {
                    log::debug!("Validate-only {} '{}' rejected: {}", kind, action, e);
                    return Ok(json!({ "valid": false, "reason": e.message }));
                }
                Ok(_) if tool.is_some_and(|t| t.is_locally_verifiable(&action)) => {
                    return Ok(json!({ "valid": true }));
                }
                Ok(_) => {
                    log::debug!(
                        "Validate-only {} '{}' needs host verification",
                        kind,
                        action
                    );
                }
            }
        }

        let normalized = normalized?;
        self.lock_transport().send(kind, normalized)
    }

    /// `dispatch` on tokio's blocking pool, for callers on the async runtime.
    pub async fn dispatch_async(
        &self,
        kind: impl Into<String>,
        params: Map<String, Value>,
    ) -> BridgeResult<Value> {
        let this = self.clone();
        let kind = kind.into();
        match tokio::task::spawn_blocking(move || this.dispatch(&kind, &params)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(BridgeError::Connection {
                attempts: 0,
                cause: TransportError::Io(std::io::Error::other(format!(
                    "dispatch worker cancelled: {e}"
                ))),
            }),
        }
    }
}

fn normalize(
    tool: Option<&ToolSchema>,
    action: &str,
    params: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    match tool {
        Some(tool) => validate_and_convert(tool, action, params),
        None => Ok(params.clone()),
    }
}

/// Lower-case `action` in place and return it (empty if absent).
fn extract_action(params: &mut Map<String, Value>) -> String {
    let action = params
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_lowercase);
    match action {
        Some(action) => {
            params.insert("action".to_string(), Value::String(action.clone()));
            action
        }
        None => String::new(),
    }
}

fn is_validate_only(params: &Map<String, Value>) -> bool {
    [VALIDATE_ONLY_KEY, VALIDATE_ONLY_ALIAS]
        .iter()
        .any(|key| params.get(*key).and_then(Value::as_bool) == Some(true))
}

// ── MockTransport for testing ────────────────────────────────────────────


// ── Tests ────────────────────────────────────────────────────────────────
