//! Hostbridge: validated command bridge to a long-lived editor host.
//!
//! Commands are checked and normalized locally (`validation`, `convert`),
//! then sent over one persistent TCP connection (`transport`) by the
//! `dispatcher`.

pub mod config;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod schema;
pub mod tools;
pub mod transport;
pub mod validation;

// Re-export commonly used types
pub use config::{BridgeConfig, ConfigError};
pub use dispatcher::Dispatcher;
pub use error::{BridgeError, BridgeResult, ErrorKind, TransportError, ValidationError};
pub use schema::{ActionSchema, ParamType, ToolRegistry, ToolSchema};
pub use transport::{Connection, Transport};
