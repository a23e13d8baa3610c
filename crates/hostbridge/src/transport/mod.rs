//! TCP transport to the editor host.
//!
//! The dispatcher talks to a `Transport` instead of a socket directly, which
//! keeps it testable with a mock. `Connection` is the real implementation:
//! one blocking `TcpStream`, one command in flight at a time, with retry,
//! backoff and reconnect on connection-level failures.

pub mod envelope;
pub mod framing;
pub mod retry;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult, TransportError};
use envelope::{CommandEnvelope, Reply, ResponseEnvelope};
use framing::{read_response, PING_REQUEST, PONG_PREAMBLE};
use retry::{thread_sleeper, RetryPolicy, Sleeper};
use serde_json::{json, Map, Value};
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

/// Command kind that triggers the raw liveness probe instead of a JSON command.
pub const PING_KIND: &str = "ping";

/// Sends one command and returns the host's result payload.
pub trait Transport: Send {
    fn send(&mut self, kind: &str, params: Map<String, Value>) -> BridgeResult<Value>;
}

/// Outcome of a single attempt, before the retry loop classifies it.
#[derive(Debug)]
enum AttemptError {
    Transport(TransportError),
    Rejected(String),
}

impl From<TransportError> for AttemptError {
    fn from(err: TransportError) -> Self {
        AttemptError::Transport(err)
    }
}

impl From<io::Error> for AttemptError {
    fn from(err: io::Error) -> Self {
        AttemptError::Transport(TransportError::Io(err))
    }
}

/// Persistent connection to the editor host.
pub struct Connection {
    config: BridgeConfig,
    policy: RetryPolicy,
    stream: Option<TcpStream>,
    retry_count: u32,
    sleeper: Sleeper,
}

impl Connection {
    /// Create a disconnected connection. The socket opens on first use.
    pub fn new(config: BridgeConfig) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self {
            config,
            policy,
            stream: None,
            retry_count: 0,
            sleeper: thread_sleeper(),
        }
    }

    /// Replace how the retry loop sleeps between attempts.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Retries performed by the most recent `send` or `ensure_live`.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Open a new socket, dropping any existing one first.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.close();

        let addr = self.config.address();
        let timeout = self.config.timeout();
        let resolved = addr
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let mut last_err = None;
        let mut stream = None;
        for socket_addr in resolved {
            match TcpStream::connect_timeout(&socket_addr, timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                return Err(TransportError::Connect {
                    addr,
                    source: last_err.unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
                    }),
                })
            }
        };

        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Could not set TCP_NODELAY: {}", e);
        }

        log::info!("Connected to host at {}", addr);
        self.stream = Some(stream);
        Ok(())
    }

    /// Close any existing socket, ignoring errors, and open a fresh one.
    /// Retry bookkeeping is left to the caller.
    pub fn reconnect(&mut self) -> Result<(), TransportError> {
        log::debug!("Reconnecting to {}", self.config.address());
        self.connect()
    }

    pub fn disconnect(&mut self) {
        if self.stream.is_some() {
            log::info!("Disconnecting from {}", self.config.address());
        }
        self.close();
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Make sure the connection is usable.
    ///
    /// A live socket is probed; if the probe fails it is discarded. A missing
    /// or discarded socket is opened and probed under the normal retry
    /// policy, reusing the socket each reconnect has already opened.
    pub fn ensure_live(&mut self) -> BridgeResult<()> {
        if self.stream.is_some() {
            match self.probe() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("Connection is stale, reconnecting: {}", e);
                    self.close();
                }
            }
        }
        self.run_with_retry(|conn| {
            if !conn.is_connected() {
                conn.connect()?;
            }
            conn.probe().map_err(AttemptError::from)
        })
    }

    /// Send the raw liveness probe, connecting first if needed.
    pub fn ping(&mut self) -> BridgeResult<()> {
        self.send(PING_KIND, Map::new()).map(|_| ())
    }

    fn probe(&mut self) -> Result<(), TransportError> {
        let chunk_size = self.config.buffer_size;
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        stream.write_all(PING_REQUEST)?;
        stream.flush()?;
        let raw = read_response(stream, chunk_size)?;

        if raw.starts_with(PONG_PREAMBLE) {
            Ok(())
        } else {
            let shown = &raw[..raw.len().min(128)];
            Err(TransportError::Probe(format!(
                "unexpected response: {}",
                String::from_utf8_lossy(shown)
            )))
        }
    }

    fn attempt(&mut self, kind: &str, params: &Map<String, Value>) -> Result<Value, AttemptError> {
        if self.stream.is_none() {
            self.connect()?;
        }

        if kind == PING_KIND && params.is_empty() {
            self.probe()?;
            return Ok(json!({ "message": "pong" }));
        }

        let payload = CommandEnvelope { kind, params }.to_bytes()?;
        let chunk_size = self.config.buffer_size;
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        log::debug!("Sending '{}' command ({} bytes)", kind, payload.len());
        stream.write_all(&payload)?;
        stream.flush()?;

        let raw = read_response(stream, chunk_size)?;
        match ResponseEnvelope::parse(&raw)?.into_reply() {
            Reply::Success(result) => Ok(result),
            Reply::Rejected(message) => Err(AttemptError::Rejected(message)),
        }
    }

    /// Run `op` until it succeeds, is rejected by the host, or the retry
    /// budget is spent. Transport failures close the socket, sleep with
    /// doubling delay, reconnect and try again.
    fn run_with_retry<T>(
        &mut self,
        mut op: impl FnMut(&mut Self) -> Result<T, AttemptError>,
    ) -> BridgeResult<T> {
        self.retry_count = 0;
        let mut outcome = op(self);

        loop {
            let cause = match outcome {
                Ok(value) => return Ok(value),
                Err(AttemptError::Rejected(message)) => return Err(BridgeError::Command(message)),
                Err(AttemptError::Transport(cause)) => cause,
            };

            self.close();
            if self.retry_count >= self.policy.max_retries {
                log::error!(
                    "Giving up on {} after {} attempt(s): {}",
                    self.config.address(),
                    self.retry_count + 1,
                    cause
                );
                return Err(BridgeError::Connection {
                    attempts: self.retry_count + 1,
                    cause,
                });
            }

            let delay = self.policy.delay_for(self.retry_count);
            log::warn!(
                "Attempt {}/{} failed: {}. Retrying in {:?}",
                self.retry_count + 1,
                self.policy.max_attempts(),
                cause,
                delay
            );
            (self.sleeper)(delay);
            self.retry_count += 1;

            outcome = match self.reconnect() {
                Ok(()) => op(self),
                Err(e) => Err(AttemptError::Transport(e)),
            };
        }
    }
}

impl Transport for Connection {
    fn send(&mut self, kind: &str, params: Map<String, Value>) -> BridgeResult<Value> {
        self.run_with_retry(|conn| conn.attempt(kind, &params))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.config.address())
            .field("connected", &self.stream.is_some())
            .field("retry_count", &self.retry_count)
            .finish()
    }
}
