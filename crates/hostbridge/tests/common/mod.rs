//! Test helpers: a scripted in-process editor host on a loopback TCP port.

#![allow(dead_code)]

use hostbridge::transport::retry::Sleeper;
use hostbridge::BridgeConfig;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// What the host does with one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Session {
    /// Close immediately without reading
    Hangup,
    /// Read one request, then close without answering
    Silent,
    /// Read one request, then keep the socket open without answering
    Stall,
    /// Answer up to `n` requests, then close
    Serve(usize),
    /// Answer until the client disconnects
    ServeForever,
    /// Answer commands, but reply to the probe with an error envelope
    RejectPing,
}

/// Builds the response body for a `(kind, params)` request.
pub type Handler = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// Echoes the request back as the result.
pub fn echo_handler() -> Handler {
    Arc::new(|kind: &str, params: &Value| {
        json!({ "status": "success", "result": { "kind": kind, "params": params } })
    })
}

pub const PONG: &[u8] = br#"{"status":"success","result":{"message":"pong"}}"#;

/// Probe reply from a host that is up but refusing work.
pub const BUSY: &[u8] = br#"{"status":"error","error":"busy"}"#;

pub struct MockHostBuilder {
    script: VecDeque<Session>,
    fallback: Session,
    handler: Handler,
    chunk_size: Option<usize>,
}

impl MockHostBuilder {
    /// Behaviors for the first connections, in accept order.
    pub fn script(mut self, sessions: impl IntoIterator<Item = Session>) -> Self {
        self.script.extend(sessions);
        self
    }

    /// Behavior once the script is used up.
    pub fn fallback(mut self, session: Session) -> Self {
        self.fallback = session;
        self
    }

    pub fn handler(mut self, handler: Handler) -> Self {
        self.handler = handler;
        self
    }

    /// Write responses in pieces of `size` bytes with a short pause between.
    pub fn chunked(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn start(self) -> MockHost {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(HostState {
            accepted: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(self.script),
        });

        let fallback = self.fallback;
        let handler = self.handler;
        let chunk_size = self.chunk_size;
        let accept_state = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let session = accept_state
                    .script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or(fallback);
                let state = Arc::clone(&accept_state);
                let handler = Arc::clone(&handler);
                thread::spawn(move || serve(stream, session, &state, &handler, chunk_size));
            }
        });

        MockHost { addr, state }
    }
}

struct HostState {
    accepted: AtomicUsize,
    requests: Mutex<Vec<Value>>,
    script: Mutex<VecDeque<Session>>,
}

/// Handle to a running mock host. The listener thread lives until the test
/// process exits.
pub struct MockHost {
    pub addr: SocketAddr,
    state: Arc<HostState>,
}

impl MockHost {
    pub fn builder() -> MockHostBuilder {
        MockHostBuilder {
            script: VecDeque::new(),
            fallback: Session::ServeForever,
            handler: echo_handler(),
            chunk_size: None,
        }
    }

    /// Host that answers everything with the echo handler.
    pub fn start() -> Self {
        Self::builder().start()
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// JSON requests received so far (pings are not recorded).
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Block until `accepted() == n`, panicking after a few seconds.
    pub fn wait_for_accepted(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.accepted() < n {
            assert!(
                Instant::now() < deadline,
                "expected {} connections, saw {}",
                n,
                self.accepted()
            );
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Client config pointing at this host with fast retries.
    pub fn config(&self) -> BridgeConfig {
        BridgeConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            timeout_secs: 2.0,
            retry_delay_ms: 10,
            ..BridgeConfig::default()
        }
    }
}

enum Request {
    Ping,
    Command(Value),
}

/// Read until the bytes are the raw probe or one JSON document.
fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer == b"ping" {
            return Some(Request::Ping);
        }
        if let Ok(value) = serde_json::from_slice::<Value>(&buffer) {
            return Some(Request::Command(value));
        }
    }
}

fn write_response(stream: &mut TcpStream, body: &[u8], chunk_size: Option<usize>) -> bool {
    match chunk_size {
        None => stream.write_all(body).is_ok(),
        Some(size) => {
            for piece in body.chunks(size.max(1)) {
                if stream.write_all(piece).and_then(|_| stream.flush()).is_err() {
                    return false;
                }
                thread::sleep(Duration::from_millis(2));
            }
            true
        }
    }
}

fn serve(
    mut stream: TcpStream,
    session: Session,
    state: &HostState,
    handler: &Handler,
    chunk_size: Option<usize>,
) {
    let (budget, ping_reply) = match session {
        Session::Hangup => return,
        Session::Silent => {
            let _ = read_request(&mut stream);
            return;
        }
        Session::Stall => {
            let _ = read_request(&mut stream);
            thread::sleep(Duration::from_secs(5));
            return;
        }
        Session::Serve(n) => (n, PONG),
        Session::ServeForever => (usize::MAX, PONG),
        Session::RejectPing => (usize::MAX, BUSY),
    };

    for _ in 0..budget {
        let body = match read_request(&mut stream) {
            None => return,
            Some(Request::Ping) => ping_reply.to_vec(),
            Some(Request::Command(request)) => {
                state.requests.lock().unwrap().push(request.clone());
                let kind = request["type"].as_str().unwrap_or_default().to_string();
                let response = handler(&kind, &request["params"]);
                serde_json::to_vec(&response).unwrap()
            }
        };
        if !write_response(&mut stream, &body, chunk_size) {
            return;
        }
    }
}

/// Sleeper that records requested delays instead of sleeping.
pub fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&sleeps);
    let sleeper: Sleeper = Arc::new(move |delay| recorded.lock().unwrap().push(delay));
    (sleeper, sleeps)
}
