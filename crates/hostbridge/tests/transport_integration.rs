//! Integration tests for `Connection` against a scripted loopback host.
//!
//! Covers the retry/backoff/reconnect contract, response reassembly, the
//! liveness probe and how host-side failures are classified.

mod common;

use common::{recording_sleeper, MockHost, Session};
use hostbridge::transport::Transport;
use hostbridge::{BridgeError, Connection, ErrorKind, TransportError};
use serde_json::{json, Map, Value};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

fn params(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[test]
fn test_send_round_trip() {
    let host = MockHost::start();
    let mut conn = Connection::new(host.config());
    assert!(!conn.is_connected());

    let result = conn
        .send("manage_scene", params(json!({"action": "get_hierarchy"})))
        .unwrap();
    assert_eq!(result["kind"], "manage_scene");
    assert_eq!(result["params"]["action"], "get_hierarchy");
    assert!(conn.is_connected());
    assert_eq!(conn.retry_count(), 0);

    let requests = host.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["type"], "manage_scene");
}

#[test]
fn test_connection_is_reused() {
    let host = MockHost::start();
    let mut conn = Connection::new(host.config());
    for i in 0..5 {
        conn.send("find", params(json!({"i": i}))).unwrap();
    }
    assert_eq!(host.accepted(), 1);
    assert_eq!(host.requests().len(), 5);
}

#[test]
fn test_transient_failures_retry_with_doubling_backoff() {
    for k in 1..=3u32 {
        let host = MockHost::builder()
            .script(std::iter::repeat(Session::Hangup).take(k as usize))
            .start();
        let mut config = host.config();
        config.max_retries = 3;
        let (sleeper, sleeps) = recording_sleeper();
        let mut conn = Connection::new(config).with_sleeper(sleeper);

        let result = conn.send("manage_scene", params(json!({"action": "save"})));
        assert!(result.is_ok(), "k={k}: {result:?}");
        assert_eq!(conn.retry_count(), k);
        assert_eq!(host.accepted(), k as usize + 1);

        let sleeps = sleeps.lock().unwrap().clone();
        let expected: Vec<Duration> = (0..k)
            .map(|r| Duration::from_millis(10 * 2u64.pow(r)))
            .collect();
        assert_eq!(sleeps, expected);
        let total: Duration = sleeps.iter().sum();
        assert_eq!(total, Duration::from_millis(10 * (2u64.pow(k) - 1)));
    }
}

#[test]
fn test_exhausted_retries_surface_connection_error() {
    let host = MockHost::builder().fallback(Session::Hangup).start();
    let mut config = host.config();
    config.max_retries = 2;
    let (sleeper, sleeps) = recording_sleeper();
    let mut conn = Connection::new(config).with_sleeper(sleeper);

    let err = conn
        .send("manage_scene", params(json!({"action": "save"})))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.is_retryable());
    assert!(matches!(err, BridgeError::Connection { attempts: 3, .. }));
    assert!(!conn.is_connected());
    assert_eq!(sleeps.lock().unwrap().len(), 2);

    host.wait_for_accepted(3);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(host.accepted(), 3);
}

#[test]
fn test_unreachable_host() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = hostbridge::BridgeConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_retries: 1,
        retry_delay_ms: 1,
        ..Default::default()
    };
    let (sleeper, sleeps) = recording_sleeper();
    let mut conn = Connection::new(config).with_sleeper(sleeper);

    match conn.send("ping", Map::new()) {
        Err(BridgeError::Connection { attempts, cause }) => {
            assert_eq!(attempts, 2);
            assert!(matches!(cause, TransportError::Connect { .. }), "{cause:?}");
        }
        other => panic!("expected connection error, got {other:?}"),
    }
    assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_millis(1)]);
}

#[test]
fn test_remote_error_is_not_retried() {
    let host = MockHost::builder()
        .handler(Arc::new(|kind: &str, _params: &Value| {
            if kind == "explode" {
                json!({"status": "error", "error": "Object 'Ghost' not found"})
            } else {
                json!({"status": "success", "result": {"ok": true}})
            }
        }))
        .start();
    let (sleeper, sleeps) = recording_sleeper();
    let mut conn = Connection::new(host.config()).with_sleeper(sleeper);

    let err = conn.send("explode", Map::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Command);
    assert!(!err.is_retryable());
    assert_eq!(err.to_string(), "Command error: Object 'Ghost' not found");
    assert_eq!(conn.retry_count(), 0);
    assert!(sleeps.lock().unwrap().is_empty());

    // The socket survives a rejected command.
    assert_eq!(conn.send("fine", Map::new()).unwrap(), json!({"ok": true}));
    assert_eq!(host.accepted(), 1);
}

#[test]
fn test_error_message_fallback() {
    let host = MockHost::builder()
        .handler(Arc::new(|_: &str, _: &Value| {
            json!({"status": "error", "message": "Compilation failed"})
        }))
        .start();
    let mut conn = Connection::new(host.config());
    match conn.send("refresh", Map::new()) {
        Err(BridgeError::Command(message)) => assert_eq!(message, "Compilation failed"),
        other => panic!("expected command error, got {other:?}"),
    }
}

#[test]
fn test_chunked_response_reassembles() {
    let host = MockHost::builder().chunked(7).start();
    let mut config = host.config();
    config.buffer_size = 5;
    let mut conn = Connection::new(config);

    let names: Vec<String> = (0..50).map(|i| format!("Object_{i}")).collect();
    let result = conn
        .send("bulk", params(json!({"names": &names, "label": "Würfel ✓"})))
        .unwrap();
    assert_eq!(result["params"]["names"], json!(names));
    assert_eq!(result["params"]["label"], "Würfel ✓");
}

#[test]
fn test_read_timeout_is_a_connection_failure() {
    let host = MockHost::builder().fallback(Session::Stall).start();
    let mut config = host.config();
    config.timeout_secs = 0.2;
    config.max_retries = 0;
    let mut conn = Connection::new(config);

    match conn.send("slow", Map::new()) {
        Err(BridgeError::Connection { attempts, cause }) => {
            assert_eq!(attempts, 1);
            assert!(matches!(cause, TransportError::Timeout { received: 0 }), "{cause:?}");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[test]
fn test_host_closing_mid_request_is_retried() {
    let host = MockHost::builder().script([Session::Silent]).start();
    let (sleeper, _) = recording_sleeper();
    let mut conn = Connection::new(host.config()).with_sleeper(sleeper);

    conn.send("manage_scene", params(json!({"action": "save"})))
        .unwrap();
    assert_eq!(conn.retry_count(), 1);
    assert_eq!(host.accepted(), 2);
}

#[test]
fn test_malformed_response_is_retried() {
    let host = MockHost::builder()
        .handler(Arc::new(|_: &str, _: &Value| json!([1, 2, 3])))
        .start();
    let mut config = host.config();
    config.max_retries = 1;
    let (sleeper, _) = recording_sleeper();
    let mut conn = Connection::new(config).with_sleeper(sleeper);

    match conn.send("anything", Map::new()) {
        Err(BridgeError::Connection { attempts: 2, cause }) => {
            assert!(matches!(cause, TransportError::Malformed(_)), "{cause:?}");
        }
        other => panic!("expected malformed response failure, got {other:?}"),
    }
}

#[test]
fn test_ping() {
    let host = MockHost::start();
    let mut conn = Connection::new(host.config());
    conn.ping().unwrap();
    assert_eq!(
        conn.send("ping", Map::new()).unwrap(),
        json!({"message": "pong"})
    );
    assert!(host.requests().is_empty());
}

#[test]
fn test_ensure_live_connects_lazily() {
    let host = MockHost::start();
    let mut conn = Connection::new(host.config());
    conn.ensure_live().unwrap();
    assert!(conn.is_connected());
    host.wait_for_accepted(1);

    // Healthy socket: probe only, no new connection.
    conn.ensure_live().unwrap();
    assert_eq!(host.accepted(), 1);
}

#[test]
fn test_ensure_live_replaces_stale_socket() {
    let host = MockHost::builder().script([Session::Serve(1)]).start();
    let mut conn = Connection::new(host.config());

    conn.send("manage_scene", params(json!({"action": "save"})))
        .unwrap();
    assert_eq!(host.accepted(), 1);

    conn.ensure_live().unwrap();
    host.wait_for_accepted(2);
    assert!(conn.is_connected());
    conn.ping().unwrap();
    assert_eq!(host.accepted(), 2);
}

#[test]
fn test_ensure_live_probes_new_sockets() {
    let host = MockHost::builder().fallback(Session::Hangup).start();
    let mut config = host.config();
    config.max_retries = 1;
    let (sleeper, sleeps) = recording_sleeper();
    let mut conn = Connection::new(config).with_sleeper(sleeper);

    // The host accepts every connection but never answers the probe.
    let err = conn.ensure_live().unwrap_err();
    assert!(matches!(err, BridgeError::Connection { attempts: 2, .. }), "{err:?}");
    assert!(!conn.is_connected());
    assert_eq!(sleeps.lock().unwrap().len(), 1);
}

#[test]
fn test_ensure_live_opens_one_socket_per_retry() {
    let host = MockHost::builder().script([Session::Hangup]).start();
    let (sleeper, sleeps) = recording_sleeper();
    let mut conn = Connection::new(host.config()).with_sleeper(sleeper);

    conn.ensure_live().unwrap();
    assert_eq!(conn.retry_count(), 1);
    assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_millis(10)]);

    host.wait_for_accepted(2);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(host.accepted(), 2);
}

#[test]
fn test_rejected_probe_is_a_connection_failure() {
    let host = MockHost::builder().fallback(Session::RejectPing).start();
    let mut config = host.config();
    config.max_retries = 1;
    let (sleeper, _) = recording_sleeper();
    let mut conn = Connection::new(config.clone()).with_sleeper(sleeper);

    match conn.send("ping", Map::new()) {
        Err(BridgeError::Connection { attempts: 2, cause }) => {
            assert!(matches!(cause, TransportError::Probe(_)), "{cause:?}");
        }
        other => panic!("expected probe failure, got {other:?}"),
    }
    assert_eq!(host.accepted(), 2);

    let (sleeper, _) = recording_sleeper();
    let mut conn = Connection::new(config).with_sleeper(sleeper);
    match conn.ensure_live() {
        Err(BridgeError::Connection { attempts: 2, cause }) => {
            assert!(matches!(cause, TransportError::Probe(_)), "{cause:?}");
        }
        other => panic!("expected probe failure, got {other:?}"),
    }
}

#[test]
fn test_ensure_live_discards_socket_with_rejected_probe() {
    let host = MockHost::builder().script([Session::RejectPing]).start();
    let mut conn = Connection::new(host.config());

    conn.send("manage_scene", params(json!({"action": "save"})))
        .unwrap();
    assert_eq!(host.accepted(), 1);

    conn.ensure_live().unwrap();
    assert_eq!(conn.retry_count(), 0);
    assert_eq!(host.accepted(), 2);
    conn.ping().unwrap();
    assert_eq!(host.requests().len(), 1);
}

#[test]
fn test_disconnect_then_send_reconnects() {
    let host = MockHost::start();
    let mut conn = Connection::new(host.config());
    conn.send("a", Map::new()).unwrap();
    conn.disconnect();
    assert!(!conn.is_connected());

    conn.send("b", Map::new()).unwrap();
    host.wait_for_accepted(2);
    assert_eq!(conn.retry_count(), 0);
}
