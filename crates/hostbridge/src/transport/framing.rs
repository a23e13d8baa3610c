//! Receive loop for length-less JSON responses.
//!
//! The host writes one JSON document per request with no length prefix, so a
//! response is complete as soon as the accumulated bytes parse. The loop
//! returns on the first successful parse; bytes the host may still be writing
//! after that belong to nothing (requests and responses strictly alternate).

use crate::error::TransportError;
use std::io::{ErrorKind, Read};

/// Liveness probe request, sent as raw bytes rather than JSON.
pub const PING_REQUEST: &[u8] = b"ping";

/// Every successful probe response starts with this.
pub const PONG_PREAMBLE: &[u8] = br#"{"status":"success","result":{"message":"pong""#;

/// Whether `buffer` already holds one complete JSON document.
pub fn is_complete(buffer: &[u8]) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(buffer).is_ok()
}

/// Read from `reader` in `chunk_size` pieces until the buffer parses as JSON.
///
/// A buffer starting with the pong preamble is returned without parsing.
/// Timeouts, early EOF and truncated documents are all transport errors.
pub fn read_response<R: Read>(
    reader: &mut R,
    chunk_size: usize,
) -> Result<Vec<u8>, TransportError> {
    let mut buffer = Vec::with_capacity(chunk_size);
    let mut chunk = vec![0u8; chunk_size.max(1)];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Err(TransportError::Timeout {
                    received: buffer.len(),
                });
            }
            Err(e) => return Err(TransportError::Io(e)),
        };

        if n == 0 {
            if buffer.is_empty() {
                return Err(TransportError::Closed);
            }
            if is_complete(&buffer) {
                return Ok(buffer);
            }
            return Err(TransportError::Incomplete {
                received: buffer.len(),
            });
        }

        buffer.extend_from_slice(&chunk[..n]);

        if buffer.starts_with(PONG_PREAMBLE) {
            return Ok(buffer);
        }
        if is_complete(&buffer) {
            log::trace!("Received complete response ({} bytes)", buffer.len());
            return Ok(buffer);
        }
    }
}
