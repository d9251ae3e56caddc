//! Handshake response builder (RFC 6455 section 4.2.2).
//!
//! `accept = base64(SHA-1(client_key ++ GUID))`. The response is the 101
//! status line, five header lines, a blank line, and then the accept text
//! once more as raw bytes. Peers read the trailing copy; keep it.

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::error::{Result, WsMuxError};

/// Fixed GUID appended to the client key before hashing.
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

const CRLF: &[u8] = b"\r\n";

/// Compute the `Sec-WebSocket-Accept` value for a client key.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Serialize the full handshake response for one connection.
pub fn build_response(origin: &str, host: &str, client_key: &str) -> Bytes {
    let accept = accept_key(client_key);

    let mut buf = BytesMut::with_capacity(256);
    buf.put_slice(b"HTTP/1.1 101 Switching Protocols");
    buf.put_slice(CRLF);
    buf.put_slice(b"Upgrade: websocket");
    buf.put_slice(CRLF);
    buf.put_slice(b"Connection: Upgrade");
    buf.put_slice(CRLF);
    buf.put_slice(b"Sec-WebSocket-Origin: ");
    buf.put_slice(origin.as_bytes());
    buf.put_slice(CRLF);
    buf.put_slice(b"Sec-WebSocket-Location: ");
    buf.put_slice(host.as_bytes());
    buf.put_slice(CRLF);
    buf.put_slice(b"Sec-WebSocket-Accept: ");
    buf.put_slice(accept.as_bytes());
    buf.put_slice(CRLF);
    buf.put_slice(CRLF);
    buf.put_slice(accept.as_bytes());
    buf.freeze()
}

/// Startup self-check of the hash primitive against the RFC 6455 example.
///
/// A failure here is process-fatal; there is no per-connection fallback.
pub fn verify_accept_algorithm() -> Result<()> {
    if accept_key("dGhlIHNhbXBsZSBub25jZQ==") == "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=" {
        Ok(())
    } else {
        Err(WsMuxError::MissingAlgorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc_worked_example() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
        assert!(verify_accept_algorithm().is_ok());
    }
}
