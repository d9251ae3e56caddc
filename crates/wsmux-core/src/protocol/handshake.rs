//! Handshake negotiator: is this connection a WebSocket upgrade?
//!
//! The first bytes of every connection go through here. A GET request for an
//! enabled scope carrying a `Sec-WebSocket-Key` is an upgrade; anything else
//! the listener treats as the native protocol. A GET for `/` or for a
//! disabled application is neither: the caller answers it with
//! [`REJECTION_FRAME`] and drops the socket.
//!
//! Header names are matched by case-insensitive substring against the text
//! before the first `:`. Values are everything after that `:`, trimmed.

use std::sync::Arc;

use crate::error::{Result, WsMuxError};
use crate::scope::{ConnectionMeta, ScopeGate};

pub const WS_HEADER_KEY: &str = "Sec-WebSocket-Key";
pub const WS_HEADER_VERSION: &str = "Sec-WebSocket-Version";
pub const WS_HEADER_EXTENSIONS: &str = "Sec-WebSocket-Extensions";
pub const HTTP_HEADER_HOST: &str = "Host";
pub const HTTP_HEADER_ORIGIN: &str = "Origin";
pub const HTTP_HEADER_USERAGENT: &str = "User-Agent";

/// Match order matters: the first name contained in a header name wins.
const KNOWN_HEADERS: [&str; 6] = [
    WS_HEADER_KEY,
    WS_HEADER_VERSION,
    WS_HEADER_EXTENSIONS,
    HTTP_HEADER_HOST,
    HTTP_HEADER_ORIGIN,
    HTTP_HEADER_USERAGENT,
];

/// Sent to a client whose requested scope is unavailable, before closing.
pub const REJECTION_FRAME: [u8; 2] = [0xFF, 0x00];

/// Default cap on bytes buffered while waiting for the end of the headers.
pub const DEFAULT_MAX_HANDSHAKE_BYTES: usize = 8192;

const REQUEST_PREFIX: &[u8] = b"GET ";
const END_OF_HEADERS: &[u8] = b"\r\n\r\n";

/// Parsed upgrade request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Path/host/origin plus the matched header subset.
    pub meta: ConnectionMeta,
    /// Non-empty `Sec-WebSocket-Key`.
    pub key: String,
}

impl HandshakeRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.meta.headers.get(name).map(String::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.header(WS_HEADER_VERSION)
    }
}

/// What the buffered prefix of a new connection looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prologue {
    /// Still a possible HTTP request; headers not finished yet.
    NeedMoreData,
    /// A GET request with complete headers; run [`Negotiator::negotiate`].
    Request,
    /// Cannot be (or has stopped looking like) an upgrade request.
    Native,
}

/// Decide whether to wait, parse, or hand the connection to the native path.
///
/// A native client is recognised as soon as its bytes diverge from `GET `, so
/// it never waits on a blank line that will not come. A GET whose headers
/// grow beyond `max_bytes` is also treated as native.
pub fn detect_prologue(buf: &[u8], max_bytes: usize) -> Prologue {
    if buf.is_empty() {
        return Prologue::NeedMoreData;
    }
    if !buf.iter().zip(REQUEST_PREFIX).all(|(a, b)| a == b) {
        return Prologue::Native;
    }
    if buf.len() < REQUEST_PREFIX.len() {
        return Prologue::NeedMoreData;
    }
    if header_len(buf).is_some() {
        return Prologue::Request;
    }
    if buf.len() > max_bytes {
        tracing::debug!(len = buf.len(), max = max_bytes, "request headers never ended");
        return Prologue::Native;
    }
    Prologue::NeedMoreData
}

/// Length of the request up to and including the blank line, if present.
pub fn header_len(buf: &[u8]) -> Option<usize> {
    buf.windows(END_OF_HEADERS.len())
        .position(|w| w == END_OF_HEADERS)
        .map(|at| at + END_OF_HEADERS.len())
}

/// Parses upgrade requests against the scope gate it was built with.
#[derive(Clone)]
pub struct Negotiator {
    gate: Arc<dyn ScopeGate>,
}

impl Negotiator {
    pub fn new(gate: Arc<dyn ScopeGate>) -> Self {
        Self { gate }
    }

    /// Parse `raw` as a WebSocket upgrade request.
    ///
    /// Errors:
    /// - `NotAHandshake`: not a GET, malformed request line, or no key.
    /// - `ScopeRejected`: path is `/` or its application is disabled.
    pub fn negotiate(&self, raw: &[u8]) -> Result<HandshakeRequest> {
        let text = String::from_utf8_lossy(raw);
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        if !request_line.starts_with("GET ") {
            return Err(WsMuxError::NotAHandshake("request line is not a GET".into()));
        }
        let path = request_path(request_line)?;

        // only the application is checked, not the room or sub levels
        if path.len() <= 1 || !self.gate.is_enabled(path) {
            tracing::warn!(%path, "invalid scope or application not enabled");
            return Err(WsMuxError::ScopeRejected(path.to_string()));
        }

        let mut meta = ConnectionMeta {
            path: path.to_string(),
            ..ConnectionMeta::default()
        };

        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let Some(known) = match_header(name) else {
                continue;
            };
            let value = value.trim().to_string();
            match known {
                HTTP_HEADER_HOST => meta.host = value.clone(),
                HTTP_HEADER_ORIGIN => meta.origin = value.clone(),
                _ => {}
            }
            meta.headers.insert(known.to_string(), value);
        }
        tracing::trace!(headers = ?meta.headers, "handshake headers");

        let key = match meta.headers.get(WS_HEADER_KEY) {
            Some(k) if !k.is_empty() => k.clone(),
            _ => {
                return Err(WsMuxError::NotAHandshake(
                    "missing Sec-WebSocket-Key".into(),
                ))
            }
        };

        if meta.headers.get(WS_HEADER_VERSION).map(String::as_str) != Some("13") {
            tracing::info!(%path, "version 13 was not found in the request, handshaking may fail");
        }

        Ok(HandshakeRequest { meta, key })
    }
}

/// Substring between the first `/` and the following space.
fn request_path(line: &str) -> Result<&str> {
    let start = line
        .find('/')
        .ok_or_else(|| WsMuxError::NotAHandshake("request line has no path".into()))?;
    let rest = &line[start..];
    let end = rest
        .find(' ')
        .ok_or_else(|| WsMuxError::NotAHandshake("request line has no protocol".into()))?;
    Ok(&rest[..end])
}

fn match_header(name: &str) -> Option<&'static str> {
    let lowered = name.to_ascii_lowercase();
    KNOWN_HEADERS
        .into_iter()
        .find(|known| lowered.contains(&known.to_ascii_lowercase()))
}
