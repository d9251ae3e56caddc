//! Protocol modules (handshake + frame layer).
//!
//! - `handshake`: classify the first bytes of a connection as a WebSocket
//!   upgrade request (or not) and extract the fields the router keeps.
//! - `response`: RFC 6455 accept-key computation and the 101 response bytes.
//! - `frame`: incremental RFC 6455 frame decoder with rewind-on-short-read.
//! - `mask`: payload XOR masking.
//!
//! All parsers are panic-free: truncated or hostile input is reported as an
//! outcome or a `WsMuxError`, never by indexing past the buffer.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod response;
