//! wsmux core: transport-agnostic protocol primitives for a listener shared
//! between a native binary protocol and WebSocket (RFC 6455).
//!
//! This crate holds the pieces that decide what a connection speaks and turn
//! WebSocket frames back into the byte stream the client meant to send:
//! the handshake negotiator, the accept-key response builder, and the
//! incremental frame decoder. It carries no runtime or socket dependencies;
//! every operation is a synchronous function over an in-memory buffer.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Hostile length
//! fields and truncated input surface as `WsMuxError` values or as a
//! "need more data" outcome, never as a crash or an out-of-bounds read.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;
pub mod scope;

/// Shared result type.
pub use error::{ErrorCode, Result, WsMuxError};
