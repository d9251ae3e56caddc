//! Connection classifier / protocol router.
//!
//! Owns one entry per live socket, keyed by connection id. The first bytes of
//! a socket decide its protocol once and for all; after that every chunk is
//! either copied through (native) or run through the frame decoder
//! (WebSocket).

mod connection;
mod router;

pub use connection::{Classification, ConnectionSnapshot, LifecycleState};
pub use router::{Action, ProtocolRouter, RouterConfig};
