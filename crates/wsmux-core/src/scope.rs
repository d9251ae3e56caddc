//! Scope gate: the collaborator that knows which application paths are live.
//!
//! The negotiator asks it whether a requested path may be upgraded; the
//! router registers upgraded connections with it. Implementations are shared
//! across every connection, so they must be `Send + Sync` and cheap to read.

use std::collections::HashMap;

/// Per-socket identifier assigned by the transport.
pub type ConnectionId = u64;

/// Metadata captured from a successful handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionMeta {
    /// Request path, leading `/` included (e.g. `/live/room1`).
    pub path: String,
    /// `Host` header value.
    pub host: String,
    /// `Origin` header value.
    pub origin: String,
    /// Matched handshake headers (trimmed values).
    pub headers: HashMap<String, String>,
}

/// Registry collaborator consulted during the handshake.
pub trait ScopeGate: Send + Sync {
    /// Whether the application owning `path` is enabled.
    fn is_enabled(&self, path: &str) -> bool;

    /// Record an upgraded connection.
    fn register(&self, conn_id: ConnectionId, meta: &ConnectionMeta);

    /// Forget a connection (socket closed).
    fn unregister(&self, conn_id: ConnectionId);
}

/// Application name of a scope path: its first non-empty segment.
///
/// `/live/room1` => `live`. Returns `None` for `/` or an empty path.
pub fn application_of(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}
