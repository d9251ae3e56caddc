use std::collections::HashMap;

use bytes::BytesMut;
use wsmux_core::protocol::frame::DecoderState;
use wsmux_core::scope::{ConnectionId, ConnectionMeta};

/// Which protocol a socket speaks. Leaves `Unclassified` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Unclassified,
    Native,
    WebSocket,
}

impl Classification {
    /// Label used in metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Unclassified => "unclassified",
            Classification::Native => "native",
            Classification::WebSocket => "websocket",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Handshaking,
    Open,
    Closed,
}

/// Per-protocol state. The classification is derived from the variant so the
/// decoder can only exist on a WebSocket connection.
#[derive(Debug)]
pub(crate) enum ProtocolState {
    /// Bytes received before the protocol was decided.
    Unclassified(BytesMut),
    Native,
    WebSocket(DecoderState),
}

#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) id: ConnectionId,
    pub(crate) lifecycle: LifecycleState,
    pub(crate) protocol: ProtocolState,
    pub(crate) meta: ConnectionMeta,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId) -> Self {
        Self {
            id,
            lifecycle: LifecycleState::New,
            protocol: ProtocolState::Unclassified(BytesMut::new()),
            meta: ConnectionMeta::default(),
        }
    }

    pub(crate) fn classification(&self) -> Classification {
        match self.protocol {
            ProtocolState::Unclassified(_) => Classification::Unclassified,
            ProtocolState::Native => Classification::Native,
            ProtocolState::WebSocket(_) => Classification::WebSocket,
        }
    }

    pub(crate) fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: self.id,
            classification: self.classification(),
            lifecycle: self.lifecycle,
            path: self.meta.path.clone(),
            host: self.meta.host.clone(),
            origin: self.meta.origin.clone(),
            headers: self.meta.headers.clone(),
        }
    }
}

/// Read-only copy of a connection's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub classification: Classification,
    pub lifecycle: LifecycleState,
    /// Empty until a handshake was parsed.
    pub path: String,
    pub host: String,
    pub origin: String,
    pub headers: HashMap<String, String>,
}
