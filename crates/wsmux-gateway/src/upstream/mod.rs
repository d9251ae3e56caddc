//! Upstream hand-off: where decoded bytes go once the router is done.
//!
//! The listener is oblivious to what the bytes mean; whatever sits above it
//! (an RTMP-style message layer, a test harness) implements [`Upstream`].

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use wsmux_core::error::{Result, WsMuxError};
use wsmux_core::scope::ConnectionId;

use crate::classifier::Classification;

/// Consumer of the decoded byte stream.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Bytes from `conn_id`, already unframed if the client spoke WebSocket.
    async fn deliver(&self, conn_id: ConnectionId, kind: Classification, payload: Bytes) -> Result<()>;

    /// The socket is gone; no further deliveries for `conn_id`.
    async fn closed(&self, _conn_id: ConnectionId) {}
}

/// Logs deliveries and drops them.
#[derive(Debug, Default)]
pub struct TraceUpstream;

#[async_trait]
impl Upstream for TraceUpstream {
    async fn deliver(&self, conn_id: ConnectionId, kind: Classification, payload: Bytes) -> Result<()> {
        tracing::info!(conn_id, kind = kind.as_str(), len = payload.len(), "payload delivered");
        Ok(())
    }

    async fn closed(&self, conn_id: ConnectionId) {
        tracing::info!(conn_id, "upstream notified of close");
    }
}

/// One item handed to a [`ChannelUpstream`] receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Payload {
        conn_id: ConnectionId,
        kind: Classification,
        payload: Bytes,
    },
    Closed(ConnectionId),
}

/// Forwards everything into a bounded channel (backpressure on the socket).
#[derive(Debug, Clone)]
pub struct ChannelUpstream {
    tx: mpsc::Sender<Delivery>,
}

impl ChannelUpstream {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Upstream for ChannelUpstream {
    async fn deliver(&self, conn_id: ConnectionId, kind: Classification, payload: Bytes) -> Result<()> {
        self.tx
            .send(Delivery::Payload { conn_id, kind, payload })
            .await
            .map_err(|_| WsMuxError::Internal("upstream channel closed".into()))
    }

    async fn closed(&self, conn_id: ConnectionId) {
        let _ = self.tx.send(Delivery::Closed(conn_id)).await;
    }
}
