use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use wsmux_core::error::{Result, WsMuxError};
use wsmux_core::protocol::frame::{DecodeOutcome, DecoderLimits, DecoderState};
use wsmux_core::protocol::handshake::{
    detect_prologue, header_len, Negotiator, Prologue, DEFAULT_MAX_HANDSHAKE_BYTES,
    REJECTION_FRAME,
};
use wsmux_core::protocol::response::build_response;
use wsmux_core::scope::{ConnectionId, ScopeGate};

use super::connection::{Classification, Connection, ConnectionSnapshot, LifecycleState, ProtocolState};
use crate::config::GatewaySection;
use crate::obs::GatewayMetrics;

/// What the transport should do with one chunk's result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Hand these bytes to the upstream consumer.
    Forward(Bytes),
    /// Write `response` back to the client, then carry out `then`: the result
    /// of decoding frames that arrived in the same read as the request.
    HandshakeComplete {
        response: Bytes,
        then: Option<Box<Action>>,
    },
    /// Nothing to deliver yet; keep reading.
    AwaitMore,
    /// Write `farewell` (if any), then close the socket.
    CloseConnection { farewell: Option<Bytes> },
}

#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub max_handshake_bytes: usize,
    pub limits: DecoderLimits,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_handshake_bytes: DEFAULT_MAX_HANDSHAKE_BYTES,
            limits: DecoderLimits::default(),
        }
    }
}

impl From<&GatewaySection> for RouterConfig {
    fn from(gw: &GatewaySection) -> Self {
        Self {
            max_handshake_bytes: gw.max_handshake_bytes,
            limits: gw.decoder_limits(),
        }
    }
}

/// Protocol router: connection table + per-connection dispatch.
///
/// Concurrency note: each entry is only touched by the task serving that
/// socket, so the `DashMap` shard locks are never contended for long. The
/// entry guard is released before `on_bytes` returns; callers never hold it
/// across an await.
pub struct ProtocolRouter {
    negotiator: Negotiator,
    gate: Arc<dyn ScopeGate>,
    cfg: RouterConfig,
    metrics: Arc<GatewayMetrics>,
    conns: DashMap<ConnectionId, Connection>,
}

impl ProtocolRouter {
    pub fn new(gate: Arc<dyn ScopeGate>, cfg: RouterConfig, metrics: Arc<GatewayMetrics>) -> Self {
        Self {
            negotiator: Negotiator::new(Arc::clone(&gate)),
            gate,
            cfg,
            metrics,
            conns: DashMap::new(),
        }
    }

    /// Process one chunk read from `conn_id`. Creates the entry on first use.
    pub fn on_bytes(&self, conn_id: ConnectionId, chunk: &[u8]) -> Action {
        let mut entry = self.conns.entry(conn_id).or_insert_with(|| {
            tracing::debug!(conn_id, "new connection");
            Connection::new(conn_id)
        });
        let conn = entry.value_mut();

        match conn.lifecycle {
            LifecycleState::Closed => return Action::CloseConnection { farewell: None },
            LifecycleState::New => conn.lifecycle = LifecycleState::Handshaking,
            LifecycleState::Handshaking | LifecycleState::Open => {}
        }

        match &mut conn.protocol {
            ProtocolState::Unclassified(buf) => {
                buf.extend_from_slice(chunk);
                match detect_prologue(buf, self.cfg.max_handshake_bytes) {
                    Prologue::NeedMoreData => Action::AwaitMore,
                    Prologue::Native => {
                        let raw = buf.split().freeze();
                        self.classify_native(conn, raw)
                    }
                    Prologue::Request => {
                        let raw = buf.split().freeze();
                        self.on_request(conn, raw)
                    }
                }
            }
            ProtocolState::Native => {
                self.metrics
                    .forwarded_bytes
                    .add(&[("kind", "native")], chunk.len() as u64);
                Action::Forward(Bytes::copy_from_slice(chunk))
            }
            ProtocolState::WebSocket(decoder) => {
                let decoded = decoder.feed(chunk, &self.cfg.limits);
                self.on_decoded(conn, decoded)
            }
        }
    }

    fn on_request(&self, conn: &mut Connection, raw: Bytes) -> Action {
        let end = header_len(&raw).unwrap_or(raw.len());

        match self.negotiator.negotiate(&raw[..end]) {
            Ok(req) => {
                let response = build_response(&req.meta.origin, &req.meta.host, &req.key);
                let mut decoder = DecoderState::new();
                let pipelined = &raw[end..];
                let decoded = (!pipelined.is_empty()).then(|| decoder.feed(pipelined, &self.cfg.limits));

                conn.protocol = ProtocolState::WebSocket(decoder);
                conn.lifecycle = LifecycleState::Open;
                conn.meta = req.meta;
                self.gate.register(conn.id, &conn.meta);
                self.metrics.classifications.inc(&[("kind", "websocket")]);
                tracing::debug!(conn_id = conn.id, path = %conn.meta.path, pipelined = pipelined.len(), "handshake complete");

                let then = decoded
                    .map(|d| self.on_decoded(conn, d))
                    .filter(|a| *a != Action::AwaitMore)
                    .map(Box::new);
                Action::HandshakeComplete { response, then }
            }
            Err(WsMuxError::ScopeRejected(path)) => {
                conn.lifecycle = LifecycleState::Closed;
                conn.meta.path = path;
                self.metrics.handshake_rejections.inc(&[("reason", "scope")]);
                Action::CloseConnection {
                    farewell: Some(Bytes::from_static(&REJECTION_FRAME)),
                }
            }
            Err(e) => {
                tracing::debug!(conn_id = conn.id, error = %e, "handshake failed, continuing as native");
                self.classify_native(conn, raw)
            }
        }
    }

    fn classify_native(&self, conn: &mut Connection, raw: Bytes) -> Action {
        conn.protocol = ProtocolState::Native;
        conn.lifecycle = LifecycleState::Open;
        self.metrics.classifications.inc(&[("kind", "native")]);
        self.metrics
            .forwarded_bytes
            .add(&[("kind", "native")], raw.len() as u64);
        tracing::debug!(conn_id = conn.id, len = raw.len(), "native connection");
        Action::Forward(raw)
    }

    fn on_decoded(&self, conn: &mut Connection, decoded: Result<DecodeOutcome>) -> Action {
        match decoded {
            // empty deliveries (zero-length frames, dropped control frames) are suppressed
            Ok(DecodeOutcome::Complete { payload, .. }) if payload.is_empty() => Action::AwaitMore,
            Ok(DecodeOutcome::Complete { payload, .. }) => {
                self.metrics
                    .forwarded_bytes
                    .add(&[("kind", "websocket")], payload.len() as u64);
                Action::Forward(payload)
            }
            Ok(DecodeOutcome::NeedMoreData) => Action::AwaitMore,
            Ok(DecodeOutcome::ConnectionShouldClose) => {
                conn.lifecycle = LifecycleState::Closed;
                self.metrics.close_frames.inc(&[]);
                Action::CloseConnection { farewell: None }
            }
            Err(e) => {
                tracing::warn!(conn_id = conn.id, error = %e, "closing websocket connection");
                conn.lifecycle = LifecycleState::Closed;
                self.metrics.decode_errors.inc(&[("code", e.code().as_str())]);
                Action::CloseConnection { farewell: None }
            }
        }
    }

    /// Drop the entry for a closed socket and unregister it from the gate.
    pub fn close(&self, conn_id: ConnectionId) -> Option<ConnectionSnapshot> {
        let (_, mut conn) = self.conns.remove(&conn_id)?;
        if conn.classification() == Classification::WebSocket {
            self.gate.unregister(conn_id);
        }
        conn.lifecycle = LifecycleState::Closed;
        tracing::debug!(conn_id, "connection closed");
        Some(conn.snapshot())
    }

    pub fn classification(&self, conn_id: ConnectionId) -> Option<Classification> {
        self.conns.get(&conn_id).map(|c| c.classification())
    }

    pub fn snapshot(&self, conn_id: ConnectionId) -> Option<ConnectionSnapshot> {
        self.conns.get(&conn_id).map(|c| c.snapshot())
    }

    /// Connections currently tracked.
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}
