//! Protocol router: classification, handshake, and WebSocket unframing.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use bytes::Bytes;
use wsmux_core::protocol::frame::{ControlPayloads, DecoderLimits};
use wsmux_core::protocol::mask::apply_mask;
use wsmux_core::scope::ScopeGate;
use wsmux_gateway::classifier::{Action, Classification, LifecycleState, ProtocolRouter, RouterConfig};
use wsmux_gateway::obs::GatewayMetrics;
use wsmux_gateway::scope::ScopeManager;

const UPGRADE: &str = "GET /live/room1 HTTP/1.1\r\n\
Host: media.example.com:5080\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Origin: http://localhost\r\n\
Sec-WebSocket-Version: 13\r\n\
\r\n";

struct Harness {
    router: ProtocolRouter,
    scopes: Arc<ScopeManager>,
    metrics: Arc<GatewayMetrics>,
}

fn harness_with(cfg: RouterConfig) -> Harness {
    let scopes = Arc::new(ScopeManager::new());
    scopes.set_enabled("live", true);
    scopes.set_enabled("vod", false);
    let metrics = Arc::new(GatewayMetrics::default());
    let router = ProtocolRouter::new(
        Arc::clone(&scopes) as Arc<dyn ScopeGate>,
        cfg,
        Arc::clone(&metrics),
    );
    Harness { router, scopes, metrics }
}

fn harness() -> Harness {
    harness_with(RouterConfig::default())
}

fn masked(opcode: u8, payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    assert!(payload.len() < 126);
    let mut out = vec![0x80 | opcode, 0x80 | payload.len() as u8];
    out.extend_from_slice(&key);
    let mut body = payload.to_vec();
    apply_mask(&mut body, key);
    out.extend_from_slice(&body);
    out
}

fn upgrade(h: &Harness, id: u64) {
    match h.router.on_bytes(id, UPGRADE.as_bytes()) {
        Action::HandshakeComplete { then: None, .. } => {}
        other => panic!("expected handshake, got {other:?}"),
    }
}

#[test]
fn native_bytes_pass_through_unmodified() {
    let h = harness();
    let first = [0x03u8, 0x00, 0x0f, 0xa0, 0x00, 0x00, 0x01];
    assert_eq!(
        h.router.on_bytes(1, &first),
        Action::Forward(Bytes::copy_from_slice(&first))
    );
    assert_eq!(h.router.classification(1), Some(Classification::Native));

    // later chunks are forwarded verbatim, even ones that look like HTTP
    let later = UPGRADE.as_bytes();
    assert_eq!(h.router.on_bytes(1, later), Action::Forward(Bytes::copy_from_slice(later)));
    assert_eq!(h.metrics.classifications.get(&[("kind", "native")]), 1);
}

#[test]
fn get_without_key_falls_back_to_native_with_all_bytes() {
    let h = harness();
    let raw = b"GET /live HTTP/1.1\r\nHost: a\r\n\r\ntrailing";
    assert_eq!(h.router.on_bytes(1, raw), Action::Forward(Bytes::copy_from_slice(raw)));
    assert_eq!(h.router.classification(1), Some(Classification::Native));
}

#[test]
fn handshake_response_and_connection_fields() {
    let h = harness();
    let Action::HandshakeComplete { response: resp, then } = h.router.on_bytes(5, UPGRADE.as_bytes()) else {
        panic!("expected handshake");
    };
    assert!(then.is_none());
    let text = std::str::from_utf8(&resp).unwrap();
    assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(text.contains("Sec-WebSocket-Origin: http://localhost\r\n"));
    assert!(text.contains("Sec-WebSocket-Location: media.example.com:5080\r\n"));
    assert!(text.ends_with("\r\n\r\ns3pPLMBiTxaQ9kYGzzhZRbK+xOo="));

    let snap = h.router.snapshot(5).unwrap();
    assert_eq!(snap.classification, Classification::WebSocket);
    assert_eq!(snap.lifecycle, LifecycleState::Open);
    assert_eq!(snap.path, "/live/room1");
    assert_eq!(snap.host, "media.example.com:5080");
    assert_eq!(snap.headers.get("Sec-WebSocket-Version").map(String::as_str), Some("13"));
    assert_eq!(h.scopes.connections_in("live"), vec![5]);
}

#[test]
fn handshake_split_across_reads_is_accumulated() {
    let h = harness();
    let raw = UPGRADE.as_bytes();
    assert_eq!(h.router.on_bytes(2, &raw[..3]), Action::AwaitMore);
    assert_eq!(h.router.snapshot(2).unwrap().lifecycle, LifecycleState::Handshaking);
    assert_eq!(h.router.on_bytes(2, &raw[3..40]), Action::AwaitMore);
    assert!(matches!(
        h.router.on_bytes(2, &raw[40..]),
        Action::HandshakeComplete { then: None, .. }
    ));
}

#[test]
fn scope_rejection_sends_two_bytes_and_closes() {
    let h = harness();
    for (id, path) in [(1u64, "/"), (2, "/vod/room"), (3, "/missing")] {
        let raw = format!("GET {path} HTTP/1.1\r\nSec-WebSocket-Key: k\r\n\r\n");
        assert_eq!(
            h.router.on_bytes(id, raw.as_bytes()),
            Action::CloseConnection {
                farewell: Some(Bytes::from_static(&[0xFF, 0x00]))
            },
            "path={path}"
        );
        let snap = h.router.snapshot(id).unwrap();
        assert_eq!(snap.lifecycle, LifecycleState::Closed);
        assert_ne!(snap.classification, Classification::Native);
        assert_eq!(
            h.router.on_bytes(id, b"more"),
            Action::CloseConnection { farewell: None }
        );
    }
    assert_eq!(h.metrics.handshake_rejections.get(&[("reason", "scope")]), 3);
    assert_eq!(h.scopes.registered_len(), 0);
}

#[test]
fn websocket_frames_are_unmasked_and_coalesced() {
    let h = harness();
    upgrade(&h, 9);

    let mut two = masked(0x2, b"AB", [1, 2, 3, 4]);
    two.extend(masked(0x2, b"CD", [4, 3, 2, 1]));
    assert_eq!(h.router.on_bytes(9, &two), Action::Forward(Bytes::from_static(b"ABCD")));
}

#[test]
fn partial_frame_waits_for_the_rest() {
    let h = harness();
    upgrade(&h, 9);

    let frame = masked(0x1, b"Hello", [0x37, 0xfa, 0x21, 0x3d]);
    assert_eq!(h.router.on_bytes(9, &frame[..6]), Action::AwaitMore);
    assert_eq!(h.router.on_bytes(9, &frame[6..]), Action::Forward(Bytes::from_static(b"Hello")));
}

#[test]
fn frame_pipelined_behind_the_handshake_is_delivered_at_once() {
    let h = harness();
    let mut raw = UPGRADE.as_bytes().to_vec();
    raw.extend(masked(0x2, b"early", [9, 9, 9, 9]));

    let Action::HandshakeComplete { response, then } = h.router.on_bytes(4, &raw) else {
        panic!("expected handshake");
    };
    assert!(response.starts_with(b"HTTP/1.1 101"));
    assert_eq!(then.as_deref(), Some(&Action::Forward(Bytes::from_static(b"early"))));

    let next = masked(0x2, b"!", [1, 1, 1, 1]);
    assert_eq!(h.router.on_bytes(4, &next), Action::Forward(Bytes::from_static(b"!")));
}

#[test]
fn partial_frame_behind_the_handshake_waits_for_the_rest() {
    let h = harness();
    let frame = masked(0x1, b"Hello", [0x37, 0xfa, 0x21, 0x3d]);
    let mut raw = UPGRADE.as_bytes().to_vec();
    raw.extend_from_slice(&frame[..4]);

    assert!(matches!(
        h.router.on_bytes(4, &raw),
        Action::HandshakeComplete { then: None, .. }
    ));
    assert_eq!(h.router.on_bytes(4, &frame[4..]), Action::Forward(Bytes::from_static(b"Hello")));
}

#[test]
fn close_frame_behind_the_handshake_closes_at_once() {
    let h = harness();
    let mut raw = UPGRADE.as_bytes().to_vec();
    raw.extend([0x88, 0x80, 0, 0, 0, 0]);

    let Action::HandshakeComplete { then, .. } = h.router.on_bytes(7, &raw) else {
        panic!("expected handshake");
    };
    assert_eq!(then.as_deref(), Some(&Action::CloseConnection { farewell: None }));
    assert_eq!(h.router.snapshot(7).unwrap().lifecycle, LifecycleState::Closed);

    h.router.close(7);
    assert!(h.scopes.connections_in("live").is_empty());
}

#[test]
fn zero_length_frames_deliver_nothing() {
    let h = harness();
    upgrade(&h, 10);
    assert_eq!(h.router.on_bytes(10, &masked(0x1, b"", [1, 2, 3, 4])), Action::AwaitMore);
}

#[test]
fn close_frame_closes_and_discards_the_rest() {
    let h = harness();
    upgrade(&h, 3);

    let mut buf = vec![0x88, 0x80, 0, 0, 0, 0];
    buf.extend(masked(0x1, b"ignored", [1, 2, 3, 4]));
    assert_eq!(h.router.on_bytes(3, &buf), Action::CloseConnection { farewell: None });
    assert_eq!(
        h.router.on_bytes(3, &masked(0x1, b"late", [1, 2, 3, 4])),
        Action::CloseConnection { farewell: None }
    );
}

#[test]
fn oversized_frame_closes_the_connection() {
    let h = harness_with(RouterConfig {
        limits: DecoderLimits {
            max_frame_bytes: 1024,
            ..DecoderLimits::default()
        },
        ..RouterConfig::default()
    });
    upgrade(&h, 8);

    let header = [0x82, 0xff, 0, 0, 0, 0, 0, 0, 0x10, 0x00, 1, 2, 3, 4];
    assert_eq!(h.router.on_bytes(8, &header), Action::CloseConnection { farewell: None });
    assert_eq!(h.metrics.decode_errors.get(&[("code", "OVERSIZED_FRAME")]), 1);
}

#[test]
fn dropped_pings_produce_no_delivery() {
    let h = harness_with(RouterConfig {
        limits: DecoderLimits {
            control_payloads: ControlPayloads::Drop,
            ..DecoderLimits::default()
        },
        ..RouterConfig::default()
    });
    upgrade(&h, 6);

    assert_eq!(h.router.on_bytes(6, &masked(0x9, b"ping", [1, 2, 3, 4])), Action::AwaitMore);
    assert_eq!(
        h.router.on_bytes(6, &masked(0x1, b"data", [1, 2, 3, 4])),
        Action::Forward(Bytes::from_static(b"data"))
    );
}

#[test]
fn close_destroys_the_entry_and_unregisters() {
    let h = harness();
    upgrade(&h, 11);
    h.router.on_bytes(12, b"\x03native");
    assert_eq!(h.router.len(), 2);

    let snap = h.router.close(11).unwrap();
    assert_eq!(snap.lifecycle, LifecycleState::Closed);
    assert!(h.scopes.connections_in("live").is_empty());
    assert!(h.router.snapshot(11).is_none());

    assert!(h.router.close(12).is_some());
    assert!(h.router.close(12).is_none());
    assert!(h.router.is_empty());
}

#[test]
fn overlong_request_headers_fall_back_to_native() {
    let h = harness_with(RouterConfig {
        max_handshake_bytes: 300,
        ..RouterConfig::default()
    });
    let mut raw = b"GET /live HTTP/1.1\r\nX-Filler: ".to_vec();
    raw.extend(std::iter::repeat(b'a').take(200));
    assert_eq!(h.router.on_bytes(1, &raw), Action::AwaitMore);

    let more = vec![b'b'; 200];
    let mut all = raw.clone();
    all.extend(&more);
    assert_eq!(h.router.on_bytes(1, &more), Action::Forward(Bytes::from(all)));
    assert_eq!(h.router.classification(1), Some(Classification::Native));
}
