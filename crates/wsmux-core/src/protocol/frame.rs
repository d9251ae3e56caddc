//! Incremental WebSocket frame decoder (RFC 6455 section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! Parsing rules:
//! - Read through a `bytes::Buf` cursor with `remaining()` checks; never index
//!   past the input.
//! - One `decode` call parses every frame in the input and coalesces their
//!   payloads. If any frame is incomplete the whole call yields
//!   `NeedMoreData` and consumes nothing; the caller keeps the bytes.
//! - Lengths are carried as `u64` and checked against the configured maximum
//!   before anything is narrowed to `usize`.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, WsMuxError};
use crate::protocol::mask::unmask_into;

/// Largest frame header: 2 base bytes + 8 length bytes + 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

/// 64-bit lengths at or above this value are never accepted.
pub const MAX_SUPPORTED_LEN: u64 = i32::MAX as u64;

/// WebSocket opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// 0x3-0x7 and 0xB-0xF.
    Reserved(u8),
}

impl Opcode {
    /// Parse the low nibble of the first header byte.
    #[inline]
    pub fn from_u8(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Reserved(other),
        }
    }

    /// Wire value of this opcode.
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(v) => v,
        }
    }

    /// Ping and pong. Close never reaches payload extraction.
    #[inline]
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// What happens to ping/pong payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlPayloads {
    /// Append them to the data output like any data frame.
    #[default]
    Fold,
    /// Consume the frame, deliver nothing.
    Drop,
}

/// Decoder limits and policy, fixed per listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderLimits {
    /// Largest accepted payload length of a single frame.
    pub max_frame_bytes: u64,
    /// Ping/pong payload handling.
    pub control_payloads: ControlPayloads,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: MAX_SUPPORTED_LEN - 1,
            control_payloads: ControlPayloads::Fold,
        }
    }
}

impl DecoderLimits {
    /// Largest incomplete trailing frame a connection may hold between reads.
    ///
    /// Complete frames retained in front of it do not count.
    pub fn max_partial_frame_bytes(&self) -> u64 {
        self.max_frame_bytes.saturating_add(MAX_HEADER_LEN as u64)
    }
}

/// Parsed frame header (everything before the payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub opcode: Opcode,
    pub masked: bool,
    pub payload_len: u64,
}

/// Result of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Every frame in the input was parsed.
    Complete {
        /// Coalesced, unmasked payload of all parsed frames.
        payload: Bytes,
        /// Bytes consumed from the input (always the whole input).
        consumed: usize,
        /// Number of frames parsed.
        frames: usize,
    },
    /// Some frame is incomplete; nothing was consumed.
    NeedMoreData,
    /// A close frame was seen; output gathered so far is discarded.
    ConnectionShouldClose,
}

/// Decode every frame in `input`.
///
/// Returns `Err(OversizedFrame)` when a length field exceeds `limits`; the
/// connection cannot be resynchronised after that and must be closed.
pub fn decode(input: &[u8], limits: &DecoderLimits) -> Result<DecodeOutcome> {
    decode_attempt(input, limits).map(|(outcome, _)| outcome)
}

/// Like [`decode`], also returning where the first incomplete frame starts
/// (`input.len()` when there is none).
fn decode_attempt(input: &[u8], limits: &DecoderLimits) -> Result<(DecodeOutcome, usize)> {
    let mut cur = input;
    let mut out = BytesMut::new();
    let mut frames = 0usize;

    while cur.has_remaining() {
        let frame_start = input.len() - cur.remaining();
        let b0 = cur.get_u8();
        let fin = (b0 >> 7) & 1 == 1;
        let opcode = Opcode::from_u8(b0);
        tracing::trace!(fin, opcode = opcode.as_u8(), "frame info");

        match opcode {
            Opcode::Continuation | Opcode::Text | Opcode::Binary => {}
            Opcode::Ping => tracing::trace!("ping"),
            Opcode::Pong => tracing::trace!("pong"),
            Opcode::Close => {
                tracing::debug!(discarded = out.len(), "close frame received");
                return Ok((DecodeOutcome::ConnectionShouldClose, input.len()));
            }
            Opcode::Reserved(op) => tracing::info!(opcode = op, "unhandled opcode"),
        }

        let Some(header) = read_length(&mut cur, fin, opcode, limits)? else {
            return Ok((need_more(), frame_start));
        };

        let key_len: u64 = if header.masked { 4 } else { 0 };
        if header.payload_len + key_len > cur.remaining() as u64 {
            return Ok((need_more(), frame_start));
        }
        // Bounded by cur.remaining() above.
        let len = header.payload_len as usize;

        let mask_key = if header.masked {
            let mut key = [0u8; 4];
            cur.copy_to_slice(&mut key);
            Some(key)
        } else {
            None
        };

        let (body, rest) = cur.split_at(len);
        cur = rest;
        frames += 1;

        if opcode.is_control() && limits.control_payloads == ControlPayloads::Drop {
            tracing::trace!(len, "control payload dropped");
            continue;
        }

        match mask_key {
            Some(key) => unmask_into(&mut out, body, key),
            None => out.extend_from_slice(body),
        }
    }

    if frames == 0 {
        return Ok((need_more(), 0));
    }

    let outcome = DecodeOutcome::Complete {
        payload: out.freeze(),
        consumed: input.len(),
        frames,
    };
    Ok((outcome, input.len()))
}

fn need_more() -> DecodeOutcome {
    tracing::debug!("not enough data available to decode");
    DecodeOutcome::NeedMoreData
}

/// Second header byte plus extended length. `Ok(None)` when truncated.
fn read_length(
    cur: &mut &[u8],
    fin: bool,
    opcode: Opcode,
    limits: &DecoderLimits,
) -> Result<Option<FrameHeader>> {
    if !cur.has_remaining() {
        return Ok(None);
    }
    let b1 = cur.get_u8();
    let masked = (b1 >> 7) & 1 == 1;
    let base = b1 & 0x7F;
    tracing::trace!(masked, base, "payload length");

    let payload_len = match base {
        126 => {
            if cur.remaining() < 2 {
                return Ok(None);
            }
            u64::from(cur.get_u16())
        }
        127 => {
            if cur.remaining() < 8 {
                return Ok(None);
            }
            let extended = cur.get_u64();
            if extended >= MAX_SUPPORTED_LEN {
                tracing::error!(len = extended, "data frame is too large for this implementation");
                return Err(WsMuxError::OversizedFrame(extended));
            }
            extended
        }
        n => u64::from(n),
    };

    if payload_len > limits.max_frame_bytes {
        tracing::warn!(
            len = payload_len,
            max = limits.max_frame_bytes,
            "data frame exceeds configured maximum"
        );
        return Err(WsMuxError::OversizedFrame(payload_len));
    }

    Ok(Some(FrameHeader {
        fin,
        opcode,
        masked,
        payload_len,
    }))
}

/// Undecoded bytes carried between reads for one WebSocket connection.
///
/// Holds the tail of the stream that did not yet form complete frames. It is
/// cleared once a decode attempt consumes it and dropped with the connection.
#[derive(Debug, Default)]
pub struct DecoderState {
    pending: BytesMut,
}

impl DecoderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes retained for the next attempt.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append `chunk` to the retained bytes and attempt a decode.
    ///
    /// On `NeedMoreData` everything stays buffered for the next call, the
    /// complete frames in front of the unfinished one included. On a close or
    /// an error the buffer is discarded.
    pub fn feed(&mut self, chunk: &[u8], limits: &DecoderLimits) -> Result<DecodeOutcome> {
        self.pending.extend_from_slice(chunk);

        match decode_attempt(&self.pending, limits) {
            Ok((complete @ DecodeOutcome::Complete { consumed, .. }, _)) => {
                self.pending.advance(consumed);
                Ok(complete)
            }
            Ok((DecodeOutcome::NeedMoreData, incomplete_at)) => {
                let partial = (self.pending.len() - incomplete_at) as u64;
                if partial > limits.max_partial_frame_bytes() {
                    self.pending.clear();
                    return Err(WsMuxError::OversizedFrame(partial));
                }
                Ok(DecodeOutcome::NeedMoreData)
            }
            Ok((DecodeOutcome::ConnectionShouldClose, _)) => {
                self.pending.clear();
                Ok(DecodeOutcome::ConnectionShouldClose)
            }
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }
}
