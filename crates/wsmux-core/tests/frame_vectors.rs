//! Frame decoder vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use wsmux_core::protocol::frame::{decode, DecodeOutcome, DecoderLimits};

mod vector_loader;
use vector_loader::load;

#[test]
fn frame_vectors() {
    let files = [
        "unmasked_text.json",
        "masked_text.json",
        "coalesced_binary.json",
        "fragmented_text.json",
        "header_and_mask_only.json",
        "truncated_extended_length.json",
        "first_byte_only.json",
        "complete_then_partial.json",
        "close_then_data.json",
        "data_then_close.json",
        "ping_folded.json",
        "reserved_opcode.json",
        "empty_frame.json",
        "oversized_64bit.json",
        "medium_binary.json",
        "masked_medium_binary.json",
        "small_payload_64bit_length.json",
    ];
    let limits = DecoderLimits::default();

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = decode(&raw, &limits);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let outcome = res.expect("expected ok outcome");
        let ex = v.expect.expect("missing expect block");

        match ex["outcome"].as_str().unwrap() {
            "complete" => {
                let DecodeOutcome::Complete {
                    payload,
                    consumed,
                    frames,
                } = outcome
                else {
                    panic!("vector={}: expected complete, got {outcome:?}", v.description);
                };
                let want = hex::decode(ex["payload"].as_str().unwrap()).unwrap();
                assert_eq!(&payload[..], &want[..], "vector={}", v.description);
                assert_eq!(consumed, raw.len(), "vector={}", v.description);
                assert_eq!(frames as u64, ex["frames"].as_u64().unwrap(), "vector={}", v.description);
            }
            "need_more" => {
                assert_eq!(outcome, DecodeOutcome::NeedMoreData, "vector={}", v.description)
            }
            "close" => assert_eq!(
                outcome,
                DecodeOutcome::ConnectionShouldClose,
                "vector={}",
                v.description
            ),
            other => panic!("unknown outcome {other}"),
        }
    }
}
