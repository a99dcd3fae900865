//! Property-based tests using proptest
//!
//! These validate codec and container invariants across randomly
//! generated inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use b2f::codec::{lzhuf, Codec};
use b2f::message::{Attachment, Message};
use proptest::prelude::*;

// Property: LZHUF round-trips arbitrary payloads
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn prop_lzhuf_roundtrip(data in prop::collection::vec(any::<u8>(), 0..50_000)) {
        let compressed = lzhuf::compress(&data).expect("compress");
        let decompressed = lzhuf::decompress(&compressed).expect("decompress");
        prop_assert_eq!(decompressed, data);
    }
}

// Property: gzip round-trips arbitrary payloads
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn prop_gzip_roundtrip(data in prop::collection::vec(any::<u8>(), 0..50_000)) {
        let compressed = Codec::Gzip.compress(&data).expect("compress");
        let decompressed = Codec::Gzip.decompress(&compressed).expect("decompress");
        prop_assert_eq!(decompressed, data);
    }
}

// Property: compression is deterministic
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_lzhuf_deterministic(data in prop::collection::vec(any::<u8>(), 0..10_000)) {
        let a = lzhuf::compress(&data).expect("compress");
        let b = lzhuf::compress(&data).expect("compress");
        prop_assert_eq!(a, b);
    }
}

// Property: corrupting any single payload byte is detected
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn prop_lzhuf_bitflip_detected(
        data in prop::collection::vec(any::<u8>(), 1..2_000),
        flip_bit in 0u8..8,
        seed in any::<usize>(),
    ) {
        let mut compressed = lzhuf::compress(&data).expect("compress");
        // Only flip inside the bitstream or CRC, leaving the frame header
        // alone.
        let idx = 5 + seed % (compressed.len() - 5);
        compressed[idx] ^= 1 << flip_bit;
        // Either the stream fails to verify, or (for flips in unused
        // trailing pad bits) it still round-trips exactly.
        if let Ok(out) = lzhuf::decompress(&compressed) {
            prop_assert_eq!(out, data);
        }
    }
}

// Property: decompression of arbitrary garbage never panics
proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]
    #[test]
    fn prop_lzhuf_garbage_never_panics(data in prop::collection::vec(any::<u8>(), 0..4_096)) {
        let _ = lzhuf::decompress(&data);
        let _ = Codec::Gzip.decompress(&data);
    }
}

fn arb_message() -> impl Strategy<Value = Message> {
    let body = prop::collection::vec(any::<u8>(), 0..4_096);
    let subject = "[ -~]{0,60}";
    let attachments = prop::collection::vec(
        ("[a-zA-Z0-9_.]{1,20}", prop::collection::vec(any::<u8>(), 0..1_024)),
        0..3,
    );
    (body, subject, attachments).prop_map(|(body, subject, attachments)| {
        let mut msg = Message::new();
        msg.header_mut().set("Mid", "PROPMSG00001");
        msg.header_mut()
            .set("Date", "Thu, 04 Jan 2024 10:00:00 +0000");
        msg.header_mut().set("Type", "Private");
        msg.header_mut().set("From", "LA5NTA");
        msg.header_mut().add("To", "LA1B");
        msg.header_mut().set("Subject", subject.trim());
        msg.header_mut().set("Mbo", "LA5NTA");
        msg.set_body(body);
        for (name, data) in attachments {
            msg.add_attachment(Attachment::new(&name, data));
        }
        msg
    })
}

// Property: message serialization round-trips, headers, body, and
// attachments included
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn prop_message_roundtrip(msg in arb_message()) {
        let bytes = msg.to_bytes();
        let parsed = Message::from_bytes(&bytes).expect("parse");
        prop_assert_eq!(parsed.body(), msg.body());
        prop_assert_eq!(parsed.attachments(), msg.attachments());
        // Canonical serialization is a fixed point.
        prop_assert_eq!(parsed.to_bytes(), bytes);
    }
}

// Property: a message wrapped in a proposal survives the full
// compress/transfer/decompress path
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn prop_proposal_payload_roundtrip(msg in arb_message()) {
        let prop = msg.proposal(b2f::PropCode::Wl2k).expect("proposal");
        prop_assert!(prop.data_is_complete());
        let recovered = prop.message().expect("recover message");
        prop_assert_eq!(recovered.to_bytes(), msg.to_bytes());
    }
}
