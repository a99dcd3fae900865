#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary input must never panic the decoder.
    let _ = b2f::codec::lzhuf::decompress(data);

    // And everything we compress must come back intact.
    if data.len() < 64 * 1024 {
        let compressed = b2f::codec::lzhuf::compress(data).expect("compress");
        let out = b2f::codec::lzhuf::decompress(&compressed).expect("decompress");
        assert_eq!(out, data);
    }
});
