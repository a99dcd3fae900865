#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = b2f::Message::from_bytes(data) {
        // Anything that parses must serialize and re-parse.
        let bytes = msg.to_bytes();
        let _ = b2f::Message::from_bytes(&bytes).expect("canonical form parses");
    }
});
