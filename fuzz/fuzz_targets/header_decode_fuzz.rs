//! Fuzz test for the session-token header decoder
//!
//! Feeds arbitrary UTF-8 to `decode_header` looking for panics, and checks
//! that anything accepted re-encodes to a value that decodes identically.
//!
//! Run with: cargo +nightly fuzz run header_decode_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tidemark_core::{decode_header, TokenFormat};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(tokens) = decode_header(input) {
            let encoded = TokenFormat::Partitioned.encode(&tokens);
            let reparsed = decode_header(&encoded).expect("encoded header must decode");
            assert_eq!(reparsed, tokens, "re-encoding changed the token set");
        }
    }
});
