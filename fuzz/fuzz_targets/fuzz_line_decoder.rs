//! Fuzz target: `LineDecoder::feed` + `decode_line`
//!
//! Drives arbitrary byte sequences from the "serial link" through the
//! framer and the envelope decoder.  Neither may panic, the partial-line
//! buffer must stay bounded, and a reset must leave the decoder clean.
//!
//! cargo fuzz run fuzz_line_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use tbao_bridge::wire::codec::{LineDecoder, MAX_LINE_LEN, decode_line};

fuzz_target!(|data: &[u8]| {
    let mut decoder = LineDecoder::new();

    // First byte picks the read size so chunk boundaries vary too.
    let chunk = data.first().map_or(1, |b| usize::from(*b).max(1));
    for piece in data.chunks(chunk) {
        decoder.feed(piece, |line| {
            if let Ok(text) = line {
                assert!(text.len() <= MAX_LINE_LEN, "line exceeds MAX_LINE_LEN");
                let _ = decode_line(text);
            }
        });
        assert!(decoder.pending_len() <= MAX_LINE_LEN);
    }

    decoder.reset();
    assert_eq!(decoder.pending_len(), 0);
});
