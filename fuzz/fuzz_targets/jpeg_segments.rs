#![no_main]

//! Fuzz target for the JPEG segment decoder: arbitrary input must either
//! iterate to a clean end or error, never panic or read out of bounds.
//! A successful decode must re-serialize byte-identically.

use imagemill::segment::jpeg::{serialize_segments, JpegSegments};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(segments) = JpegSegments::new(data).collect::<Result<Vec<_>, _>>() {
        let serialized = serialize_segments(segments);
        // round-trip holds whenever the stream ends at EOI with no
        // trailing garbage and no fill bytes
        if serialized.len() == data.len() {
            assert_eq!(serialized, data);
        }
    }
});
