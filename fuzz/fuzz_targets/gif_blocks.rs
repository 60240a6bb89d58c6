#![no_main]

//! Fuzz target for the GIF block decoder.

use imagemill::segment::GifBlocks;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = GifBlocks::new(data).collect::<Result<Vec<_>, _>>();
});
