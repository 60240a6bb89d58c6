#![no_main]

//! Fuzz target for the EXIF IFD reader. Exercises the tag walk, sub-IFD
//! pointers and value decoding on arbitrary data.

use imagemill::exif::reader;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = reader::read(data);
});
