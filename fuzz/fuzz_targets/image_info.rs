#![no_main]

//! Fuzz target for info extraction across all format handlers.

use imagemill::{Format, Handler, ImageOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for format in [Format::Jpeg, Format::Png, Format::Gif, Format::Webp, Format::Svg] {
        let handler = Handler::new(format, data.to_vec(), ImageOptions::default());
        let _ = handler.info();
        let _ = handler.has_color_profile();
        let _ = handler.has_exif_data();
    }
});
