#![no_main]

//! Fuzz target for the ICC profile parser: header fields, tag table and
//! text tag decoding on arbitrary data.

use imagemill::ColorProfile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(profile) = ColorProfile::new(data.to_vec()) {
        let _ = profile.name();
        let _ = profile.copyright();
        let _ = profile.profile_version();
        let _ = profile.device_class();
        let _ = profile.color_space();
        let _ = profile.rendering_intent();
    }
});
