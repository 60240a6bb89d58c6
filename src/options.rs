// src/options.rs
//
// Encode and processing options shared by handlers and the Image facade.

use crate::error::{ImagemillError, Result};
use std::path::PathBuf;

/// Options controlling re-encoding and the derivative cache.
///
/// A value of `-1` for a quality/compression knob means "use the encoder
/// default". The options participate in cache-key derivation, so changing
/// any encode-relevant value invalidates cached derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOptions {
    /// JPEG quality, -1 or 0-100
    pub jpeg_quality: i32,
    /// Encode JPEG as progressive instead of baseline
    pub jpeg_progressive: bool,
    /// PNG compression, -1 or 0-9
    pub png_compression: i32,
    /// WebP quality, -1 or 0-100
    pub webp_quality: i32,
    /// Number of palette entries for GIF output, 1-256
    pub gif_colors: u16,
    /// Carry the source ICC profile into the output when the target
    /// format can hold one
    pub preserve_color_profile: bool,
    /// Carry the source EXIF data into the output when the target
    /// format can hold it
    pub preserve_exif_data: bool,
    /// Root directory of the derivative cache
    pub process_path: PathBuf,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: -1,
            jpeg_progressive: false,
            png_compression: -1,
            webp_quality: -1,
            gif_colors: 256,
            preserve_color_profile: true,
            preserve_exif_data: true,
            process_path: PathBuf::new(),
        }
    }
}

impl ImageOptions {
    /// Check every knob against its documented range. Called once when an
    /// [`crate::Image`](crate::Image) is created so bad configuration
    /// fails before any pixel work.
    pub fn validate(&self) -> Result<()> {
        if !(-1..=100).contains(&self.jpeg_quality) {
            return Err(ImagemillError::invalid_argument(
                "jpeg_quality",
                self.jpeg_quality.to_string(),
                "must be -1 or in range 0-100",
            ));
        }
        if !(-1..=9).contains(&self.png_compression) {
            return Err(ImagemillError::invalid_argument(
                "png_compression",
                self.png_compression.to_string(),
                "must be -1 or in range 0-9",
            ));
        }
        if !(-1..=100).contains(&self.webp_quality) {
            return Err(ImagemillError::invalid_argument(
                "webp_quality",
                self.webp_quality.to_string(),
                "must be -1 or in range 0-100",
            ));
        }
        if !(1..=256).contains(&self.gif_colors) {
            return Err(ImagemillError::invalid_argument(
                "gif_colors",
                self.gif_colors.to_string(),
                "must be in range 1-256",
            ));
        }
        Ok(())
    }
}
