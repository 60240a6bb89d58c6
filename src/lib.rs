// lib.rs
//
// imagemill: the image subsystem of a file-based CMS, as a standalone
// library crate.
//
// Design goals:
// - Bounds-checked binary parsing of JPEG/GIF segment streams
// - EXIF and ICC metadata carried across re-encodes
// - Lazy transform chains, applied in one pass at process()
// - Content-addressed caching of derived images (render at most once)

pub mod cache;
pub mod codec;
pub mod common;
pub mod error;
pub mod exif;
pub mod handler;
pub mod icc;
pub mod image;
pub mod info;
pub mod options;
pub mod segment;
pub mod transform;

pub use error::{ErrorCategory, ImagemillError, Result};
pub use exif::{ExifData, ExifDateTime};
pub use handler::{Capabilities, Format, Handler};
pub use icc::{ColorProfile, DeviceClass, RenderingIntent};
pub use image::Image;
pub use info::{ColorSpace, ImageInfo};
pub use options::ImageOptions;
pub use transform::{BlurMode, FlipDirection, ResizeMode, Transform, TransformCollection};

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Larger images are rejected to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA. Beyond this is likely malicious.
pub const MAX_PIXELS: u64 = 100_000_000;
