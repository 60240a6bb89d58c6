// src/codec.rs
//
// The byte<->raster boundary: format-routed decoding into RGBA rasters
// and re-encoding honoring the per-format options.

pub mod decode;
pub mod encode;

pub use decode::rasterize;
pub use encode::encode;
