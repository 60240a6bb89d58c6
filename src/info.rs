// src/info.rs
//
// ImageInfo: the immutable per-decode description of an image, plus the
// color space enumeration shared with the ICC profile reader.

use crate::error::{ImagemillError, Result};

/// Color spaces as they appear in decoded headers and ICC profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Rgb,
    Cmyk,
    Cmy,
    Grayscale,
    Palette,
    Lab,
    Luv,
    YCbCr,
    Xyy,
    Hsv,
    Hls,
    Xyz,
}

impl ColorSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorSpace::Rgb => "RGB",
            ColorSpace::Cmyk => "CMYK",
            ColorSpace::Cmy => "CMY",
            ColorSpace::Grayscale => "Grayscale",
            ColorSpace::Palette => "Palette",
            ColorSpace::Lab => "LAB",
            ColorSpace::Luv => "LUV",
            ColorSpace::YCbCr => "YCbCr",
            ColorSpace::Xyy => "xyY",
            ColorSpace::Hsv => "HSV",
            ColorSpace::Hls => "HLS",
            ColorSpace::Xyz => "XYZ",
        }
    }
}

/// Immutable image description derived from decoded headers.
///
/// Constructed once per decode; width and height are validated to be at
/// least 1. Fields that a format cannot express stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    mime_type: &'static str,
    width: u32,
    height: u32,
    color_space: Option<ColorSpace>,
    color_depth: Option<u8>,
    color_number: Option<u32>,
    has_alpha_channel: bool,
    is_animation: bool,
    animation_frames: Option<u32>,
    animation_repeat_count: Option<u32>,
}

/// Builder-style input for [`ImageInfo::new`]. Every handler fills the
/// fields it knows about and leaves the rest at their defaults.
#[derive(Debug, Clone, Default)]
pub struct ImageInfoFields {
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub color_space: Option<ColorSpace>,
    pub color_depth: Option<u8>,
    pub color_number: Option<u32>,
    pub has_alpha_channel: bool,
    pub is_animation: bool,
    pub animation_frames: Option<u32>,
    pub animation_repeat_count: Option<u32>,
}

impl ImageInfo {
    /// Validating constructor. Zero or missing dimensions mean the decoder
    /// never found a frame header, which is a decode failure, not a valid
    /// empty result.
    pub fn new(fields: ImageInfoFields) -> Result<Self> {
        if fields.width < 1 || fields.height < 1 {
            return Err(ImagemillError::decode_failed(format!(
                "invalid image dimensions {}x{}",
                fields.width, fields.height
            )));
        }

        Ok(Self {
            mime_type: fields.mime_type,
            width: fields.width,
            height: fields.height,
            color_space: fields.color_space,
            color_depth: fields.color_depth,
            color_number: fields.color_number,
            has_alpha_channel: fields.has_alpha_channel,
            is_animation: fields.is_animation,
            animation_frames: fields.animation_frames,
            animation_repeat_count: fields.animation_repeat_count,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Image width in pixels (always >= 1)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels (always >= 1)
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_space(&self) -> Option<ColorSpace> {
        self.color_space
    }

    /// Bits per channel, where the format declares it
    pub fn color_depth(&self) -> Option<u8> {
        self.color_depth
    }

    /// Palette size for indexed formats
    pub fn color_number(&self) -> Option<u32> {
        self.color_number
    }

    pub fn has_alpha_channel(&self) -> bool {
        self.has_alpha_channel
    }

    pub fn is_animation(&self) -> bool {
        self.is_animation
    }

    pub fn animation_frames(&self) -> Option<u32> {
        self.animation_frames
    }

    /// Number of times the animation plays; `None` for still images,
    /// `Some(0)` for "loop forever".
    pub fn animation_repeat_count(&self) -> Option<u32> {
        self.animation_repeat_count
    }
}
