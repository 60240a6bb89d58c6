// src/transform.rs
//
// Pixel-space transforms. Each variant validates its parameters at
// construction, applies itself to an RGBA raster, and serializes to a
// stable specifier string used for cache-key derivation.
//
// The specifier is a pure function of the transform's type and
// parameters - no timestamps, no environment - so identical transform
// chains always produce identical cache keys.

pub mod apply;
pub mod collection;
pub mod kernel;

pub use collection::TransformCollection;

use crate::error::{ImagemillError, Result};
use crate::info::ImageInfo;
use image::RgbaImage;

/// How a Resize resolves an aspect-ratio mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Scale to fill the target, cropping the overflow (centered)
    Cover,
    /// Scale to fit inside the target, letterboxing with transparency
    Contain,
    /// Stretch to the exact target dimensions
    Fill,
}

impl ResizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResizeMode::Cover => "cover",
            ResizeMode::Contain => "contain",
            ResizeMode::Fill => "fill",
        }
    }

    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "cover" => Ok(ResizeMode::Cover),
            "contain" => Ok(ResizeMode::Contain),
            "fill" => Ok(ResizeMode::Fill),
            other => Err(ImagemillError::invalid_argument(
                "mode",
                other.to_string(),
                "expected cover, contain or fill",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Horizontal,
    Vertical,
    Both,
}

impl FlipDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlipDirection::Horizontal => "horizontal",
            FlipDirection::Vertical => "vertical",
            FlipDirection::Both => "both",
        }
    }

    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "horizontal" => Ok(FlipDirection::Horizontal),
            "vertical" => Ok(FlipDirection::Vertical),
            "both" => Ok(FlipDirection::Both),
            other => Err(ImagemillError::invalid_argument(
                "direction",
                other.to_string(),
                "expected horizontal, vertical or both",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurMode {
    Smooth,
    Mean,
    Gaussian,
}

impl BlurMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlurMode::Smooth => "smooth",
            BlurMode::Mean => "mean",
            BlurMode::Gaussian => "gaussian",
        }
    }

    pub fn from_str(value: &str) -> Result<Self> {
        match value {
            "smooth" => Ok(BlurMode::Smooth),
            "mean" => Ok(BlurMode::Mean),
            "gaussian" => Ok(BlurMode::Gaussian),
            other => Err(ImagemillError::invalid_argument(
                "mode",
                other.to_string(),
                "expected smooth, mean or gaussian",
            )),
        }
    }

    pub fn kernel(&self) -> &'static kernel::Kernel {
        match self {
            BlurMode::Smooth => &kernel::BLUR_SMOOTH,
            BlurMode::Mean => &kernel::BLUR_MEAN,
            BlurMode::Gaussian => &kernel::BLUR_GAUSSIAN,
        }
    }
}

/// A single pixel-space operation.
///
/// Variants are only constructed through the validating constructors
/// below; out-of-range parameters fail fast, before any pixel work.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Crop {
        origin_x: u32,
        origin_y: u32,
        width: u32,
        height: u32,
    },
    Resize {
        width: u32,
        height: u32,
        mode: ResizeMode,
    },
    Scale {
        factor: f64,
    },
    Rotate {
        angle: f64,
    },
    Flip {
        direction: FlipDirection,
    },
    Blur {
        amount: i32,
        mode: BlurMode,
    },
    Brightness {
        amount: i32,
    },
    Contrast {
        amount: i32,
    },
    Colorize {
        red: u8,
        green: u8,
        blue: u8,
        alpha: u8,
    },
    Desaturate,
    EdgeDetect,
    Emboss,
    Invert,
    Pixelate {
        amount: i32,
    },
    Sharpen,
    Smoothen,
}

fn check_range(name: &'static str, value: i32, min: i32, max: i32) -> Result<()> {
    if value < min || value > max {
        return Err(ImagemillError::invalid_argument(
            name,
            value.to_string(),
            format!("must be in range {min}-{max}"),
        ));
    }
    Ok(())
}

impl Transform {
    pub fn crop(origin_x: u32, origin_y: u32, width: u32, height: u32) -> Result<Self> {
        if width == 0 {
            return Err(ImagemillError::invalid_argument(
                "width",
                width.to_string(),
                "must be greater than 0",
            ));
        }
        if height == 0 {
            return Err(ImagemillError::invalid_argument(
                "height",
                height.to_string(),
                "must be greater than 0",
            ));
        }
        Ok(Transform::Crop {
            origin_x,
            origin_y,
            width,
            height,
        })
    }

    pub fn resize(width: u32, height: u32, mode: ResizeMode) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ImagemillError::invalid_argument(
                "dimensions",
                format!("{width}x{height}"),
                "must be greater than 0",
            ));
        }
        Ok(Transform::Resize {
            width,
            height,
            mode,
        })
    }

    pub fn scale(factor: f64) -> Result<Self> {
        if !(factor > 0.0) || !factor.is_finite() {
            return Err(ImagemillError::invalid_argument(
                "factor",
                factor.to_string(),
                "must be greater than 0",
            ));
        }
        Ok(Transform::Scale { factor })
    }

    pub fn rotate(angle: f64) -> Result<Self> {
        if !angle.is_finite() {
            return Err(ImagemillError::invalid_argument(
                "angle",
                angle.to_string(),
                "must be finite",
            ));
        }
        Ok(Transform::Rotate { angle })
    }

    pub fn flip(direction: FlipDirection) -> Self {
        Transform::Flip { direction }
    }

    pub fn blur(amount: i32, mode: BlurMode) -> Result<Self> {
        check_range("amount", amount, 0, 100)?;
        Ok(Transform::Blur { amount, mode })
    }

    pub fn brightness(amount: i32) -> Result<Self> {
        check_range("amount", amount, -255, 255)?;
        Ok(Transform::Brightness { amount })
    }

    pub fn contrast(amount: i32) -> Result<Self> {
        check_range("amount", amount, -100, 100)?;
        Ok(Transform::Contrast { amount })
    }

    pub fn colorize(red: i32, green: i32, blue: i32, alpha: i32) -> Result<Self> {
        check_range("red", red, 0, 255)?;
        check_range("green", green, 0, 255)?;
        check_range("blue", blue, 0, 255)?;
        check_range("alpha", alpha, 0, 127)?;
        Ok(Transform::Colorize {
            red: red as u8,
            green: green as u8,
            blue: blue as u8,
            alpha: alpha as u8,
        })
    }

    pub fn desaturate() -> Self {
        Transform::Desaturate
    }

    pub fn edgedetect() -> Self {
        Transform::EdgeDetect
    }

    pub fn emboss() -> Self {
        Transform::Emboss
    }

    pub fn invert() -> Self {
        Transform::Invert
    }

    /// No declared upper bound; amounts below 2 leave the image unchanged.
    pub fn pixelate(amount: i32) -> Self {
        Transform::Pixelate { amount }
    }

    pub fn sharpen() -> Self {
        Transform::Sharpen
    }

    pub fn smoothen() -> Self {
        Transform::Smoothen
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Crop { .. } => "crop",
            Transform::Resize { .. } => "resize",
            Transform::Scale { .. } => "scale",
            Transform::Rotate { .. } => "rotate",
            Transform::Flip { .. } => "flip",
            Transform::Blur { .. } => "blur",
            Transform::Brightness { .. } => "brightness",
            Transform::Contrast { .. } => "contrast",
            Transform::Colorize { .. } => "colorize",
            Transform::Desaturate => "desaturate",
            Transform::EdgeDetect => "edgedetect",
            Transform::Emboss => "emboss",
            Transform::Invert => "invert",
            Transform::Pixelate { .. } => "pixelate",
            Transform::Sharpen => "sharpen",
            Transform::Smoothen => "smoothen",
        }
    }

    /// Stable string encoding of the transform's identity and parameters.
    pub fn specifier(&self) -> String {
        match self {
            Transform::Crop {
                origin_x,
                origin_y,
                width,
                height,
            } => format!("crop:{origin_x},{origin_y},{width},{height}"),
            Transform::Resize {
                width,
                height,
                mode,
            } => format!("resize:{width},{height},{}", mode.as_str()),
            Transform::Scale { factor } => format!("scale:{factor}"),
            Transform::Rotate { angle } => format!("rotate:{angle}"),
            Transform::Flip { direction } => format!("flip:{}", direction.as_str()),
            Transform::Blur { amount, mode } => format!("blur:{amount},{}", mode.as_str()),
            Transform::Brightness { amount } => format!("brightness:{amount}"),
            Transform::Contrast { amount } => format!("contrast:{amount}"),
            Transform::Colorize {
                red,
                green,
                blue,
                alpha,
            } => format!("colorize:{red},{green},{blue},{alpha}"),
            Transform::Pixelate { amount } => format!("pixelate:{amount}"),
            Transform::Desaturate
            | Transform::EdgeDetect
            | Transform::Emboss
            | Transform::Invert
            | Transform::Sharpen
            | Transform::Smoothen => self.name().to_string(),
        }
    }

    /// Parse a specifier back into a transform, re-running construction
    /// validation.
    pub fn from_specifier(specifier: &str) -> Result<Self> {
        let bad = || ImagemillError::invalid_specifier(specifier.to_string());

        let (name, params) = match specifier.split_once(':') {
            Some((name, params)) => (name, Some(params)),
            None => (specifier, None),
        };

        fn parts<'a>(params: Option<&'a str>, expected: usize) -> Option<Vec<&'a str>> {
            let split: Vec<&str> = params?.split(',').collect();
            (split.len() == expected).then_some(split)
        }

        match name {
            "crop" => {
                let p = parts(params, 4).ok_or_else(bad)?;
                Transform::crop(
                    p[0].parse().map_err(|_| bad())?,
                    p[1].parse().map_err(|_| bad())?,
                    p[2].parse().map_err(|_| bad())?,
                    p[3].parse().map_err(|_| bad())?,
                )
            }
            "resize" => {
                let p = parts(params, 3).ok_or_else(bad)?;
                Transform::resize(
                    p[0].parse().map_err(|_| bad())?,
                    p[1].parse().map_err(|_| bad())?,
                    ResizeMode::from_str(p[2])?,
                )
            }
            "scale" => {
                let p = parts(params, 1).ok_or_else(bad)?;
                Transform::scale(p[0].parse().map_err(|_| bad())?)
            }
            "rotate" => {
                let p = parts(params, 1).ok_or_else(bad)?;
                Transform::rotate(p[0].parse().map_err(|_| bad())?)
            }
            "flip" => {
                let p = parts(params, 1).ok_or_else(bad)?;
                Ok(Transform::flip(FlipDirection::from_str(p[0])?))
            }
            "blur" => {
                let p = parts(params, 2).ok_or_else(bad)?;
                Transform::blur(p[0].parse().map_err(|_| bad())?, BlurMode::from_str(p[1])?)
            }
            "brightness" => {
                let p = parts(params, 1).ok_or_else(bad)?;
                Transform::brightness(p[0].parse().map_err(|_| bad())?)
            }
            "contrast" => {
                let p = parts(params, 1).ok_or_else(bad)?;
                Transform::contrast(p[0].parse().map_err(|_| bad())?)
            }
            "colorize" => {
                let p = parts(params, 4).ok_or_else(bad)?;
                Transform::colorize(
                    p[0].parse().map_err(|_| bad())?,
                    p[1].parse().map_err(|_| bad())?,
                    p[2].parse().map_err(|_| bad())?,
                    p[3].parse().map_err(|_| bad())?,
                )
            }
            "pixelate" => {
                let p = parts(params, 1).ok_or_else(bad)?;
                Ok(Transform::pixelate(p[0].parse().map_err(|_| bad())?))
            }
            "desaturate" if params.is_none() => Ok(Transform::desaturate()),
            "edgedetect" if params.is_none() => Ok(Transform::edgedetect()),
            "emboss" if params.is_none() => Ok(Transform::emboss()),
            "invert" if params.is_none() => Ok(Transform::invert()),
            "sharpen" if params.is_none() => Ok(Transform::sharpen()),
            "smoothen" if params.is_none() => Ok(Transform::smoothen()),
            _ => Err(bad()),
        }
    }

    /// Apply this transform to a raster. `info` is the pre-transform
    /// image description - it is not recomputed between chained
    /// transforms.
    pub fn apply(&self, img: RgbaImage, info: &ImageInfo) -> Result<RgbaImage> {
        apply::apply(self, img, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_ranges() {
        assert!(Transform::crop(0, 0, 0, 10).is_err());
        assert!(Transform::crop(0, 0, 10, 0).is_err());
        assert!(Transform::crop(0, 0, 10, 10).is_ok());

        assert!(Transform::scale(0.0).is_err());
        assert!(Transform::scale(-1.5).is_err());
        assert!(Transform::scale(f64::NAN).is_err());
        assert!(Transform::scale(0.5).is_ok());

        assert!(Transform::blur(101, BlurMode::Mean).is_err());
        assert!(Transform::blur(-1, BlurMode::Mean).is_err());
        assert!(Transform::blur(100, BlurMode::Mean).is_ok());

        assert!(Transform::brightness(-256).is_err());
        assert!(Transform::brightness(256).is_err());
        assert!(Transform::brightness(255).is_ok());

        assert!(Transform::contrast(101).is_err());
        assert!(Transform::contrast(-100).is_ok());

        assert!(Transform::colorize(256, 0, 0, 0).is_err());
        assert!(Transform::colorize(0, 0, 0, 128).is_err());
        assert!(Transform::colorize(255, 128, 0, 127).is_ok());

        assert!(Transform::resize(0, 10, ResizeMode::Cover).is_err());
    }

    #[test]
    fn test_specifier_format() {
        assert_eq!(
            Transform::crop(0, 0, 100, 100).unwrap().specifier(),
            "crop:0,0,100,100"
        );
        assert_eq!(
            Transform::resize(50, 50, ResizeMode::Cover).unwrap().specifier(),
            "resize:50,50,cover"
        );
        assert_eq!(Transform::scale(1.5).unwrap().specifier(), "scale:1.5");
        assert_eq!(
            Transform::blur(4, BlurMode::Gaussian).unwrap().specifier(),
            "blur:4,gaussian"
        );
        assert_eq!(Transform::desaturate().specifier(), "desaturate");
    }

    #[test]
    fn test_specifier_roundtrip() {
        let transforms = vec![
            Transform::crop(1, 2, 30, 40).unwrap(),
            Transform::resize(50, 60, ResizeMode::Contain).unwrap(),
            Transform::scale(0.25).unwrap(),
            Transform::rotate(90.0).unwrap(),
            Transform::rotate(-22.5).unwrap(),
            Transform::flip(FlipDirection::Both),
            Transform::blur(3, BlurMode::Smooth).unwrap(),
            Transform::brightness(-40).unwrap(),
            Transform::contrast(25).unwrap(),
            Transform::colorize(255, 0, 128, 64).unwrap(),
            Transform::pixelate(8),
            Transform::desaturate(),
            Transform::edgedetect(),
            Transform::emboss(),
            Transform::invert(),
            Transform::sharpen(),
            Transform::smoothen(),
        ];

        for transform in transforms {
            let parsed = Transform::from_specifier(&transform.specifier()).unwrap();
            assert_eq!(transform, parsed);
        }
    }

    #[test]
    fn test_from_specifier_rejects_bad_input() {
        assert!(Transform::from_specifier("crop:").is_err());
        assert!(Transform::from_specifier("crop:1,2,3").is_err());
        assert!(Transform::from_specifier("blur:4,bokeh").is_err());
        assert!(Transform::from_specifier("desaturate:1").is_err());
        assert!(Transform::from_specifier("warp:1").is_err());
        // validation still runs through the parser
        assert!(Transform::from_specifier("blur:500,mean").is_err());
    }
}
