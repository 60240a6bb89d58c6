// src/codec/encode.rs
//
// Raster re-encoding honoring the per-format options. A quality or
// compression value of -1 selects the encoder default.

use crate::common::run_with_panic_policy;
use crate::error::{ImagemillError, Result};
use crate::handler::Format;
use crate::options::ImageOptions;
use color_quant::NeuQuant;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use mozjpeg::{ColorSpace, Compress};
use std::borrow::Cow;
use std::io::Cursor;

/// Default JPEG quality when the option is -1 (libjpeg's default).
const JPEG_DEFAULT_QUALITY: f32 = 75.0;

/// Default WebP quality when the option is -1 (libwebp's default).
const WEBP_DEFAULT_QUALITY: f32 = 75.0;

/// Alpha threshold below which a pixel maps to the transparent palette
/// slot when quantizing for GIF.
const GIF_ALPHA_CUTOFF: u8 = 128;

/// Encode a raster into the target format's byte stream.
pub fn encode(format: Format, img: &RgbaImage, options: &ImageOptions) -> Result<Vec<u8>> {
    match format {
        Format::Jpeg => encode_jpeg(img, options.jpeg_quality, options.jpeg_progressive),
        Format::Png => encode_png(img, options.png_compression),
        Format::Webp => encode_webp(img, options.webp_quality),
        Format::Gif => encode_gif(img, options.gif_colors),
        Format::Svg => Err(ImagemillError::unsupported_feature(
            Format::Svg.mime_type(),
            "raster encoding",
        )),
    }
}

/// Encode to JPEG using mozjpeg. Alpha is flattened by dropping the
/// channel (the raster pipeline keeps color values unpremultiplied).
pub fn encode_jpeg(img: &RgbaImage, quality: i32, progressive: bool) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:jpeg", || {
        let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
        let (w, h) = rgb.dimensions();
        let pixels: &[u8] = rgb.as_raw();

        if w == 0 || h == 0 {
            return Err(ImagemillError::encode_failed(
                "jpeg",
                "image dimensions must be non-zero",
            ));
        }

        let quality = if quality < 0 {
            JPEG_DEFAULT_QUALITY
        } else {
            quality.min(100) as f32
        };

        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(w as usize, h as usize);
        comp.set_color_space(ColorSpace::JCS_YCbCr);
        comp.set_quality(quality);
        if progressive {
            comp.set_progressive_mode();
        }
        comp.set_optimize_coding(true);

        let estimated_size = (w as usize * h as usize * 3 / 10).max(4096);
        let mut output = Vec::with_capacity(estimated_size);

        let mut writer = comp.start_compress(&mut output).map_err(|e| {
            ImagemillError::encode_failed("jpeg", format!("mozjpeg: failed to start compress: {e:?}"))
        })?;

        let stride = w as usize * 3;
        for row in pixels.chunks(stride) {
            writer.write_scanlines(row).map_err(|e| {
                ImagemillError::encode_failed(
                    "jpeg",
                    format!("mozjpeg: failed to write scanlines: {e:?}"),
                )
            })?;
        }

        writer.finish().map_err(|e| {
            ImagemillError::encode_failed("jpeg", format!("mozjpeg: failed to finish: {e:?}"))
        })?;

        Ok(output)
    })
}

/// Encode to PNG via the image crate. The 0-9 zlib scale maps onto the
/// encoder's three presets: 0-3 fast, 4-6 default, 7-9 best.
pub fn encode_png(img: &RgbaImage, compression: i32) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let compression_type = match compression {
            -1 => CompressionType::Default,
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        };

        let mut output = Cursor::new(Vec::new());
        let encoder =
            PngEncoder::new_with_quality(&mut output, compression_type, FilterType::Adaptive);
        encoder
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| ImagemillError::encode_failed("png", e.to_string()))?;

        Ok(output.into_inner())
    })
}

/// Encode to WebP via libwebp with lossy quality control.
pub fn encode_webp(img: &RgbaImage, quality: i32) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:webp", || {
        let quality = if quality < 0 {
            WEBP_DEFAULT_QUALITY
        } else {
            quality.min(100) as f32
        };

        let encoder = webp::Encoder::from_rgba(img.as_raw(), img.width(), img.height());
        let memory = encoder.encode(quality);
        Ok(memory.to_vec())
    })
}

/// Encode to GIF with an explicit palette of at most `colors` entries.
///
/// Transparency is special-cased to avoid corruption from direct palette
/// remapping: one palette slot is reserved as fully transparent, opaque
/// pixels are quantized into the remaining slots, and pixels below the
/// alpha cutoff map to the reserved slot.
// GIF は透過を先に確定させないとパレット化で壊れる
pub fn encode_gif(img: &RgbaImage, colors: u16) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:gif", || {
        let (w, h) = img.dimensions();
        if w > u16::MAX as u32 || h > u16::MAX as u32 {
            return Err(ImagemillError::encode_failed(
                "gif",
                format!("dimensions {w}x{h} exceed the GIF limit"),
            ));
        }

        let has_transparency = img.pixels().any(|p| p.0[3] < GIF_ALPHA_CUTOFF);
        let max_colors = colors.clamp(1, 256) as usize;
        let quant_colors = if has_transparency {
            (max_colors.saturating_sub(1)).max(2)
        } else {
            max_colors.max(2)
        };

        // train the quantizer on the opaque pixels only, flattened to a=255
        let mut training: Vec<u8> = Vec::with_capacity(img.as_raw().len());
        for pixel in img.pixels() {
            if pixel.0[3] >= GIF_ALPHA_CUTOFF {
                training.extend_from_slice(&[pixel.0[0], pixel.0[1], pixel.0[2], 255]);
            }
        }
        if training.is_empty() {
            training.extend_from_slice(&[0, 0, 0, 255]);
        }

        let quantizer = NeuQuant::new(10, quant_colors, &training);

        let mut palette = quantizer.color_map_rgb();
        let transparent_index = if has_transparency {
            let index = (palette.len() / 3) as u8;
            palette.extend_from_slice(&[0, 0, 0]);
            Some(index)
        } else {
            None
        };

        let indices: Vec<u8> = img
            .pixels()
            .map(|pixel| {
                if pixel.0[3] < GIF_ALPHA_CUTOFF {
                    transparent_index.unwrap_or(0)
                } else {
                    quantizer.index_of(&[pixel.0[0], pixel.0[1], pixel.0[2], 255]) as u8
                }
            })
            .collect();

        let mut output = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut output, w as u16, h as u16, &palette)
                .map_err(|e| ImagemillError::encode_failed("gif", e.to_string()))?;

            let frame = gif::Frame {
                width: w as u16,
                height: h as u16,
                buffer: Cow::Owned(indices),
                transparent: transparent_index,
                ..gif::Frame::default()
            };

            encoder
                .write_frame(&frame)
                .map_err(|e| ImagemillError::encode_failed("gif", e.to_string()))?;
        }

        Ok(output)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128, 255])
        })
    }

    #[test]
    fn test_encode_jpeg_magic_bytes() {
        let encoded = encode_jpeg(&gradient(8, 8), 80, false).unwrap();
        assert_eq!(&encoded[0..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded[encoded.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_jpeg_default_quality() {
        assert!(encode_jpeg(&gradient(8, 8), -1, false).is_ok());
    }

    #[test]
    fn test_encode_png_magic_bytes() {
        let encoded = encode_png(&gradient(8, 8), -1).unwrap();
        assert_eq!(&encoded[0..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_encode_webp_magic_bytes() {
        let encoded = encode_webp(&gradient(16, 16), 80).unwrap();
        assert_eq!(&encoded[0..4], b"RIFF");
        assert_eq!(&encoded[8..12], b"WEBP");
    }

    #[test]
    fn test_encode_gif_magic_bytes() {
        let encoded = encode_gif(&gradient(8, 8), 256).unwrap();
        assert_eq!(&encoded[0..6], b"GIF89a");
        assert_eq!(*encoded.last().unwrap(), 0x3B);
    }

    #[test]
    fn test_encode_gif_transparency_reserved_slot() {
        let mut img = gradient(8, 8);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        let encoded = encode_gif(&img, 16).unwrap();
        // decode back via the image crate: the transparent pixel survives
        let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Gif)
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
        assert_eq!(decoded.get_pixel(4, 4).0[3], 255);
    }

    #[test]
    fn test_encode_gif_respects_palette_budget() {
        let encoded = encode_gif(&gradient(32, 32), 8).unwrap();
        let decoded = image::load_from_memory_with_format(&encoded, image::ImageFormat::Gif)
            .unwrap()
            .to_rgba8();
        let mut unique: std::collections::BTreeSet<[u8; 4]> = Default::default();
        for pixel in decoded.pixels() {
            unique.insert(pixel.0);
        }
        assert!(unique.len() <= 8);
    }
}
