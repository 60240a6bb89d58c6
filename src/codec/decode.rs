// src/codec/decode.rs
//
// Raster decoding, routed per format: JPEG through mozjpeg (libjpeg-turbo),
// PNG through zune-png, WebP through libwebp, GIF through the image crate.
// Every path lands on an RGBA8 raster and enforces the decompression-bomb
// limits.

use crate::common::run_with_panic_policy;
use crate::error::{ImagemillError, Result};
use crate::handler::Format;
use crate::{MAX_DIMENSION, MAX_PIXELS};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use mozjpeg::Decompress;
use webp::{BitstreamFeatures, Decoder as WebPDecoder};
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ImagemillError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(ImagemillError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Decode to an RGBA raster, routed by format.
pub fn rasterize(format: Format, data: &[u8]) -> Result<RgbaImage> {
    match format {
        Format::Jpeg => decode_jpeg_mozjpeg(data),
        Format::Png => decode_png_zune(data),
        Format::Webp => decode_webp_libwebp(data),
        Format::Gif => decode_gif(data),
        Format::Svg => Err(ImagemillError::unsupported_feature(
            Format::Svg.mime_type(),
            "rasterization",
        )),
    }
}

/// Decode JPEG using mozjpeg (backed by libjpeg-turbo).
/// This is SIGNIFICANTLY faster than the image crate's pure Rust decoder.
fn decode_jpeg_mozjpeg(data: &[u8]) -> Result<RgbaImage> {
    run_with_panic_policy("decode:mozjpeg", || {
        if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
            return Err(ImagemillError::decode_failed(
                "mozjpeg: missing JPEG EOI marker",
            ));
        }

        let decompress = Decompress::new_mem(data).map_err(|e| {
            ImagemillError::decode_failed(format!("mozjpeg decompress init failed: {e:?}"))
        })?;

        let mut decompress = decompress.rgb().map_err(|e| {
            ImagemillError::decode_failed(format!("mozjpeg rgb conversion failed: {e:?}"))
        })?;

        let width = decompress.width();
        let height = decompress.height();
        check_dimensions(width as u32, height as u32)?;

        let pixels: Vec<[u8; 3]> = decompress.read_scanlines().map_err(|e| {
            ImagemillError::decode_failed(format!("mozjpeg: failed to read scanlines: {e:?}"))
        })?;

        let flat_pixels: Vec<u8> = pixels.into_iter().flatten().collect();

        let rgb_image = RgbImage::from_raw(width as u32, height as u32, flat_pixels)
            .ok_or_else(|| {
                ImagemillError::decode_failed("mozjpeg: failed to create image from raw data")
            })?;

        Ok(DynamicImage::ImageRgb8(rgb_image).to_rgba8())
    })
}

/// Decode PNG using zune-png (SIMD最適化デコーダ)。16bit入力は8bitへダウンサンプル。
fn decode_png_zune(data: &[u8]) -> Result<RgbaImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| ImagemillError::decode_failed(format!("png: decode failed: {e}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| ImagemillError::decode_failed("png: missing header info"))?;

        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => {
                return Err(ImagemillError::decode_failed(
                    "png: unexpected non-U8 pixel buffer",
                ))
            }
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| ImagemillError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| ImagemillError::decode_failed("png: failed to build RGB image"))?,
            ColorSpace::RGBA | ColorSpace::YCbCr | ColorSpace::BGRA | ColorSpace::ARGB => {
                RgbaImage::from_raw(width, height, buf)
                    .map(DynamicImage::ImageRgba8)
                    .ok_or_else(|| {
                        ImagemillError::decode_failed("png: failed to build RGBA image")
                    })?
            }
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| ImagemillError::decode_failed("png: failed to build Luma image"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| {
                    ImagemillError::decode_failed("png: failed to build LumaA image")
                })?,
            other => {
                return Err(ImagemillError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };

        Ok(img.to_rgba8())
    })
}

/// Decode WebP using libwebp (via webp crate). Falls back to the image
/// crate for animated WebP.
fn decode_webp_libwebp(data: &[u8]) -> Result<RgbaImage> {
    run_with_panic_policy("decode:webp", || {
        // Parse header first to avoid allocating huge buffers on malformed files
        let features = BitstreamFeatures::new(data).ok_or_else(|| {
            ImagemillError::decode_failed("webp: failed to read bitstream features")
        })?;

        if features.has_animation() {
            // libwebp's simple decoder does not support animation
            let img = image::load_from_memory_with_format(data, image::ImageFormat::WebP)
                .map_err(|e| {
                    ImagemillError::decode_failed(format!("webp (animated) decode failed: {e}"))
                })?;
            check_dimensions(img.width(), img.height())?;
            return Ok(img.to_rgba8());
        }

        check_dimensions(features.width(), features.height())?;

        let decoder = WebPDecoder::new(data);
        let decoded = decoder
            .decode()
            .ok_or_else(|| ImagemillError::decode_failed("webp: decode failed"))?;

        let img = decoded.to_image();
        // the header and the decoded frame must agree
        check_dimensions(img.width(), img.height())?;

        Ok(img.to_rgba8())
    })
}

/// Decode GIF via the image crate (first frame).
fn decode_gif(data: &[u8]) -> Result<RgbaImage> {
    run_with_panic_policy("decode:gif", || {
        let img = image::load_from_memory_with_format(data, image::ImageFormat::Gif)
            .map_err(|e| ImagemillError::decode_failed(format!("gif: decode failed: {e}")))?;
        check_dimensions(img.width(), img.height())?;
        Ok(img.to_rgba8())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensions_limits() {
        assert!(check_dimensions(100, 100).is_ok());
        assert!(check_dimensions(MAX_DIMENSION, 1).is_ok());
        assert!(check_dimensions(MAX_DIMENSION + 1, 1).is_err());
        assert!(check_dimensions(20000, 20000).is_err()); // pixel count
    }

    #[test]
    fn test_garbage_data_fails_cleanly() {
        let garbage = vec![0xAB; 64];
        assert!(rasterize(Format::Jpeg, &garbage).is_err());
        assert!(rasterize(Format::Png, &garbage).is_err());
        assert!(rasterize(Format::Webp, &garbage).is_err());
        assert!(rasterize(Format::Gif, &garbage).is_err());
    }

    #[test]
    fn test_svg_cannot_rasterize() {
        let err = rasterize(Format::Svg, b"<svg/>").unwrap_err();
        assert!(matches!(err, ImagemillError::UnsupportedFeature { .. }));
    }
}
