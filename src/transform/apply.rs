// src/transform/apply.rs
//
// Pixel application of the transform variants. Everything operates on
// RGBA rasters; resampling goes through fast_image_resize with alpha
// premultiplication, with the image crate as fallback.

use crate::error::{ImagemillError, Result};
use crate::info::ImageInfo;
use crate::transform::kernel::{self, convolve3x3};
use crate::transform::{BlurMode, FlipDirection, ResizeMode, Transform};
use fast_image_resize::{self as fir, MulDiv, PixelType, ResizeOptions};
use image::{imageops, Rgba, RgbaImage};

pub fn apply(transform: &Transform, img: RgbaImage, info: &ImageInfo) -> Result<RgbaImage> {
    let _ = info; // the pre-transform info is part of the contract, even
                  // though none of the current variants consult it
    match *transform {
        Transform::Crop {
            origin_x,
            origin_y,
            width,
            height,
        } => crop(&img, origin_x, origin_y, width, height),
        Transform::Resize {
            width,
            height,
            mode,
        } => resize(&img, width, height, mode),
        Transform::Scale { factor } => scale(&img, factor),
        Transform::Rotate { angle } => Ok(rotate(&img, angle)),
        Transform::Flip { direction } => Ok(flip(img, direction)),
        Transform::Blur { amount, mode } => Ok(blur(img, amount, mode)),
        Transform::Brightness { amount } => Ok(brightness(img, amount)),
        Transform::Contrast { amount } => Ok(contrast(img, amount)),
        Transform::Colorize {
            red,
            green,
            blue,
            alpha,
        } => Ok(colorize(img, red, green, blue, alpha)),
        Transform::Desaturate => Ok(desaturate(img)),
        Transform::EdgeDetect => Ok(convolve3x3(&img, &kernel::EDGE_DETECT, 1.0, 127.0)),
        Transform::Emboss => Ok(convolve3x3(&img, &kernel::EMBOSS, 1.0, 127.0)),
        Transform::Invert => Ok(invert(img)),
        Transform::Pixelate { amount } => Ok(pixelate(img, amount)),
        Transform::Sharpen => Ok(convolve3x3(&img, &kernel::SHARPEN, 1.0, 0.0)),
        Transform::Smoothen => Ok(convolve3x3(&img, &kernel::SMOOTHEN, 16.0, 0.0)),
    }
}

/// Copy the source region onto a fresh transparent canvas. Regions that
/// reach past the source edge stay transparent.
fn crop(img: &RgbaImage, origin_x: u32, origin_y: u32, width: u32, height: u32) -> Result<RgbaImage> {
    let mut out = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    let copy_width = img.width().saturating_sub(origin_x).min(width);
    let copy_height = img.height().saturating_sub(origin_y).min(height);

    for y in 0..copy_height {
        for x in 0..copy_width {
            out.put_pixel(x, y, *img.get_pixel(origin_x + x, origin_y + y));
        }
    }

    Ok(out)
}

fn resize(img: &RgbaImage, width: u32, height: u32, mode: ResizeMode) -> Result<RgbaImage> {
    let (src_w, src_h) = img.dimensions();
    if (src_w, src_h) == (width, height) {
        return Ok(img.clone());
    }

    match mode {
        ResizeMode::Fill => resample(img, width, height),
        ResizeMode::Cover => {
            let scale_w = width as f64 / src_w as f64;
            let scale_h = height as f64 / src_h as f64;
            let scale = scale_w.max(scale_h);
            let resize_w = ((src_w as f64 * scale).ceil() as u32).max(1);
            let resize_h = ((src_h as f64 * scale).ceil() as u32).max(1);

            let resized = resample(img, resize_w, resize_h)?;
            let crop_x = (resized.width().saturating_sub(width)) / 2;
            let crop_y = (resized.height().saturating_sub(height)) / 2;
            Ok(imageops::crop_imm(&resized, crop_x, crop_y, width, height).to_image())
        }
        ResizeMode::Contain => {
            let scale_w = width as f64 / src_w as f64;
            let scale_h = height as f64 / src_h as f64;
            let scale = scale_w.min(scale_h);
            let fit_w = ((src_w as f64 * scale).round() as u32).clamp(1, width);
            let fit_h = ((src_h as f64 * scale).round() as u32).clamp(1, height);

            let resized = resample(img, fit_w, fit_h)?;
            let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
            let left = ((width - fit_w) / 2) as i64;
            let top = ((height - fit_h) / 2) as i64;
            imageops::overlay(&mut canvas, &resized, left, top);
            Ok(canvas)
        }
    }
}

/// Floor the scaled dimensions and delegate to a Fill resize. Tiny
/// factors on tiny images can floor to zero, which is an error here
/// rather than at construction (the factor alone is valid).
fn scale(img: &RgbaImage, factor: f64) -> Result<RgbaImage> {
    let width = (img.width() as f64 * factor).floor() as i64;
    let height = (img.height() as f64 * factor).floor() as i64;

    if width < 1 || height < 1 {
        return Err(ImagemillError::invalid_argument(
            "factor",
            factor.to_string(),
            "computed dimensions must be greater than 0",
        ));
    }

    resample(img, width as u32, height as u32)
}

/// SIMD resample via fast_image_resize (Lanczos3), with alpha
/// premultiplication around the filter and the image crate as fallback
/// when the fir path rejects the buffer.
pub fn resample(img: &RgbaImage, dst_width: u32, dst_height: u32) -> Result<RgbaImage> {
    let (src_w, src_h) = img.dimensions();
    let mut pixels = img.as_raw().clone();

    let resized = fir_resample(src_w, src_h, &mut pixels, dst_width, dst_height)
        .unwrap_or_else(|_| imageops::resize(img, dst_width, dst_height, imageops::FilterType::Lanczos3));

    Ok(resized)
}

fn fir_resample(
    src_w: u32,
    src_h: u32,
    pixels: &mut [u8],
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<RgbaImage, String> {
    let mut src_image = fir::images::Image::from_slice_u8(src_w, src_h, pixels, PixelType::U8x4)
        .map_err(|e| format!("fir source image error: {e:?}"))?;
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);

    let mul_div = MulDiv::default();
    mul_div
        .multiply_alpha_inplace(&mut src_image)
        .map_err(|e| format!("failed to premultiply alpha: {e}"))?;

    let options = ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(
        fir::FilterType::Lanczos3,
    ));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    mul_div
        .divide_alpha_inplace(&mut dst_image)
        .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;

    RgbaImage::from_raw(dst_width, dst_height, dst_image.into_vec())
        .ok_or_else(|| "failed to create image from resized data".to_string())
}

/// Rotate counterclockwise by `angle` degrees. Quarter turns map to the
/// exact flips; anything else goes through inverse-mapped bilinear
/// sampling with a transparent background behind the exposed corners.
fn rotate(img: &RgbaImage, angle: f64) -> RgbaImage {
    let normalized = angle.rem_euclid(360.0);

    if normalized == 0.0 {
        return img.clone();
    }
    // counterclockwise quarter turns (imageops rotates clockwise)
    if normalized == 90.0 {
        return imageops::rotate270(img);
    }
    if normalized == 180.0 {
        return imageops::rotate180(img);
    }
    if normalized == 270.0 {
        return imageops::rotate90(img);
    }

    let radians = normalized.to_radians();
    let (sin, cos) = radians.sin_cos();
    let (src_w, src_h) = (img.width() as f64, img.height() as f64);

    let dst_w = (src_w * cos.abs() + src_h * sin.abs()).ceil().max(1.0) as u32;
    let dst_h = (src_w * sin.abs() + src_h * cos.abs()).ceil().max(1.0) as u32;

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let mut out = RgbaImage::from_pixel(dst_w, dst_h, Rgba([0, 0, 0, 0]));

    for y in 0..dst_h {
        for x in 0..dst_w {
            let dx = x as f64 + 0.5 - dst_cx;
            let dy = y as f64 + 0.5 - dst_cy;
            // inverse of a counterclockwise rotation in raster coordinates
            let sx = dx * cos - dy * sin + src_cx - 0.5;
            let sy = dx * sin + dy * cos + src_cy - 0.5;
            if let Some(pixel) = bilinear_sample(img, sx, sy) {
                out.put_pixel(x, y, pixel);
            }
        }
    }

    out
}

fn bilinear_sample(img: &RgbaImage, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if x < -1.0 || y < -1.0 || x > w as f64 || y > h as f64 {
        return None;
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut acc = [0.0f64; 4];
    let mut weight_sum = 0.0;

    for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
        for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
            let px = x0 + dx;
            let py = y0 + dy;
            let weight = wx * wy;
            if weight == 0.0 || px < 0 || py < 0 || px >= w || py >= h {
                continue;
            }
            let pixel = img.get_pixel(px as u32, py as u32);
            for (a, &c) in acc.iter_mut().zip(pixel.0.iter()) {
                *a += c as f64 * weight;
            }
            weight_sum += weight;
        }
    }

    if weight_sum == 0.0 {
        return None;
    }
    // alpha keeps the full weights so partial edge coverage falls off
    // to transparent instead of bleeding the border color outward
    Some(Rgba([
        (acc[0] / weight_sum).round() as u8,
        (acc[1] / weight_sum).round() as u8,
        (acc[2] / weight_sum).round() as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ]))
}

fn flip(img: RgbaImage, direction: FlipDirection) -> RgbaImage {
    match direction {
        FlipDirection::Horizontal => imageops::flip_horizontal(&img),
        FlipDirection::Vertical => imageops::flip_vertical(&img),
        FlipDirection::Both => imageops::rotate180(&img),
    }
}

/// Repeated 3x3 convolution, one pass per unit of `amount`. Intentionally
/// O(amount) passes rather than one wider kernel: the output depends on
/// the iteration.
fn blur(img: RgbaImage, amount: i32, mode: BlurMode) -> RgbaImage {
    let kernel = mode.kernel();
    let mut current = img;
    for _ in 0..amount.max(0) {
        current = convolve3x3(&current, kernel, 1.0, 0.55);
    }
    current
}

fn map_rgb(mut img: RgbaImage, f: impl Fn(u8) -> u8) -> RgbaImage {
    for pixel in img.pixels_mut() {
        pixel.0[0] = f(pixel.0[0]);
        pixel.0[1] = f(pixel.0[1]);
        pixel.0[2] = f(pixel.0[2]);
    }
    img
}

fn brightness(img: RgbaImage, amount: i32) -> RgbaImage {
    map_rgb(img, |c| (c as i32 + amount).clamp(0, 255) as u8)
}

/// Contrast curve around mid-gray. The caller-facing sign is inverted
/// relative to the underlying curve so that +100 means more contrast.
fn contrast(img: RgbaImage, amount: i32) -> RgbaImage {
    let factor = {
        let f = (100.0 + amount as f64) / 100.0;
        f * f
    };
    map_rgb(img, |c| {
        let v = ((c as f64 / 255.0 - 0.5) * factor + 0.5) * 255.0;
        v.round().clamp(0.0, 255.0) as u8
    })
}

/// Channel-additive colorize. The alpha amount is on the 0-127
/// transparency scale (127 = fully transparent) and is added to the
/// pixel's transparency.
fn colorize(mut img: RgbaImage, red: u8, green: u8, blue: u8, alpha: u8) -> RgbaImage {
    for pixel in img.pixels_mut() {
        pixel.0[0] = (pixel.0[0] as i32 + red as i32).clamp(0, 255) as u8;
        pixel.0[1] = (pixel.0[1] as i32 + green as i32).clamp(0, 255) as u8;
        pixel.0[2] = (pixel.0[2] as i32 + blue as i32).clamp(0, 255) as u8;

        let transparency = ((255 - pixel.0[3]) >> 1) as i32;
        let new_transparency = (transparency + alpha as i32).clamp(0, 127);
        pixel.0[3] = if new_transparency == 127 {
            0
        } else {
            (255 - new_transparency * 2) as u8
        };
    }
    img
}

/// REC.601 luma desaturation
fn desaturate(mut img: RgbaImage) -> RgbaImage {
    for pixel in img.pixels_mut() {
        let luma = (pixel.0[0] as f64 * 0.299
            + pixel.0[1] as f64 * 0.587
            + pixel.0[2] as f64 * 0.114)
            .round()
            .clamp(0.0, 255.0) as u8;
        pixel.0[0] = luma;
        pixel.0[1] = luma;
        pixel.0[2] = luma;
    }
    img
}

fn invert(img: RgbaImage) -> RgbaImage {
    map_rgb(img, |c| 255 - c)
}

/// Replace each `amount`-sized block with its upper-left pixel.
/// Block sizes below 2 are the identity.
fn pixelate(mut img: RgbaImage, amount: i32) -> RgbaImage {
    if amount < 2 {
        return img;
    }
    let block = amount as u32;
    let (width, height) = img.dimensions();

    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let sample = *img.get_pixel(bx, by);
            for y in by..(by + block).min(height) {
                for x in bx..(bx + block).min(width) {
                    img.put_pixel(x, y, sample);
                }
            }
        }
    }
    img
}
