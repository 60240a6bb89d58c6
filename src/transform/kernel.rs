// src/transform/kernel.rs
//
// 3x3 convolution with divisor and offset, matching the semantics the
// transform table was tuned against: RGB channels are convolved, the
// center pixel's alpha is kept, out-of-bounds taps clamp to the edge.
// image::imageops::filter3x3 cannot express the offset term, so this
// stays hand-rolled.

use image::RgbaImage;

pub type Kernel = [[f64; 3]; 3];

/// Blur kernel table. Smooth and Gaussian intentionally share the same
/// values: the original constant table shipped that way, and cache keys
/// and output bytes depend on it, so it is preserved rather than fixed.
pub const BLUR_SMOOTH: Kernel = [
    [0.075, 0.125, 0.075],
    [0.125, 0.200, 0.125],
    [0.075, 0.125, 0.075],
];

pub const BLUR_MEAN: Kernel = [
    [1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0],
    [1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0],
    [1.0 / 9.0, 1.0 / 9.0, 1.0 / 9.0],
];

pub const BLUR_GAUSSIAN: Kernel = BLUR_SMOOTH;

/// Mean removal
pub const SHARPEN: Kernel = [[-1.0, -1.0, -1.0], [-1.0, 9.0, -1.0], [-1.0, -1.0, -1.0]];

/// 3x3 smooth with center weight 8 (divisor 16)
pub const SMOOTHEN: Kernel = [[1.0, 1.0, 1.0], [1.0, 8.0, 1.0], [1.0, 1.0, 1.0]];

pub const EDGE_DETECT: Kernel = [[-1.0, 0.0, -1.0], [0.0, 4.0, 0.0], [-1.0, 0.0, -1.0]];

pub const EMBOSS: Kernel = [[1.5, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, -1.5]];

fn clamp_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Convolve the RGB channels with `kernel`, dividing by `divisor` and
/// adding `offset` per channel. Alpha is carried over unchanged.
pub fn convolve3x3(img: &RgbaImage, kernel: &Kernel, divisor: f64, offset: f64) -> RgbaImage {
    let (width, height) = img.dimensions();
    let mut out = RgbaImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut sums = [0.0f64; 3];
            for (ky, row) in kernel.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    // clamp taps to the edge
                    let sx = (x as i64 + kx as i64 - 1).clamp(0, width as i64 - 1) as u32;
                    let sy = (y as i64 + ky as i64 - 1).clamp(0, height as i64 - 1) as u32;
                    let pixel = img.get_pixel(sx, sy);
                    for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter().take(3)) {
                        *sum += channel as f64 * weight;
                    }
                }
            }
            let alpha = img.get_pixel(x, y).0[3];
            out.put_pixel(
                x,
                y,
                image::Rgba([
                    clamp_u8(sums[0] / divisor + offset),
                    clamp_u8(sums[1] / divisor + offset),
                    clamp_u8(sums[2] / divisor + offset),
                    alpha,
                ]),
            );
        }
    }

    out
}
