// src/handler/webp.rs
//
// WebP (RIFF container) info extraction and metadata chunk mutation.
// ICC profiles live in an ICCP chunk, EXIF in an EXIF chunk; both are
// advertised by flag bits in the VP8X extended-format chunk, which is
// created on demand when metadata is attached to a simple lossy/lossless
// file.

use crate::error::{ImagemillError, Result};
use crate::exif::ExifData;
use crate::icc::ColorProfile;
use crate::info::{ColorSpace, ImageInfo, ImageInfoFields};

/// VP8X flag bits (byte 0 of the chunk payload)
const FLAG_ICC: u8 = 0x20;
const FLAG_ALPHA: u8 = 0x10;
const FLAG_EXIF: u8 = 0x08;
const FLAG_ANIMATION: u8 = 0x02;

/// Optional header some writers prepend to the EXIF chunk payload.
const EXIF_CHUNK_HEADER: &[u8] = b"Exif\x00\x00";

#[derive(Debug, Clone, PartialEq, Eq)]
struct RiffChunk<'a> {
    fourcc: [u8; 4],
    data: &'a [u8],
    /// First byte of the chunk header
    offset: usize,
    /// First byte after the (padded) payload
    position: usize,
}

fn chunks(data: &[u8]) -> Result<Vec<RiffChunk<'_>>> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(ImagemillError::decode_failed("not a WebP (bad RIFF header)"));
    }

    let mut out = Vec::new();
    let mut pos = 12;

    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(ImagemillError::truncated_data(pos, pos + 8 - data.len()));
        }
        let fourcc = [data[pos], data[pos + 1], data[pos + 2], data[pos + 3]];
        let size = u32::from_le_bytes([
            data[pos + 4],
            data[pos + 5],
            data[pos + 6],
            data[pos + 7],
        ]) as usize;
        let padded = size + (size & 1);
        let end = pos + 8 + padded;
        if pos + 8 + size > data.len() {
            return Err(ImagemillError::truncated_data(
                pos,
                pos + 8 + size - data.len(),
            ));
        }
        out.push(RiffChunk {
            fourcc,
            data: &data[pos + 8..pos + 8 + size],
            offset: pos,
            position: end.min(data.len()),
        });
        pos = end;
    }

    Ok(out)
}

fn le24(bytes: &[u8]) -> u32 {
    bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16
}

/// Canvas dimensions from whichever frame chunk is present.
fn frame_dimensions(chunks: &[RiffChunk<'_>]) -> Result<(u32, u32, bool)> {
    for chunk in chunks {
        match &chunk.fourcc {
            b"VP8X" if chunk.data.len() >= 10 => {
                return Ok((
                    le24(&chunk.data[4..7]) + 1,
                    le24(&chunk.data[7..10]) + 1,
                    chunk.data[0] & FLAG_ALPHA != 0,
                ));
            }
            b"VP8 " if chunk.data.len() >= 10 => {
                // keyframe start code precedes the dimensions
                if chunk.data[3..6] != [0x9D, 0x01, 0x2A] {
                    return Err(ImagemillError::decode_failed(
                        "webp: missing VP8 keyframe start code",
                    ));
                }
                let width = u16::from_le_bytes([chunk.data[6], chunk.data[7]]) as u32 & 0x3FFF;
                let height = u16::from_le_bytes([chunk.data[8], chunk.data[9]]) as u32 & 0x3FFF;
                return Ok((width, height, false));
            }
            b"VP8L" if chunk.data.len() >= 5 => {
                if chunk.data[0] != 0x2F {
                    return Err(ImagemillError::decode_failed(
                        "webp: bad VP8L signature byte",
                    ));
                }
                let bits = u32::from_le_bytes([
                    chunk.data[1],
                    chunk.data[2],
                    chunk.data[3],
                    chunk.data[4],
                ]);
                let width = (bits & 0x3FFF) + 1;
                let height = ((bits >> 14) & 0x3FFF) + 1;
                let alpha = (bits >> 28) & 1 == 1;
                return Ok((width, height, alpha));
            }
            _ => {}
        }
    }
    Err(ImagemillError::decode_failed("webp: no image chunk found"))
}

pub fn info(data: &[u8]) -> Result<ImageInfo> {
    let chunks = chunks(data)?;
    let (width, height, alpha) = frame_dimensions(&chunks)?;

    let mut fields = ImageInfoFields {
        mime_type: "image/webp",
        width,
        height,
        color_space: Some(ColorSpace::Rgb),
        color_depth: Some(8),
        has_alpha_channel: alpha,
        ..Default::default()
    };

    for chunk in &chunks {
        match &chunk.fourcc {
            b"VP8X" if !chunk.data.is_empty() => {
                fields.is_animation = chunk.data[0] & FLAG_ANIMATION != 0;
            }
            b"ANIM" if chunk.data.len() >= 6 => {
                fields.animation_repeat_count =
                    Some(u16::from_le_bytes([chunk.data[4], chunk.data[5]]) as u32);
            }
            b"ANMF" => {
                fields.animation_frames = Some(fields.animation_frames.unwrap_or(0) + 1);
            }
            _ => {}
        }
    }

    ImageInfo::new(fields)
}

pub fn has_color_profile(data: &[u8]) -> Result<bool> {
    Ok(chunks(data)?.iter().any(|c| &c.fourcc == b"ICCP"))
}

pub fn get_color_profile(data: &[u8]) -> Result<Option<ColorProfile>> {
    let chunks = chunks(data)?;
    match chunks.iter().find(|c| &c.fourcc == b"ICCP") {
        Some(chunk) => ColorProfile::new(chunk.data.to_vec()).map(Some),
        None => Ok(None),
    }
}

pub fn set_color_profile(data: &mut Vec<u8>, profile: &ColorProfile) -> Result<()> {
    // ICCP goes right after VP8X, before the image data
    let vp8x_end = ensure_vp8x(data, FLAG_ICC)?;
    insert_chunk(data, vp8x_end, *b"ICCP", profile.data());
    update_riff_size(data);
    Ok(())
}

pub fn remove_color_profile(data: &mut Vec<u8>) -> Result<()> {
    remove_chunks(data, *b"ICCP")?;
    clear_vp8x_flag(data, FLAG_ICC)?;
    update_riff_size(data);
    Ok(())
}

pub fn has_exif_data(data: &[u8]) -> Result<bool> {
    Ok(chunks(data)?.iter().any(|c| &c.fourcc == b"EXIF"))
}

pub fn get_exif_data(data: &[u8]) -> Result<Option<ExifData>> {
    let chunks = chunks(data)?;
    match chunks.iter().find(|c| &c.fourcc == b"EXIF") {
        Some(chunk) => {
            let blob = chunk
                .data
                .strip_prefix(EXIF_CHUNK_HEADER)
                .unwrap_or(chunk.data);
            ExifData::new(blob.to_vec()).map(Some)
        }
        None => Ok(None),
    }
}

pub fn set_exif_data(data: &mut Vec<u8>, exif: &ExifData) -> Result<()> {
    ensure_vp8x(data, FLAG_EXIF)?;
    // EXIF trails the image data per the container chunk ordering
    let end = data.len();
    insert_chunk(data, end, *b"EXIF", exif.data());
    update_riff_size(data);
    Ok(())
}

pub fn remove_exif_data(data: &mut Vec<u8>) -> Result<()> {
    remove_chunks(data, *b"EXIF")?;
    clear_vp8x_flag(data, FLAG_EXIF)?;
    update_riff_size(data);
    Ok(())
}

/// Make sure a VP8X chunk exists and carries `flag`; returns the offset
/// just past the VP8X chunk.
fn ensure_vp8x(data: &mut Vec<u8>, flag: u8) -> Result<usize> {
    let parsed = chunks(data)?;

    if let Some(chunk) = parsed.iter().find(|c| &c.fourcc == b"VP8X") {
        if chunk.data.is_empty() {
            return Err(ImagemillError::decode_failed("webp: empty VP8X chunk"));
        }
        let flags_at = chunk.offset + 8;
        let position = chunk.position;
        data[flags_at] |= flag;
        return Ok(position);
    }

    // build a VP8X from the frame dimensions and prepend it
    let (width, height, alpha) = frame_dimensions(&parsed)?;
    let mut payload = vec![0u8; 10];
    payload[0] = flag | if alpha { FLAG_ALPHA } else { 0 };
    payload[4..7].copy_from_slice(&(width - 1).to_le_bytes()[0..3]);
    payload[7..10].copy_from_slice(&(height - 1).to_le_bytes()[0..3]);

    insert_chunk(data, 12, *b"VP8X", &payload);
    Ok(12 + 8 + 10)
}

fn clear_vp8x_flag(data: &mut Vec<u8>, flag: u8) -> Result<()> {
    let parsed = chunks(data)?;
    if let Some(chunk) = parsed.iter().find(|c| &c.fourcc == b"VP8X") {
        if !chunk.data.is_empty() {
            let flags_at = chunk.offset + 8;
            data[flags_at] &= !flag;
        }
    }
    Ok(())
}

fn insert_chunk(data: &mut Vec<u8>, at: usize, fourcc: [u8; 4], payload: &[u8]) {
    let mut chunk = Vec::with_capacity(payload.len() + 9);
    chunk.extend_from_slice(&fourcc);
    chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    chunk.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        chunk.push(0);
    }
    data.splice(at..at, chunk);
}

fn remove_chunks(data: &mut Vec<u8>, fourcc: [u8; 4]) -> Result<()> {
    let spans: Vec<(usize, usize)> = chunks(data)?
        .iter()
        .filter(|c| c.fourcc == fourcc)
        .map(|c| (c.offset, c.position))
        .collect();
    for (offset, position) in spans.into_iter().rev() {
        data.drain(offset..position);
    }
    Ok(())
}

fn update_riff_size(data: &mut Vec<u8>) {
    let size = (data.len().saturating_sub(8)) as u32;
    data[4..8].copy_from_slice(&size.to_le_bytes());
}
