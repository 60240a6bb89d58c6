// src/handler/jpeg.rs
//
// JPEG-specific info extraction and metadata segment mutation. EXIF lives
// in an APP1 segment behind the `Exif\0\0` header; ICC profiles are
// chunked across APP2 segments behind `ICC_PROFILE\0` with a 1-based
// index / count pair.

use crate::error::{ImagemillError, Result};
use crate::exif::ExifData;
use crate::icc::ColorProfile;
use crate::info::{ColorSpace, ImageInfo, ImageInfoFields};
use crate::segment::jpeg::{JpegSegments, APP1, APP2, MAX_BYTES_IN_SEGMENT, SOI};
use std::collections::BTreeMap;

/// Image EXIF header
pub const EXIF_HEADER: &[u8] = b"Exif\x00\x00";

/// Image ICC profile header
pub const ICC_PROFILE_HEADER: &[u8] = b"ICC_PROFILE\x00";

fn is_frame_marker(marker: u8) -> bool {
    // SOF0-SOF2 and SOF9-SOF11 carry the frame dimensions
    (0xC0..=0xC2).contains(&marker) || (0xC9..=0xCB).contains(&marker)
}

fn color_space_from_components(components: u8) -> Result<ColorSpace> {
    match components {
        1 => Ok(ColorSpace::Grayscale),
        3 => Ok(ColorSpace::Rgb),
        4 => Ok(ColorSpace::Cmyk),
        _ => Err(ImagemillError::unexpected_value("invalid color space")),
    }
}

pub fn info(data: &[u8]) -> Result<ImageInfo> {
    let mut fields = ImageInfoFields {
        mime_type: "image/jpeg",
        ..Default::default()
    };

    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if !is_frame_marker(segment.marker) {
            continue;
        }
        if segment.value.len() < 6 {
            return Err(ImagemillError::truncated_data(
                segment.offset,
                6 - segment.value.len(),
            ));
        }
        fields.color_depth = Some(segment.value[0]);
        fields.height = u16::from_be_bytes([segment.value[1], segment.value[2]]) as u32;
        fields.width = u16::from_be_bytes([segment.value[3], segment.value[4]]) as u32;
        fields.color_space = Some(color_space_from_components(segment.value[5])?);
        break;
    }

    ImageInfo::new(fields)
}

pub fn has_color_profile(data: &[u8]) -> Result<bool> {
    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if segment.marker == APP2 && segment.value.starts_with(ICC_PROFILE_HEADER) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Reassemble the chunked APP2 profile. The chunk count advertised by
/// the segments must match the number of chunks actually found.
pub fn get_color_profile(data: &[u8]) -> Result<Option<ColorProfile>> {
    let header_length = ICC_PROFILE_HEADER.len();
    let mut chunks: BTreeMap<u8, &[u8]> = BTreeMap::new();
    let mut chunk_count = 0u8;

    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if segment.marker != APP2 || !segment.value.starts_with(ICC_PROFILE_HEADER) {
            continue;
        }
        if segment.value.len() < header_length + 2 {
            return Err(ImagemillError::truncated_data(
                segment.offset,
                header_length + 2 - segment.value.len(),
            ));
        }
        let chunk_number = segment.value[header_length];
        chunk_count = segment.value[header_length + 1];
        chunks.insert(chunk_number, &segment.value[header_length + 2..]);
    }

    if chunks.is_empty() {
        return Ok(None);
    }

    if chunks.len() != chunk_count as usize {
        return Err(ImagemillError::chunk_count_mismatch(
            chunk_count,
            chunks.len(),
        ));
    }

    // BTreeMap iteration restores chunk order via the index byte
    let mut profile = Vec::new();
    for chunk in chunks.values() {
        profile.extend_from_slice(chunk);
    }

    ColorProfile::new(profile).map(Some)
}

pub fn set_color_profile(data: &mut Vec<u8>, profile: &ColorProfile) -> Result<()> {
    let encoded = encode_color_profile(profile.data());
    insert_after_soi(data, &encoded)
}

pub fn remove_color_profile(data: &mut Vec<u8>) -> Result<()> {
    remove_matching_segments(data, APP2, ICC_PROFILE_HEADER)
}

pub fn has_exif_data(data: &[u8]) -> Result<bool> {
    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if segment.marker == APP1 && segment.value.starts_with(EXIF_HEADER) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn get_exif_data(data: &[u8]) -> Result<Option<ExifData>> {
    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if segment.marker == APP1 && segment.value.starts_with(EXIF_HEADER) {
            let blob = segment.value[EXIF_HEADER.len()..].to_vec();
            return ExifData::new(blob).map(Some);
        }
    }
    Ok(None)
}

pub fn set_exif_data(data: &mut Vec<u8>, exif: &ExifData) -> Result<()> {
    let encoded = encode_exif_data(exif.data())?;
    insert_after_soi(data, &encoded)
}

pub fn remove_exif_data(data: &mut Vec<u8>) -> Result<()> {
    remove_matching_segments(data, APP1, EXIF_HEADER)
}

/// Splice new segment bytes in at SOI's insertion point.
fn insert_after_soi(data: &mut Vec<u8>, encoded: &[u8]) -> Result<()> {
    let mut insert_at = None;
    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if segment.marker == SOI {
            insert_at = Some(segment.position);
            break;
        }
    }
    let position =
        insert_at.ok_or_else(|| ImagemillError::decode_failed("missing SOI marker"))?;
    data.splice(position..position, encoded.iter().copied());
    Ok(())
}

/// Delete every segment of `marker` whose payload starts with `header`.
/// Spans are collected first and spliced back-to-front so earlier offsets
/// stay valid.
fn remove_matching_segments(data: &mut Vec<u8>, marker: u8, header: &[u8]) -> Result<()> {
    let mut spans = Vec::new();
    for segment in JpegSegments::new(data) {
        let segment = segment?;
        if segment.marker == marker && segment.value.starts_with(header) {
            spans.push((segment.offset, segment.position));
        }
    }
    for (offset, position) in spans.into_iter().rev() {
        data.drain(offset..position);
    }
    Ok(())
}

/// Encode ICC profile data into chunked APP2 segments.
fn encode_color_profile(profile: &[u8]) -> Vec<u8> {
    let max_chunk_size = MAX_BYTES_IN_SEGMENT - ICC_PROFILE_HEADER.len() - 4;
    let chunks: Vec<&[u8]> = profile.chunks(max_chunk_size).collect();
    let count = chunks.len() as u8;

    let mut out = Vec::with_capacity(profile.len() + chunks.len() * 20);
    for (i, chunk) in chunks.iter().enumerate() {
        let value_len = ICC_PROFILE_HEADER.len() + 2 + chunk.len();
        out.push(0xFF);
        out.push(APP2);
        out.extend_from_slice(&((value_len + 2) as u16).to_be_bytes());
        out.extend_from_slice(ICC_PROFILE_HEADER);
        out.push((i + 1) as u8);
        out.push(count);
        out.extend_from_slice(chunk);
    }
    out
}

/// Encode an EXIF blob into a single APP1 segment.
fn encode_exif_data(exif: &[u8]) -> Result<Vec<u8>> {
    let value_len = EXIF_HEADER.len() + exif.len();
    if value_len + 2 > u16::MAX as usize {
        return Err(ImagemillError::invalid_argument(
            "exif",
            exif.len().to_string(),
            "EXIF blob does not fit in a single APP1 segment",
        ));
    }

    let mut out = Vec::with_capacity(value_len + 4);
    out.push(0xFF);
    out.push(APP1);
    out.extend_from_slice(&((value_len + 2) as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(exif);
    Ok(out)
}
