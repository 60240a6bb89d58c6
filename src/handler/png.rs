// src/handler/png.rs
//
// PNG info extraction and metadata chunk mutation. PNG is a whole-buffer
// chunk walk rather than a lazy segment stream: ICC profiles live in the
// zlib-compressed iCCP chunk, EXIF in the eXIf chunk, animation control
// in acTL (APNG).

use crate::error::{ImagemillError, Result};
use crate::exif::ExifData;
use crate::icc::ColorProfile;
use crate::info::{ColorSpace, ImageInfo, ImageInfoFields};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::{Compression, Crc};
use std::io::{Read, Write};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Profile name stored in iCCP chunks this module writes.
const ICCP_PROFILE_NAME: &[u8] = b"ICC Profile";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    /// First byte of the chunk (the length field)
    offset: usize,
    /// First byte after the CRC
    position: usize,
}

fn chunks(data: &[u8]) -> Result<Vec<Chunk<'_>>> {
    if data.len() < SIGNATURE.len() || data[..SIGNATURE.len()] != SIGNATURE {
        return Err(ImagemillError::decode_failed("not a PNG (bad signature)"));
    }

    let mut out = Vec::new();
    let mut pos = SIGNATURE.len();

    while pos < data.len() {
        if pos + 8 > data.len() {
            return Err(ImagemillError::truncated_data(pos, pos + 8 - data.len()));
        }
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let kind = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];
        let end = pos + 8 + length + 4;
        if end > data.len() {
            return Err(ImagemillError::truncated_data(pos, end - data.len()));
        }
        out.push(Chunk {
            kind,
            data: &data[pos + 8..pos + 8 + length],
            offset: pos,
            position: end,
        });
        if &kind == b"IEND" {
            break;
        }
        pos = end;
    }

    match out.last() {
        Some(chunk) if &chunk.kind == b"IEND" => Ok(out),
        _ => Err(ImagemillError::decode_failed("missing IEND chunk")),
    }
}

pub fn info(data: &[u8]) -> Result<ImageInfo> {
    let chunks = chunks(data)?;

    let mut fields = ImageInfoFields {
        mime_type: "image/png",
        ..Default::default()
    };
    let mut palette_entries = None;
    let mut has_trns = false;

    for chunk in &chunks {
        match &chunk.kind {
            b"IHDR" => {
                if chunk.data.len() < 13 {
                    return Err(ImagemillError::truncated_data(
                        chunk.offset,
                        13 - chunk.data.len(),
                    ));
                }
                fields.width = u32::from_be_bytes([
                    chunk.data[0],
                    chunk.data[1],
                    chunk.data[2],
                    chunk.data[3],
                ]);
                fields.height = u32::from_be_bytes([
                    chunk.data[4],
                    chunk.data[5],
                    chunk.data[6],
                    chunk.data[7],
                ]);
                fields.color_depth = Some(chunk.data[8]);
                let color_type = chunk.data[9];
                fields.color_space = Some(match color_type {
                    0 | 4 => ColorSpace::Grayscale,
                    3 => ColorSpace::Palette,
                    _ => ColorSpace::Rgb,
                });
                fields.has_alpha_channel = color_type == 4 || color_type == 6;
            }
            b"PLTE" => palette_entries = Some((chunk.data.len() / 3) as u32),
            b"tRNS" => has_trns = true,
            b"acTL" => {
                if chunk.data.len() >= 8 {
                    fields.is_animation = true;
                    fields.animation_frames = Some(u32::from_be_bytes([
                        chunk.data[0],
                        chunk.data[1],
                        chunk.data[2],
                        chunk.data[3],
                    ]));
                    fields.animation_repeat_count = Some(u32::from_be_bytes([
                        chunk.data[4],
                        chunk.data[5],
                        chunk.data[6],
                        chunk.data[7],
                    ]));
                }
            }
            _ => {}
        }
    }

    if fields.color_space == Some(ColorSpace::Palette) {
        fields.color_number = palette_entries;
    }
    if has_trns {
        fields.has_alpha_channel = true;
    }

    ImageInfo::new(fields)
}

pub fn has_color_profile(data: &[u8]) -> Result<bool> {
    Ok(chunks(data)?.iter().any(|c| &c.kind == b"iCCP"))
}

pub fn get_color_profile(data: &[u8]) -> Result<Option<ColorProfile>> {
    let chunks = chunks(data)?;
    let Some(chunk) = chunks.iter().find(|c| &c.kind == b"iCCP") else {
        return Ok(None);
    };

    // profile name (1-79 bytes, null-terminated), compression method, stream
    let name_end = chunk
        .data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| ImagemillError::decode_failed("iCCP: unterminated profile name"))?;
    if name_end + 2 > chunk.data.len() {
        return Err(ImagemillError::decode_failed("iCCP: missing profile data"));
    }
    if chunk.data[name_end + 1] != 0 {
        return Err(ImagemillError::unexpected_value(
            "iCCP: unknown compression method",
        ));
    }

    let mut decoder = ZlibDecoder::new(&chunk.data[name_end + 2..]);
    let mut profile = Vec::new();
    decoder
        .read_to_end(&mut profile)
        .map_err(|e| ImagemillError::decode_failed(format!("iCCP: inflate failed: {e}")))?;

    ColorProfile::new(profile).map(Some)
}

pub fn set_color_profile(data: &mut Vec<u8>, profile: &ColorProfile) -> Result<()> {
    let mut payload = Vec::with_capacity(ICCP_PROFILE_NAME.len() + 2 + profile.data().len() / 2);
    payload.extend_from_slice(ICCP_PROFILE_NAME);
    payload.push(0);
    payload.push(0); // compression method: zlib

    let mut encoder = ZlibEncoder::new(payload, Compression::default());
    encoder
        .write_all(profile.data())
        .and_then(|_| encoder.finish())
        .map_err(|e| ImagemillError::encode_failed("png", format!("iCCP: deflate failed: {e}")))
        .and_then(|payload| insert_after_ihdr(data, *b"iCCP", &payload))
}

pub fn remove_color_profile(data: &mut Vec<u8>) -> Result<()> {
    remove_chunks(data, *b"iCCP")
}

pub fn has_exif_data(data: &[u8]) -> Result<bool> {
    Ok(chunks(data)?.iter().any(|c| &c.kind == b"eXIf"))
}

pub fn get_exif_data(data: &[u8]) -> Result<Option<ExifData>> {
    let chunks = chunks(data)?;
    match chunks.iter().find(|c| &c.kind == b"eXIf") {
        Some(chunk) => ExifData::new(chunk.data.to_vec()).map(Some),
        None => Ok(None),
    }
}

pub fn set_exif_data(data: &mut Vec<u8>, exif: &ExifData) -> Result<()> {
    insert_after_ihdr(data, *b"eXIf", exif.data())
}

pub fn remove_exif_data(data: &mut Vec<u8>) -> Result<()> {
    remove_chunks(data, *b"eXIf")
}

fn build_chunk(kind: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 12);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&kind);
    out.extend_from_slice(payload);

    let mut crc = Crc::new();
    crc.update(&kind);
    crc.update(payload);
    out.extend_from_slice(&crc.sum().to_be_bytes());
    out
}

fn insert_after_ihdr(data: &mut Vec<u8>, kind: [u8; 4], payload: &[u8]) -> Result<()> {
    let insert_at = chunks(data)?
        .iter()
        .find(|c| &c.kind == b"IHDR")
        .map(|c| c.position)
        .ok_or_else(|| ImagemillError::decode_failed("missing IHDR chunk"))?;

    let chunk = build_chunk(kind, payload);
    data.splice(insert_at..insert_at, chunk);
    Ok(())
}

fn remove_chunks(data: &mut Vec<u8>, kind: [u8; 4]) -> Result<()> {
    let spans: Vec<(usize, usize)> = chunks(data)?
        .iter()
        .filter(|c| c.kind == kind)
        .map(|c| (c.offset, c.position))
        .collect();
    for (offset, position) in spans.into_iter().rev() {
        data.drain(offset..position);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::testutil::ExifBuilder;
    use crate::icc::testutil::minimal_profile;
    use image::{Rgba, RgbaImage};

    fn minimal_png() -> Vec<u8> {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        crate::codec::encode::encode_png(&img, -1).unwrap()
    }

    #[test]
    fn test_info_basics() {
        let info = info(&minimal_png()).unwrap();
        assert_eq!(info.width(), 3);
        assert_eq!(info.height(), 2);
        assert!(!info.is_animation());
        assert_eq!(info.mime_type(), "image/png");
    }

    #[test]
    fn test_not_a_png() {
        assert!(info(b"JFIF").is_err());
    }

    #[test]
    fn test_truncated_chunk() {
        let mut data = minimal_png();
        data.truncate(20);
        assert!(info(&data).is_err());
    }

    #[test]
    fn test_color_profile_roundtrip() {
        let mut data = minimal_png();
        assert!(!has_color_profile(&data).unwrap());

        let profile = ColorProfile::new(minimal_profile("PNG Embedded")).unwrap();
        set_color_profile(&mut data, &profile).unwrap();

        assert!(has_color_profile(&data).unwrap());
        let restored = get_color_profile(&data).unwrap().unwrap();
        assert_eq!(restored.data(), profile.data());

        // the buffer is still a decodable PNG after the splice
        assert!(image::load_from_memory(&data).is_ok());

        remove_color_profile(&mut data).unwrap();
        assert!(!has_color_profile(&data).unwrap());
    }

    #[test]
    fn test_exif_roundtrip() {
        let mut data = minimal_png();
        assert!(!has_exif_data(&data).unwrap());

        let exif = ExifData::new(ExifBuilder::new().ascii(0x010F, "Nikon").build()).unwrap();
        set_exif_data(&mut data, &exif).unwrap();

        assert!(has_exif_data(&data).unwrap());
        let restored = get_exif_data(&data).unwrap().unwrap();
        assert_eq!(restored.tags(), exif.tags());

        remove_exif_data(&mut data).unwrap();
        assert!(!has_exif_data(&data).unwrap());
    }
}
