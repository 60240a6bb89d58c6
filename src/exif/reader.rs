// src/exif/reader.rs
//
// TIFF/IFD parser for EXIF blobs. Walks the IFD chain from the byte-order
// marker, follows the ExifIFD and GPS pointer tags, and resolves tag ids
// to names. Every offset is bounds-checked; cyclic IFD pointers are a
// decode error, not a hang.

use crate::error::{ImagemillError, Result};
use crate::exif::datetime::ExifDateTime;
use std::collections::{BTreeMap, BTreeSet};

const EXIF_IFD_POINTER: u16 = 0x8769;
const GPS_IFD_POINTER: u16 = 0x8825;

/// Raw tag value, one variant per TIFF field type.
#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    SByte(Vec<i8>),
    Undefined(Vec<u8>),
    SShort(Vec<i16>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl ExifValue {
    /// First element as a decimal, for the numeric single-value tags.
    pub fn to_decimal(&self) -> Option<f64> {
        match self {
            ExifValue::Byte(v) => v.first().map(|&n| n as f64),
            ExifValue::Short(v) => v.first().map(|&n| n as f64),
            ExifValue::Long(v) => v.first().map(|&n| n as f64),
            ExifValue::Rational(v) => v
                .first()
                .and_then(|&(n, d)| (d != 0).then(|| n as f64 / d as f64)),
            ExifValue::SByte(v) => v.first().map(|&n| n as f64),
            ExifValue::SShort(v) => v.first().map(|&n| n as f64),
            ExifValue::SLong(v) => v.first().map(|&n| n as f64),
            ExifValue::SRational(v) => v
                .first()
                .and_then(|&(n, d)| (d != 0).then(|| n as f64 / d as f64)),
            ExifValue::Float(v) => v.first().map(|&n| n as f64),
            ExifValue::Double(v) => v.first().copied(),
            ExifValue::Ascii(_) | ExifValue::Undefined(_) => None,
        }
    }

    /// First element as an integer, for enumerated tags.
    pub fn to_u32(&self) -> Option<u32> {
        match self {
            ExifValue::Byte(v) => v.first().map(|&n| n as u32),
            ExifValue::Short(v) => v.first().map(|&n| n as u32),
            ExifValue::Long(v) => v.first().copied(),
            _ => None,
        }
    }
}

/// Refined value derived from a raw one.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Text(String),
    Decimal(f64),
    DateTime(ExifDateTime),
}

/// A tag as stored in [`crate::exif::ExifData`]: the raw decoded value
/// plus an optional refined interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifTag {
    pub raw: ExifValue,
    pub parsed: Option<ParsedValue>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum IfdKind {
    Primary,
    Gps,
}

struct Reader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    fn bytes(&self, offset: usize, count: usize) -> Result<&'a [u8]> {
        let end = offset
            .checked_add(count)
            .ok_or_else(|| ImagemillError::decode_failed("EXIF offset overflow"))?;
        if end > self.data.len() {
            return Err(ImagemillError::truncated_data(offset, end - self.data.len()));
        }
        Ok(&self.data[offset..end])
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.bytes(offset, 2)?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.bytes(offset, 4)?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.u32_at(offset)? as i32)
    }
}

fn type_size(field_type: u16) -> Result<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Ok(1),
        3 | 8 => Ok(2),
        4 | 9 | 11 => Ok(4),
        5 | 10 | 12 => Ok(8),
        other => Err(ImagemillError::unexpected_value(format!(
            "unexpected EXIF tag type {other}"
        ))),
    }
}

fn decode_value(
    reader: &Reader<'_>,
    field_type: u16,
    count: usize,
    offset: usize,
) -> Result<ExifValue> {
    let value = match field_type {
        1 => ExifValue::Byte(reader.bytes(offset, count)?.to_vec()),
        2 => {
            let raw = reader.bytes(offset, count)?;
            let text = raw
                .split(|&b| b == 0)
                .next()
                .unwrap_or(&[])
                .iter()
                .map(|&b| b as char)
                .collect::<String>();
            ExifValue::Ascii(text)
        }
        3 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(reader.u16_at(offset + i * 2)?);
            }
            ExifValue::Short(values)
        }
        4 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(reader.u32_at(offset + i * 4)?);
            }
            ExifValue::Long(values)
        }
        5 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push((
                    reader.u32_at(offset + i * 8)?,
                    reader.u32_at(offset + i * 8 + 4)?,
                ));
            }
            ExifValue::Rational(values)
        }
        6 => ExifValue::SByte(
            reader
                .bytes(offset, count)?
                .iter()
                .map(|&b| b as i8)
                .collect(),
        ),
        7 => ExifValue::Undefined(reader.bytes(offset, count)?.to_vec()),
        8 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(reader.u16_at(offset + i * 2)? as i16);
            }
            ExifValue::SShort(values)
        }
        9 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(reader.i32_at(offset + i * 4)?);
            }
            ExifValue::SLong(values)
        }
        10 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push((
                    reader.i32_at(offset + i * 8)?,
                    reader.i32_at(offset + i * 8 + 4)?,
                ));
            }
            ExifValue::SRational(values)
        }
        11 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                values.push(f32::from_bits(reader.u32_at(offset + i * 4)?));
            }
            ExifValue::Float(values)
        }
        12 => {
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                let high = reader.u32_at(offset + i * 8)? as u64;
                let low = reader.u32_at(offset + i * 8 + 4)? as u64;
                let bits = match reader.order {
                    ByteOrder::Little => (low << 32) | high,
                    ByteOrder::Big => (high << 32) | low,
                };
                values.push(f64::from_bits(bits));
            }
            ExifValue::Double(values)
        }
        other => {
            return Err(ImagemillError::unexpected_value(format!(
                "unexpected EXIF tag type {other}"
            )))
        }
    };
    Ok(value)
}

fn tag_name(kind: IfdKind, id: u16) -> Option<&'static str> {
    let name = match kind {
        IfdKind::Gps => match id {
            0x0000 => "GPSVersionID",
            0x0001 => "GPSLatitudeRef",
            0x0002 => "GPSLatitude",
            0x0003 => "GPSLongitudeRef",
            0x0004 => "GPSLongitude",
            0x0005 => "GPSAltitudeRef",
            0x0006 => "GPSAltitude",
            0x0007 => "GPSTimeStamp",
            0x001D => "GPSDateStamp",
            _ => return None,
        },
        IfdKind::Primary => match id {
            0x0100 => "ImageWidth",
            0x0101 => "ImageLength",
            0x010E => "ImageDescription",
            0x010F => "Make",
            0x0110 => "Model",
            0x0112 => "Orientation",
            0x011A => "XResolution",
            0x011B => "YResolution",
            0x0128 => "ResolutionUnit",
            0x0131 => "Software",
            0x0132 => "DateTime",
            0x013B => "Artist",
            0x8298 => "Copyright",
            0x829A => "ExposureTime",
            0x829D => "FNumber",
            0x8822 => "ExposureProgram",
            0x8827 => "PhotographicSensitivity",
            0x9000 => "ExifVersion",
            0x9003 => "DateTimeOriginal",
            0x9004 => "DateTimeDigitized",
            0x9010 => "OffsetTime",
            0x9011 => "OffsetTimeOriginal",
            0x9012 => "OffsetTimeDigitized",
            0x9201 => "ShutterSpeedValue",
            0x9202 => "ApertureValue",
            0x9203 => "BrightnessValue",
            0x9204 => "ExposureBiasValue",
            0x9205 => "MaxApertureValue",
            0x9207 => "MeteringMode",
            0x9208 => "LightSource",
            0x9209 => "Flash",
            0x920A => "FocalLength",
            0x9290 => "SubSecTime",
            0x9291 => "SubSecTimeOriginal",
            0x9292 => "SubSecTimeDigitized",
            0xA001 => "ColorSpace",
            0xA002 => "PixelXDimension",
            0xA003 => "PixelYDimension",
            0xA403 => "WhiteBalance",
            0xA405 => "FocalLengthIn35mmFilm",
            0xA420 => "ImageUniqueID",
            0xA432 => "LensSpecification",
            0xA433 => "LensMake",
            0xA434 => "LensModel",
            _ => return None,
        },
    };
    Some(name)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Per-tag refinement of the raw value. Returns `None` for tags that have
/// no interpretation beyond the raw decoding.
fn parse_value(name: &str, raw: &ExifValue) -> Option<ParsedValue> {
    match name {
        // exposure time reads better as a reduced fraction than a decimal
        "ExposureTime" => {
            if let ExifValue::Rational(values) = raw {
                let &(n, d) = values.first()?;
                if d == 0 {
                    return None;
                }
                let g = gcd(n, d);
                return Some(ParsedValue::Text(format!("{}/{}", n / g, d / g)));
            }
            None
        }
        "FNumber" | "FocalLength" | "ApertureValue" | "MaxApertureValue"
        | "ShutterSpeedValue" | "BrightnessValue" | "ExposureBiasValue" | "GPSAltitude" => {
            raw.to_decimal().map(ParsedValue::Decimal)
        }
        "ColorSpace" => match raw.to_u32()? {
            1 => Some(ParsedValue::Text("sRGB".to_string())),
            0xFFFF => Some(ParsedValue::Text("Uncalibrated".to_string())),
            _ => None,
        },
        _ => match raw {
            ExifValue::Ascii(text) => {
                let trimmed = text.trim_end_matches([' ', '\0']);
                Some(ParsedValue::Text(trimmed.to_string()))
            }
            _ => None,
        },
    }
}

/// Parse a TIFF-style EXIF blob into a tag map.
pub fn read(data: &[u8]) -> Result<BTreeMap<String, ExifTag>> {
    if data.len() < 8 {
        return Err(ImagemillError::truncated_data(0, 8 - data.len()));
    }

    let order = match &data[0..2] {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => {
            return Err(ImagemillError::decode_failed(
                "invalid EXIF byte-order marker",
            ))
        }
    };
    let reader = Reader { data, order };

    if reader.u16_at(2)? != 42 {
        return Err(ImagemillError::decode_failed("invalid TIFF magic number"));
    }

    let mut tags = BTreeMap::new();
    let mut sub_ifds: Vec<(IfdKind, u32)> = Vec::new();
    let mut visited = BTreeSet::new();

    // IFD0 chain
    let mut next = reader.u32_at(4)?;
    while next != 0 {
        if !visited.insert(next) {
            return Err(ImagemillError::decode_failed("cyclic IFD chain"));
        }
        next = read_ifd(&reader, next as usize, IfdKind::Primary, &mut tags, &mut sub_ifds)?;
    }

    // ExifIFD / GPS sub-directories discovered above
    while let Some((kind, offset)) = sub_ifds.pop() {
        if !visited.insert(offset) {
            return Err(ImagemillError::decode_failed("cyclic IFD chain"));
        }
        read_ifd(&reader, offset as usize, kind, &mut tags, &mut sub_ifds)?;
    }

    resolve_date_time(&mut tags);

    Ok(tags)
}

fn read_ifd(
    reader: &Reader<'_>,
    offset: usize,
    kind: IfdKind,
    tags: &mut BTreeMap<String, ExifTag>,
    sub_ifds: &mut Vec<(IfdKind, u32)>,
) -> Result<u32> {
    let count = reader.u16_at(offset)? as usize;
    let entries_start = offset + 2;

    for i in 0..count {
        let entry = entries_start + i * 12;
        let tag_id = reader.u16_at(entry)?;
        let field_type = reader.u16_at(entry + 2)?;
        let value_count = reader.u32_at(entry + 4)? as usize;

        if kind == IfdKind::Primary && (tag_id == EXIF_IFD_POINTER || tag_id == GPS_IFD_POINTER) {
            let pointer = reader.u32_at(entry + 8)?;
            let sub_kind = if tag_id == GPS_IFD_POINTER {
                IfdKind::Gps
            } else {
                IfdKind::Primary
            };
            if pointer != 0 {
                sub_ifds.push((sub_kind, pointer));
            }
            continue;
        }

        let unit = type_size(field_type)?;
        let total = unit
            .checked_mul(value_count)
            .ok_or_else(|| ImagemillError::decode_failed("EXIF value size overflow"))?;

        // values up to 4 bytes are stored inline in the entry
        let value_offset = if total <= 4 {
            entry + 8
        } else {
            reader.u32_at(entry + 8)? as usize
        };

        let raw = decode_value(reader, field_type, value_count, value_offset)?;
        let name = tag_name(kind, tag_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Tag0x{tag_id:04X}"));
        let parsed = parse_value(&name, &raw);

        // the primary chain wins over thumbnail IFD duplicates
        tags.entry(name).or_insert(ExifTag { raw, parsed });
    }

    reader.u32_at(entries_start + count * 12)
}

/// Combine DateTimeOriginal with its subsecond and offset side-tags into
/// one structured value.
fn resolve_date_time(tags: &mut BTreeMap<String, ExifTag>) {
    let datetime = match tags.get("DateTimeOriginal") {
        Some(ExifTag {
            raw: ExifValue::Ascii(text),
            ..
        }) => text.clone(),
        _ => return,
    };

    let side_tag = |tags: &BTreeMap<String, ExifTag>, name: &str| -> Option<String> {
        match tags.get(name) {
            Some(ExifTag {
                raw: ExifValue::Ascii(text),
                ..
            }) => Some(text.clone()),
            _ => None,
        }
    };
    let subseconds = side_tag(tags, "SubSecTimeOriginal");
    let offset = side_tag(tags, "OffsetTimeOriginal");

    if let Ok(resolved) =
        ExifDateTime::from_exif(&datetime, subseconds.as_deref(), offset.as_deref())
    {
        if let Some(tag) = tags.get_mut("DateTimeOriginal") {
            tag.parsed = Some(ParsedValue::DateTime(resolved));
        }
    }
}
