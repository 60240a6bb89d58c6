// src/icc.rs
//
// ICC color profile reader. Parses the fixed-layout 128-byte header and
// the tag table, and exposes the handful of fields the panel displays.
// The raw blob is kept verbatim so embedding and exporting round-trip.

use crate::error::{ImagemillError, Result};
use crate::info::ColorSpace;
use std::collections::BTreeMap;
use std::path::Path;

/// File signature for ICC profiles
const PROFILE_SIGNATURE: &[u8] = b"acsp";

/// Offset of the profile signature within the header
const PROFILE_SIGNATURE_OFFSET: usize = 36;

/// Offset of the tag table (right after the 128-byte header)
const TAG_TABLE_OFFSET: usize = 128;

/// Profile/device class, decoded from the 4-byte tag at offset 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Input,
    Display,
    Output,
    Link,
    ColorSpace,
    AbstractProfile,
    NamedColor,
}

/// Rendering intent, decoded from the u32 at offset 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderingIntent {
    Perceptual,
    MediaRelative,
    Saturation,
    IccAbsolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TagEntry {
    offset: u32,
    length: u32,
}

/// An ICC color profile.
///
/// Construction fails unless the `acsp` signature sits at byte offset 36
/// and the tag table fits inside the blob. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorProfile {
    data: Vec<u8>,
    tags: BTreeMap<String, TagEntry>,
}

impl ColorProfile {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() < TAG_TABLE_OFFSET + 4
            || &data[PROFILE_SIGNATURE_OFFSET..PROFILE_SIGNATURE_OFFSET + 4] != PROFILE_SIGNATURE
        {
            return Err(ImagemillError::decode_failed("invalid ICC profile data"));
        }

        let tags = Self::read_tags(&data)?;
        Ok(Self { data, tags })
    }

    /// Create a ColorProfile instance from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            ImagemillError::file_read_failed(path.to_string_lossy().into_owned(), e)
        })?;
        Self::new(data)
    }

    /// Export the raw profile to a file
    pub fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.data).map_err(|e| {
            ImagemillError::file_write_failed(path.to_string_lossy().into_owned(), e)
        })
    }

    /// Raw ICC bytes, exactly as found in the source
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Profile description (`desc` tag)
    pub fn name(&self) -> String {
        self.tag_value("desc").unwrap_or_default()
    }

    /// Copyright string (`cprt` tag)
    pub fn copyright(&self) -> String {
        self.tag_value("cprt").unwrap_or_default()
    }

    /// Profile version as `major.minor.patch`
    pub fn profile_version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.data[8],
            (self.data[9] & 0xF0) >> 4,
            self.data[9] & 0x0F
        )
    }

    pub fn device_class(&self) -> Result<DeviceClass> {
        match &self.data[12..16] {
            b"scnr" => Ok(DeviceClass::Input),
            b"mntr" => Ok(DeviceClass::Display),
            b"prtr" => Ok(DeviceClass::Output),
            b"link" => Ok(DeviceClass::Link),
            b"spac" => Ok(DeviceClass::ColorSpace),
            b"abst" => Ok(DeviceClass::AbstractProfile),
            b"nmcl" => Ok(DeviceClass::NamedColor),
            _ => Err(ImagemillError::unexpected_value("unexpected device class")),
        }
    }

    pub fn color_space(&self) -> Result<ColorSpace> {
        let raw = &self.data[16..20];
        let trimmed: Vec<u8> = raw
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        match trimmed.as_slice() {
            b"XYZ" => Ok(ColorSpace::Xyz),
            b"Lab" => Ok(ColorSpace::Lab),
            b"Luv" => Ok(ColorSpace::Luv),
            b"YCbr" => Ok(ColorSpace::YCbCr),
            b"Yxy" => Ok(ColorSpace::Xyy),
            b"RGB" => Ok(ColorSpace::Rgb),
            b"GRAY" => Ok(ColorSpace::Grayscale),
            b"HSV" => Ok(ColorSpace::Hsv),
            b"HLS" => Ok(ColorSpace::Hls),
            b"CMYK" => Ok(ColorSpace::Cmyk),
            b"CMY" => Ok(ColorSpace::Cmy),
            b"2CLR" | b"3CLR" | b"4CLR" | b"5CLR" | b"6CLR" | b"7CLR" | b"8CLR" | b"9CLR"
            | b"ACLR" | b"BCLR" | b"CCLR" | b"DCLR" | b"ECLR" | b"FCLR" => Ok(ColorSpace::Palette),
            _ => Err(ImagemillError::unexpected_value("unexpected color space")),
        }
    }

    /// Profile connection space field (offset 20)
    pub fn connection_space(&self) -> String {
        String::from_utf8_lossy(&self.data[20..24]).trim().to_string()
    }

    /// Primary platform field (offset 40)
    pub fn primary_platform(&self) -> String {
        String::from_utf8_lossy(&self.data[40..44]).into_owned()
    }

    pub fn rendering_intent(&self) -> Result<RenderingIntent> {
        let raw = u32::from_be_bytes([self.data[64], self.data[65], self.data[66], self.data[67]]);
        match raw {
            0 => Ok(RenderingIntent::Perceptual),
            1 => Ok(RenderingIntent::MediaRelative),
            3 => Ok(RenderingIntent::Saturation),
            4 => Ok(RenderingIntent::IccAbsolute),
            _ => Err(ImagemillError::unexpected_value(
                "unexpected rendering intent",
            )),
        }
    }

    fn read_tags(data: &[u8]) -> Result<BTreeMap<String, TagEntry>> {
        let count = u32::from_be_bytes([
            data[TAG_TABLE_OFFSET],
            data[TAG_TABLE_OFFSET + 1],
            data[TAG_TABLE_OFFSET + 2],
            data[TAG_TABLE_OFFSET + 3],
        ]) as usize;

        let mut tags = BTreeMap::new();
        let mut position = TAG_TABLE_OFFSET + 4;

        for _ in 0..count {
            if position + 12 > data.len() {
                return Err(ImagemillError::truncated_data(
                    position,
                    position + 12 - data.len(),
                ));
            }
            let sig: String = data[position..position + 4]
                .iter()
                .take_while(|&&b| b != 0)
                .map(|&b| b as char)
                .collect();
            let offset = u32::from_be_bytes([
                data[position + 4],
                data[position + 5],
                data[position + 6],
                data[position + 7],
            ]);
            let length = u32::from_be_bytes([
                data[position + 8],
                data[position + 9],
                data[position + 10],
                data[position + 11],
            ]);
            tags.insert(sig, TagEntry { offset, length });
            position += 12;
        }

        Ok(tags)
    }

    /// Decode a tag's value for the text-bearing tag types
    /// (`text`, `desc`, `mluc`).
    fn tag_value(&self, name: &str) -> Option<String> {
        let entry = self.tags.get(name)?;
        let start = entry.offset as usize;
        let end = start.checked_add(entry.length as usize)?;
        if end > self.data.len() || entry.length < 8 {
            return None;
        }
        let value = &self.data[start..end];

        match &value[0..4] {
            b"text" => {
                let text: String = value[8..]
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                Some(text)
            }
            b"desc" => {
                if value.len() < 12 {
                    return None;
                }
                let text: String = value[12..]
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect();
                Some(text)
            }
            b"mluc" => self.parse_mluc(value),
            _ => None,
        }
    }

    /// First record of a multi-lingual Unicode string tag (UTF-16BE).
    fn parse_mluc(&self, value: &[u8]) -> Option<String> {
        if value.len() < 16 {
            return None;
        }
        let records = u32::from_be_bytes([value[8], value[9], value[10], value[11]]);
        if records == 0 {
            return None;
        }

        // first record: 4-byte language code, then length and offset
        let length = u32::from_be_bytes([value[20], value[21], value[22], value[23]]) as usize;
        let offset = u32::from_be_bytes([value[24], value[25], value[26], value[27]]) as usize;
        let end = offset.checked_add(length)?;
        if value.len() < 28 || end > value.len() || length % 2 != 0 {
            return None;
        }

        let units: Vec<u16> = value[offset..end]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        let text: String = char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        Some(text)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    /// Build a minimal structurally valid ICC profile with a `desc` tag.
    pub fn minimal_profile(description: &str) -> Vec<u8> {
        let desc_text: Vec<u8> = description.bytes().chain(std::iter::once(0)).collect();
        let desc_tag_len = 12 + desc_text.len();

        let mut profile = vec![0u8; 128];
        profile[8] = 4; // version 4.0.0
        profile[12..16].copy_from_slice(b"mntr");
        profile[16..20].copy_from_slice(b"RGB ");
        profile[20..24].copy_from_slice(b"XYZ ");
        profile[36..40].copy_from_slice(b"acsp");
        profile[40..44].copy_from_slice(b"APPL");
        // rendering intent 0 (perceptual) already zeroed

        // tag table: one desc tag
        profile.extend_from_slice(&1u32.to_be_bytes());
        let data_offset = 128 + 4 + 12;
        profile.extend_from_slice(b"desc");
        profile.extend_from_slice(&(data_offset as u32).to_be_bytes());
        profile.extend_from_slice(&(desc_tag_len as u32).to_be_bytes());

        profile.extend_from_slice(b"desc");
        profile.extend_from_slice(&[0u8; 4]);
        profile.extend_from_slice(&(desc_text.len() as u32).to_be_bytes());
        profile.extend_from_slice(&desc_text);

        let size = profile.len() as u32;
        profile[0..4].copy_from_slice(&size.to_be_bytes());
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_check() {
        let mut data = vec![0u8; 200];
        assert!(ColorProfile::new(data.clone()).is_err());

        data[36..40].copy_from_slice(b"acsp");
        // valid signature + empty tag table parses
        assert!(ColorProfile::new(data).is_ok());
    }

    #[test]
    fn test_signature_elsewhere_rejected() {
        // `acsp` present but not at offset 36
        let mut data = vec![0u8; 200];
        data[40..44].copy_from_slice(b"acsp");
        assert!(ColorProfile::new(data).is_err());
    }

    #[test]
    fn test_minimal_profile_fields() {
        let profile = ColorProfile::new(testutil::minimal_profile("Test RGB")).unwrap();
        assert_eq!(profile.name(), "Test RGB");
        assert_eq!(profile.device_class().unwrap(), DeviceClass::Display);
        assert_eq!(profile.color_space().unwrap(), ColorSpace::Rgb);
        assert_eq!(profile.connection_space(), "XYZ");
        assert_eq!(profile.primary_platform(), "APPL");
        assert_eq!(
            profile.rendering_intent().unwrap(),
            RenderingIntent::Perceptual
        );
        assert_eq!(profile.profile_version(), "4.0.0");
        assert_eq!(profile.copyright(), "");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("profile.icc");
        let copy = dir.path().join("copy.icc");

        let original = testutil::minimal_profile("Round Trip");
        std::fs::write(&source, &original).unwrap();

        let profile = ColorProfile::from_file(&source).unwrap();
        profile.export(&copy).unwrap();

        assert_eq!(std::fs::read(&copy).unwrap(), original);
    }

    #[test]
    fn test_truncated_tag_table() {
        let mut data = vec![0u8; 133];
        data[36..40].copy_from_slice(b"acsp");
        data[128..132].copy_from_slice(&5u32.to_be_bytes()); // claims 5 tags
        assert!(ColorProfile::new(data).is_err());
    }
}
