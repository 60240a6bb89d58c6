// src/exif.rs
//
// ExifData: a parsed EXIF blob with tolerant derived accessors. The raw
// bytes are kept verbatim so embedding the data into another image
// round-trips exactly.

pub mod datetime;
pub mod reader;
#[doc(hidden)]
pub mod testutil;

pub use datetime::ExifDateTime;
pub use reader::{ExifTag, ExifValue, ParsedValue};

use crate::error::Result;
use std::collections::BTreeMap;

/// Wraps a raw TIFF-style EXIF blob and its parsed tag map.
///
/// Immutable after construction. Derived accessors return `None` for
/// absent tags instead of failing; only structural damage to the blob
/// itself is an error.
#[derive(Debug, Clone, PartialEq)]
pub struct ExifData {
    data: Vec<u8>,
    tags: BTreeMap<String, ExifTag>,
}

impl ExifData {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let tags = reader::read(&data)?;
        Ok(Self { data, tags })
    }

    /// Raw EXIF bytes, exactly as found in the source image
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn tags(&self) -> &BTreeMap<String, ExifTag> {
        &self.tags
    }

    pub fn has(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn has_all(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.has(key))
    }

    /// Raw value of a tag
    pub fn raw(&self, key: &str) -> Option<&ExifValue> {
        self.tags.get(key).map(|tag| &tag.raw)
    }

    /// Parsed value of a tag, if the reader refined one
    pub fn parsed(&self, key: &str) -> Option<&ParsedValue> {
        self.tags.get(key).and_then(|tag| tag.parsed.as_ref())
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.parsed(key) {
            Some(ParsedValue::Text(text)) => Some(text.clone()),
            _ => match self.raw(key) {
                Some(ExifValue::Ascii(text)) => Some(text.clone()),
                _ => None,
            },
        }
    }

    fn decimal(&self, key: &str) -> Option<f64> {
        match self.parsed(key) {
            Some(ParsedValue::Decimal(value)) => Some(*value),
            _ => self.raw(key).and_then(ExifValue::to_decimal),
        }
    }

    fn integer(&self, key: &str) -> Option<u32> {
        self.raw(key).and_then(ExifValue::to_u32)
    }

    /// Whether the image carries geolocation data
    pub fn has_position_data(&self) -> bool {
        self.has_all(&["GPSLatitude", "GPSLongitude"])
    }

    /// The original capture date and time
    pub fn date_time_original(&self) -> Option<ExifDateTime> {
        match self.parsed("DateTimeOriginal") {
            Some(ParsedValue::DateTime(dt)) => Some(*dt),
            _ => None,
        }
    }

    /// Camera make and model, with the make de-duplicated out of the
    /// model string when present
    pub fn make_and_model(&self) -> Option<String> {
        let make = self.text("Make").unwrap_or_default();
        let model = self.text("Model").unwrap_or_default();

        if model.is_empty() {
            return (!make.is_empty()).then_some(make);
        }
        if make.is_empty() {
            return Some(model);
        }

        let prefix = format!("{make} ");
        let rest = model.strip_prefix(&prefix).unwrap_or(&model);
        Some(format!("{make} {rest}"))
    }

    pub fn lens_model(&self) -> Option<String> {
        self.text("LensModel")
            .filter(|text| !text.is_empty())
            .map(|text| text.replace("f/", "ƒ/"))
    }

    pub fn focal_length(&self) -> Option<String> {
        self.decimal("FocalLength")
            .map(|mm| format!("{} mm", format_decimal(mm)))
    }

    pub fn exposure_time(&self) -> Option<String> {
        self.text("ExposureTime").map(|time| format!("{time} s"))
    }

    pub fn aperture(&self) -> Option<String> {
        self.decimal("FNumber")
            .map(|f| format!("ƒ/{}", format_decimal(f)))
    }

    pub fn photographic_sensitivity(&self) -> Option<String> {
        self.integer("PhotographicSensitivity")
            .map(|iso| format!("ISO {iso}"))
    }

    pub fn exposure_compensation(&self) -> Option<String> {
        self.decimal("ExposureBiasValue")
            .filter(|&ev| ev != 0.0)
            .map(|ev| format!("{} EV", format_decimal((ev * 100.0).round() / 100.0)))
    }

    /// Shooting mode letter: P/A/S/M, or AUTO for everything else
    pub fn exposure_program(&self) -> &'static str {
        match self.integer("ExposureProgram").unwrap_or(0) {
            2 => "P",
            3 => "A",
            4 => "S",
            1 => "M",
            _ => "AUTO",
        }
    }

    pub fn has_auto_white_balance(&self) -> Option<bool> {
        self.integer("WhiteBalance").map(|wb| wb == 0)
    }

    pub fn has_flash_fired(&self) -> Option<bool> {
        self.integer("Flash").map(|flash| flash % 2 == 1)
    }

    /// Metering mode bucketed the way the panel displays it
    pub fn metering_mode(&self) -> Option<&'static str> {
        let mode = self.integer("MeteringMode")?;
        Some(match mode {
            0..=2 => "average",
            3 => "spot",
            4 | 5 => "evaluative",
            6 => "partial",
            _ => "average",
        })
    }

    pub fn color_space(&self) -> Option<String> {
        self.text("ColorSpace")
    }
}

/// Format a decimal without a trailing `.0`
fn format_decimal(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::ExifBuilder;
    use super::*;

    fn sample() -> ExifData {
        let blob = ExifBuilder::new()
            .ascii(0x010F, "Canon")
            .ascii(0x0110, "Canon EOS R5")
            .ascii(0x9003, "2023:07:14 10:30:05")
            .ascii(0x9291, "25")
            .ascii(0x9011, "+02:00")
            .rational(0x829A, 1, 250)
            .rational(0x829D, 28, 10)
            .rational(0x920A, 50, 1)
            .short(0x8822, 3)
            .short(0x8827, 400)
            .short(0x9209, 1)
            .short(0xA403, 0)
            .short(0x9207, 5)
            .short(0xA001, 1)
            .build();
        ExifData::new(blob).unwrap()
    }

    #[test]
    fn test_make_and_model_deduplicates() {
        assert_eq!(sample().make_and_model().unwrap(), "Canon EOS R5");
    }

    #[test]
    fn test_derived_accessors() {
        let exif = sample();
        assert_eq!(exif.exposure_time().unwrap(), "1/250 s");
        assert_eq!(exif.aperture().unwrap(), "ƒ/2.8");
        assert_eq!(exif.focal_length().unwrap(), "50 mm");
        assert_eq!(exif.photographic_sensitivity().unwrap(), "ISO 400");
        assert_eq!(exif.exposure_program(), "A");
        assert_eq!(exif.has_auto_white_balance(), Some(true));
        assert_eq!(exif.has_flash_fired(), Some(true));
        assert_eq!(exif.metering_mode(), Some("evaluative"));
        assert_eq!(exif.color_space().unwrap(), "sRGB");
    }

    #[test]
    fn test_date_time_original_composite() {
        let dt = sample().date_time_original().unwrap();
        assert_eq!(dt.to_string(), "2023:07:14 10:30:05.250000+02:00");
    }

    #[test]
    fn test_absent_tags_return_none() {
        let exif = ExifData::new(ExifBuilder::new().short(0x0112, 1).build()).unwrap();
        assert!(exif.aperture().is_none());
        assert!(exif.lens_model().is_none());
        assert!(exif.date_time_original().is_none());
        assert!(!exif.has_position_data());
        assert_eq!(exif.exposure_program(), "AUTO");
    }

    #[test]
    fn test_raw_bytes_preserved() {
        let blob = ExifBuilder::new().ascii(0x010F, "Canon").build();
        let exif = ExifData::new(blob.clone()).unwrap();
        assert_eq!(exif.data(), blob.as_slice());
    }
}
