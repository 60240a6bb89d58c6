// src/handler.rs
//
// Format handlers: one closed Format enum with a match dispatch table
// (exhaustiveness-checked at compile time), a bitflags capability table
// per format, and the Handler type orchestrating
// decode -> metadata capture -> rasterize -> transforms -> re-encode.

pub mod gif;
pub mod jpeg;
pub mod png;
pub mod svg;
pub mod webp;

use crate::codec;
use crate::error::{ImagemillError, Result};
use crate::exif::ExifData;
use crate::icc::ColorProfile;
use crate::info::ImageInfo;
use crate::options::ImageOptions;
use crate::transform::TransformCollection;
use bitflags::bitflags;
use image::RgbaImage;
use std::io::Write;
use std::path::Path;
use tracing::debug;

bitflags! {
    /// What a format can hold or undergo.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        const TRANSFORMS    = 1 << 0;
        const COLOR_PROFILE = 1 << 1;
        const EXIF_DATA     = 1 << 2;
        const ANIMATION     = 1 << 3;
    }
}

/// Supported image formats. A closed enum instead of runtime type
/// lookup, so adding a format forces every dispatch site to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Jpeg,
    Png,
    Gif,
    Webp,
    Svg,
}

impl Format {
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime {
            "image/jpeg" => Ok(Format::Jpeg),
            "image/png" => Ok(Format::Png),
            "image/gif" => Ok(Format::Gif),
            "image/webp" => Ok(Format::Webp),
            "image/svg+xml" => Ok(Format::Svg),
            other => Err(ImagemillError::unsupported_format(other.to_string())),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Jpeg => "image/jpeg",
            Format::Png => "image/png",
            Format::Gif => "image/gif",
            Format::Webp => "image/webp",
            Format::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::Webp => "webp",
            Format::Svg => "svg",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Format::Jpeg => {
                Capabilities::TRANSFORMS | Capabilities::COLOR_PROFILE | Capabilities::EXIF_DATA
            }
            Format::Png => {
                Capabilities::TRANSFORMS
                    | Capabilities::COLOR_PROFILE
                    | Capabilities::EXIF_DATA
                    | Capabilities::ANIMATION
            }
            Format::Gif => Capabilities::TRANSFORMS | Capabilities::ANIMATION,
            Format::Webp => {
                Capabilities::TRANSFORMS
                    | Capabilities::COLOR_PROFILE
                    | Capabilities::EXIF_DATA
                    | Capabilities::ANIMATION
            }
            Format::Svg => Capabilities::empty(),
        }
    }

    pub fn supports_color_profile(&self) -> bool {
        self.capabilities().contains(Capabilities::COLOR_PROFILE)
    }

    pub fn supports_exif_data(&self) -> bool {
        self.capabilities().contains(Capabilities::EXIF_DATA)
    }

    /// Detect a format from magic bytes (and a loose sniff for SVG,
    /// which has none).
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8]) {
            return Some(Format::Jpeg);
        }
        if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(Format::Png);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Format::Gif);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(Format::Webp);
        }
        let head = &data[..data.len().min(1024)];
        if let Ok(text) = std::str::from_utf8(head) {
            if text.contains("<svg") {
                return Some(Format::Svg);
            }
        }
        None
    }
}

/// A format handler bound to one byte buffer.
///
/// One-shot: `process()` consumes nothing but returns a fresh handler
/// holding the re-encoded output; the original's buffer is untouched.
/// Metadata setters mutate the buffer in place through the per-format
/// segment/chunk protocols.
#[derive(Debug, Clone)]
pub struct Handler {
    format: Format,
    data: Vec<u8>,
    options: ImageOptions,
}

impl Handler {
    pub fn new(format: Format, data: Vec<u8>, options: ImageOptions) -> Self {
        Self {
            format,
            data,
            options,
        }
    }

    /// Detect the format from the buffer's magic bytes.
    pub fn from_bytes(data: Vec<u8>, options: ImageOptions) -> Result<Self> {
        let format = Format::detect(&data)
            .ok_or_else(|| ImagemillError::unsupported_format("unknown"))?;
        Ok(Self::new(format, data, options))
    }

    /// Encode a raster into a new handler of the given format.
    pub fn from_raster(format: Format, raster: &RgbaImage, options: ImageOptions) -> Result<Self> {
        let data = codec::encode(format, raster, &options)?;
        Ok(Self::new(format, data, options))
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }

    /// Write the buffer out atomically: encode to a temp file in the
    /// target directory, then rename into place. A failed write never
    /// leaves a truncated file at the destination.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let display = || path.to_string_lossy().into_owned();

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| ImagemillError::file_write_failed(display(), e))?;
        temp.write_all(&self.data)
            .map_err(|e| ImagemillError::file_write_failed(display(), e))?;
        temp.persist(path)
            .map_err(|e| ImagemillError::file_write_failed(display(), e.error))?;
        Ok(())
    }

    pub fn info(&self) -> Result<ImageInfo> {
        match self.format {
            Format::Jpeg => jpeg::info(&self.data),
            Format::Png => png::info(&self.data),
            Format::Gif => gif::info(&self.data),
            Format::Webp => webp::info(&self.data),
            Format::Svg => svg::info(&self.data),
        }
    }

    /// Whether transforms can run against this image: the format must be
    /// rasterizable and the image must not be animated (transforming a
    /// single frame would drop the rest).
    pub fn supports_transforms(&self) -> Result<bool> {
        if !self.format.capabilities().contains(Capabilities::TRANSFORMS) {
            return Ok(false);
        }
        if self.format.capabilities().contains(Capabilities::ANIMATION) {
            return Ok(!self.info()?.is_animation());
        }
        Ok(true)
    }

    pub fn has_color_profile(&self) -> Result<bool> {
        match self.format {
            Format::Jpeg => jpeg::has_color_profile(&self.data),
            Format::Png => png::has_color_profile(&self.data),
            Format::Webp => webp::has_color_profile(&self.data),
            Format::Gif | Format::Svg => Ok(false),
        }
    }

    pub fn color_profile(&self) -> Result<Option<ColorProfile>> {
        match self.format {
            Format::Jpeg => jpeg::get_color_profile(&self.data),
            Format::Png => png::get_color_profile(&self.data),
            Format::Webp => webp::get_color_profile(&self.data),
            Format::Gif | Format::Svg => Err(self.feature_error("color profiles")),
        }
    }

    pub fn set_color_profile(&mut self, profile: &ColorProfile) -> Result<()> {
        match self.format {
            Format::Jpeg => jpeg::set_color_profile(&mut self.data, profile),
            Format::Png => png::set_color_profile(&mut self.data, profile),
            Format::Webp => webp::set_color_profile(&mut self.data, profile),
            Format::Gif | Format::Svg => Err(self.feature_error("color profiles")),
        }
    }

    pub fn remove_color_profile(&mut self) -> Result<()> {
        match self.format {
            Format::Jpeg => jpeg::remove_color_profile(&mut self.data),
            Format::Png => png::remove_color_profile(&mut self.data),
            Format::Webp => webp::remove_color_profile(&mut self.data),
            Format::Gif | Format::Svg => Err(self.feature_error("color profiles")),
        }
    }

    pub fn has_exif_data(&self) -> Result<bool> {
        match self.format {
            Format::Jpeg => jpeg::has_exif_data(&self.data),
            Format::Png => png::has_exif_data(&self.data),
            Format::Webp => webp::has_exif_data(&self.data),
            Format::Gif | Format::Svg => Ok(false),
        }
    }

    pub fn exif_data(&self) -> Result<Option<ExifData>> {
        match self.format {
            Format::Jpeg => jpeg::get_exif_data(&self.data),
            Format::Png => png::get_exif_data(&self.data),
            Format::Webp => webp::get_exif_data(&self.data),
            Format::Gif | Format::Svg => Err(self.feature_error("EXIF data")),
        }
    }

    pub fn set_exif_data(&mut self, exif: &ExifData) -> Result<()> {
        match self.format {
            Format::Jpeg => jpeg::set_exif_data(&mut self.data, exif),
            Format::Png => png::set_exif_data(&mut self.data, exif),
            Format::Webp => webp::set_exif_data(&mut self.data, exif),
            Format::Gif | Format::Svg => Err(self.feature_error("EXIF data")),
        }
    }

    pub fn remove_exif_data(&mut self) -> Result<()> {
        match self.format {
            Format::Jpeg => jpeg::remove_exif_data(&mut self.data),
            Format::Png => png::remove_exif_data(&mut self.data),
            Format::Webp => webp::remove_exif_data(&mut self.data),
            Format::Gif | Format::Svg => Err(self.feature_error("EXIF data")),
        }
    }

    fn feature_error(&self, feature: &'static str) -> ImagemillError {
        ImagemillError::unsupported_feature(self.format.mime_type(), feature)
    }

    /// Run the full pipeline: capture metadata, rasterize, apply the
    /// transform chain, re-encode as `target`, re-attach metadata.
    ///
    /// `transforms: None` with the same target format is a no-op
    /// returning a copy of this handler. `transforms: Some(..)` always
    /// re-encodes, even when the collection is empty.
    pub fn process(
        &self,
        transforms: Option<&TransformCollection>,
        target: Option<Format>,
    ) -> Result<Handler> {
        let target = target.unwrap_or(self.format);

        if !self.supports_transforms()? {
            let no_transforms = transforms.map_or(true, TransformCollection::is_empty);
            // a transform-incapable source can still be copied as-is
            if no_transforms && target == self.format {
                return Ok(self.clone());
            }
            if no_transforms {
                return Err(ImagemillError::unsupported_conversion(
                    self.format.mime_type(),
                    target.mime_type(),
                ));
            }
            return Err(ImagemillError::transforms_unsupported(
                self.format.mime_type(),
            ));
        }

        if target == self.format && transforms.is_none() {
            return Ok(self.clone());
        }

        // the pre-transform info is captured once; transforms see it
        // unchanged no matter where they sit in the chain
        let info = self.info()?;

        let color_profile = if self.options.preserve_color_profile
            && target.supports_color_profile()
            && self.has_color_profile()?
        {
            self.color_profile()?
        } else {
            None
        };

        let exif_data = if self.options.preserve_exif_data
            && target.supports_exif_data()
            && self.has_exif_data()?
        {
            self.exif_data()?
        } else {
            None
        };

        debug!(
            from = self.format.mime_type(),
            to = target.mime_type(),
            transforms = transforms.map_or(0, TransformCollection::len),
            keep_profile = color_profile.is_some(),
            keep_exif = exif_data.is_some(),
            "processing"
        );

        let mut raster = codec::rasterize(self.format, &self.data)?;

        if let Some(collection) = transforms {
            for transform in collection {
                raster = transform.apply(raster, &info)?;
            }
        }

        let mut instance = Handler::from_raster(target, &raster, self.options.clone())?;

        if let Some(profile) = color_profile {
            instance.set_color_profile(&profile)?;
        }
        if let Some(exif) = exif_data {
            instance.set_exif_data(&exif)?;
        }

        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;
    use image::{Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 3 % 256) as u8, (y * 3 % 256) as u8, 200, 255])
        })
    }

    fn jpeg_handler(width: u32, height: u32) -> Handler {
        Handler::from_raster(Format::Jpeg, &gradient(width, height), ImageOptions::default())
            .unwrap()
    }

    #[test]
    fn test_format_mime_roundtrip() {
        for format in [Format::Jpeg, Format::Png, Format::Gif, Format::Webp, Format::Svg] {
            assert_eq!(Format::from_mime(format.mime_type()).unwrap(), format);
        }
        assert!(Format::from_mime("image/tiff").is_err());
    }

    #[test]
    fn test_format_detect() {
        assert_eq!(Format::detect(&[0xFF, 0xD8, 0xFF]), Some(Format::Jpeg));
        assert_eq!(
            Format::detect(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Some(Format::Png)
        );
        assert_eq!(Format::detect(b"GIF89a"), Some(Format::Gif));
        assert_eq!(Format::detect(b"RIFF\x00\x00\x00\x00WEBP"), Some(Format::Webp));
        assert_eq!(Format::detect(b"<svg width=\"1\"/>"), Some(Format::Svg));
        assert_eq!(Format::detect(b"plain text"), None);
    }

    #[test]
    fn test_capability_table() {
        assert!(Format::Jpeg.supports_exif_data());
        assert!(!Format::Gif.supports_exif_data());
        assert!(!Format::Gif.supports_color_profile());
        assert!(!Format::Svg.capabilities().contains(Capabilities::TRANSFORMS));
        assert!(Format::Webp.capabilities().contains(Capabilities::ANIMATION));
    }

    #[test]
    fn test_process_same_format_no_transforms_is_noop() {
        let handler = jpeg_handler(10, 10);
        let processed = handler.process(None, None).unwrap();
        assert_eq!(processed.data(), handler.data());
    }

    #[test]
    fn test_process_applies_transforms() {
        let handler = jpeg_handler(100, 100);
        let mut transforms = TransformCollection::new();
        transforms.add(Transform::crop(0, 0, 40, 30).unwrap());

        let processed = handler.process(Some(&transforms), None).unwrap();
        let info = processed.info().unwrap();
        assert_eq!(info.width(), 40);
        assert_eq!(info.height(), 30);
        // the source buffer is untouched
        assert_eq!(handler.info().unwrap().width(), 100);
    }

    #[test]
    fn test_process_converts_format() {
        let handler = jpeg_handler(20, 20);
        let processed = handler.process(None, Some(Format::Webp)).unwrap();
        assert_eq!(processed.format(), Format::Webp);
        assert_eq!(processed.info().unwrap().mime_type(), "image/webp");
    }

    #[test]
    fn test_gif_metadata_capability_errors() {
        let handler =
            Handler::from_raster(Format::Gif, &gradient(5, 5), ImageOptions::default()).unwrap();
        assert!(!handler.has_exif_data().unwrap());
        assert!(matches!(
            handler.exif_data().unwrap_err(),
            ImagemillError::UnsupportedFeature { .. }
        ));
        assert!(matches!(
            handler.color_profile().unwrap_err(),
            ImagemillError::UnsupportedFeature { .. }
        ));
    }

    #[test]
    fn test_svg_transforms_rejected() {
        let svg = br#"<svg width="10" height="10"></svg>"#.to_vec();
        let handler = Handler::new(Format::Svg, svg, ImageOptions::default());
        assert!(!handler.supports_transforms().unwrap());

        let mut transforms = TransformCollection::new();
        transforms.add(Transform::invert());
        let err = handler.process(Some(&transforms), None).unwrap_err();
        assert!(matches!(err, ImagemillError::TransformsUnsupported { .. }));

        // a plain same-format copy is still allowed
        assert!(handler.process(None, None).is_ok());
    }

    #[test]
    fn test_metadata_dropped_when_target_lacks_support() {
        let mut handler = jpeg_handler(12, 12);
        let exif = ExifData::new(
            crate::exif::testutil::ExifBuilder::new()
                .ascii(0x010F, "Leica")
                .build(),
        )
        .unwrap();
        handler.set_exif_data(&exif).unwrap();
        assert!(handler.has_exif_data().unwrap());

        // GIF cannot hold EXIF; conversion silently drops it
        let processed = handler.process(None, Some(Format::Gif)).unwrap();
        assert_eq!(processed.format(), Format::Gif);
        assert!(!processed.has_exif_data().unwrap());
    }

    #[test]
    fn test_metadata_preserved_across_conversion() {
        let mut handler = jpeg_handler(12, 12);
        let exif = ExifData::new(
            crate::exif::testutil::ExifBuilder::new()
                .ascii(0x010F, "Leica")
                .build(),
        )
        .unwrap();
        handler.set_exif_data(&exif).unwrap();

        let processed = handler.process(None, Some(Format::Png)).unwrap();
        assert!(processed.has_exif_data().unwrap());
        let restored = processed.exif_data().unwrap().unwrap();
        assert_eq!(restored.tags(), exif.tags());
    }

    #[test]
    fn test_metadata_stripped_when_disabled() {
        let options = ImageOptions {
            preserve_exif_data: false,
            ..Default::default()
        };
        let mut handler =
            Handler::from_raster(Format::Jpeg, &gradient(12, 12), options).unwrap();
        let exif = ExifData::new(
            crate::exif::testutil::ExifBuilder::new()
                .ascii(0x010F, "Leica")
                .build(),
        )
        .unwrap();
        handler.set_exif_data(&exif).unwrap();

        let processed = handler.process(None, Some(Format::Png)).unwrap();
        assert!(!processed.has_exif_data().unwrap());
    }

    #[test]
    fn test_save_as_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.jpg");
        let handler = jpeg_handler(4, 4);
        handler.save_as(&target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), handler.data());
    }
}
