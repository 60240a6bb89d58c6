// src/image.rs
//
// The Image facade: a path-bound image with a fluent transform builder,
// lazy handler construction and a content-addressed derivative cache.
// Nothing touches pixels until process()/save()/save_as() or a
// conversion method runs.

use crate::cache;
use crate::error::{ImagemillError, Result};
use crate::exif::ExifData;
use crate::handler::{Format, Handler};
use crate::icc::ColorProfile;
use crate::info::ImageInfo;
use crate::options::ImageOptions;
use crate::transform::{BlurMode, FlipDirection, ResizeMode, Transform, TransformCollection};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A source image plus its queued transforms.
///
/// `process()` renders the queue into a cached derivative and returns a
/// new `Image` pointing at it; the original's queue is drained and its
/// handler unset, forcing re-derivation on next access.
#[derive(Debug)]
pub struct Image {
    path: PathBuf,
    options: ImageOptions,
    format: Option<Format>,
    handler: Option<Handler>,
    transforms: TransformCollection,
}

impl Image {
    /// Bind an image file. Options are validated here, before any pixel
    /// work can happen.
    pub fn new(path: impl Into<PathBuf>, options: ImageOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            path: path.into(),
            options,
            format: None,
            handler: None,
            transforms: TransformCollection::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }

    /// The detected source format (resolved lazily from magic bytes).
    pub fn format(&mut self) -> Result<Format> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        let format = match &self.handler {
            Some(handler) => handler.format(),
            None => {
                let head = read_head(&self.path, 4096)?;
                Format::detect(&head)
                    .ok_or_else(|| ImagemillError::unsupported_format("unknown"))?
            }
        };
        self.format = Some(format);
        Ok(format)
    }

    pub fn mime_type(&mut self) -> Result<&'static str> {
        Ok(self.format()?.mime_type())
    }

    /// Lazily construct the handler from the file's bytes
    /// (memory-mapped, copied once into the handler's buffer).
    fn ensure_handler(&mut self) -> Result<()> {
        if self.handler.is_some() {
            return Ok(());
        }
        let format = self.format()?;
        let data = read_all(&self.path)?;
        self.handler = Some(Handler::new(format, data, self.options.clone()));
        Ok(())
    }

    fn handler_mut(&mut self) -> Result<&mut Handler> {
        self.ensure_handler()?;
        Ok(self.handler.as_mut().expect("handler just ensured"))
    }

    // =====================================================================
    // FLUENT TRANSFORM BUILDER - nothing applies until process()
    // =====================================================================

    /// Rotate by a given angle in degrees
    pub fn rotate(&mut self, angle: f64) -> Result<&mut Self> {
        self.transforms.add(Transform::rotate(angle)?);
        Ok(self)
    }

    /// Flip horizontally
    pub fn flip_horizontal(&mut self) -> &mut Self {
        self.transforms.add(Transform::flip(FlipDirection::Horizontal));
        self
    }

    /// Flip vertically
    pub fn flip_vertical(&mut self) -> &mut Self {
        self.transforms.add(Transform::flip(FlipDirection::Vertical));
        self
    }

    /// Flip both horizontally and vertically
    pub fn flip_both(&mut self) -> &mut Self {
        self.transforms.add(Transform::flip(FlipDirection::Both));
        self
    }

    /// Scale by a given factor
    pub fn scale(&mut self, factor: f64) -> Result<&mut Self> {
        self.transforms.add(Transform::scale(factor)?);
        Ok(self)
    }

    /// Resize to the given dimensions
    pub fn resize(&mut self, width: u32, height: u32, mode: ResizeMode) -> Result<&mut Self> {
        self.transforms.add(Transform::resize(width, height, mode)?);
        Ok(self)
    }

    /// Resize to a square; without an explicit size, the shorter source
    /// edge is used.
    pub fn square(&mut self, size: Option<u32>, mode: ResizeMode) -> Result<&mut Self> {
        let size = match size {
            Some(size) => size,
            None => {
                let info = self.info()?;
                info.width().min(info.height())
            }
        };
        self.resize(size, size, mode)
    }

    /// Crop to the given size starting from the given origin
    pub fn crop(&mut self, origin_x: u32, origin_y: u32, width: u32, height: u32) -> Result<&mut Self> {
        self.transforms
            .add(Transform::crop(origin_x, origin_y, width, height)?);
        Ok(self)
    }

    /// Blur by the given amount (one convolution pass per unit)
    pub fn blur(&mut self, amount: i32, mode: BlurMode) -> Result<&mut Self> {
        self.transforms.add(Transform::blur(amount, mode)?);
        Ok(self)
    }

    /// Adjust brightness
    pub fn brightness(&mut self, amount: i32) -> Result<&mut Self> {
        self.transforms.add(Transform::brightness(amount)?);
        Ok(self)
    }

    /// Colorize with the given color; alpha is on the 0-127
    /// transparency scale
    pub fn colorize(&mut self, red: i32, green: i32, blue: i32, alpha: i32) -> Result<&mut Self> {
        self.transforms
            .add(Transform::colorize(red, green, blue, alpha)?);
        Ok(self)
    }

    /// Adjust contrast
    pub fn contrast(&mut self, amount: i32) -> Result<&mut Self> {
        self.transforms.add(Transform::contrast(amount)?);
        Ok(self)
    }

    pub fn desaturate(&mut self) -> &mut Self {
        self.transforms.add(Transform::desaturate());
        self
    }

    pub fn edgedetect(&mut self) -> &mut Self {
        self.transforms.add(Transform::edgedetect());
        self
    }

    pub fn emboss(&mut self) -> &mut Self {
        self.transforms.add(Transform::emboss());
        self
    }

    pub fn invert(&mut self) -> &mut Self {
        self.transforms.add(Transform::invert());
        self
    }

    pub fn pixelate(&mut self, amount: i32) -> &mut Self {
        self.transforms.add(Transform::pixelate(amount));
        self
    }

    pub fn sharpen(&mut self) -> &mut Self {
        self.transforms.add(Transform::sharpen());
        self
    }

    pub fn smoothen(&mut self) -> &mut Self {
        self.transforms.add(Transform::smoothen());
        self
    }

    /// The queued transforms (in application order)
    pub fn transforms(&self) -> &TransformCollection {
        &self.transforms
    }

    // =====================================================================
    // METADATA
    // =====================================================================

    pub fn info(&mut self) -> Result<ImageInfo> {
        self.handler_mut()?.info()
    }

    pub fn has_color_profile(&mut self) -> Result<bool> {
        self.handler_mut()?.has_color_profile()
    }

    pub fn color_profile(&mut self) -> Result<Option<ColorProfile>> {
        self.handler_mut()?.color_profile()
    }

    pub fn set_color_profile(&mut self, profile: &ColorProfile) -> Result<()> {
        self.handler_mut()?.set_color_profile(profile)
    }

    pub fn remove_color_profile(&mut self) -> Result<()> {
        self.handler_mut()?.remove_color_profile()
    }

    pub fn has_exif_data(&mut self) -> Result<bool> {
        self.handler_mut()?.has_exif_data()
    }

    pub fn exif_data(&mut self) -> Result<Option<ExifData>> {
        self.handler_mut()?.exif_data()
    }

    pub fn set_exif_data(&mut self, exif: &ExifData) -> Result<()> {
        self.handler_mut()?.set_exif_data(exif)
    }

    pub fn remove_exif_data(&mut self) -> Result<()> {
        self.handler_mut()?.remove_exif_data()
    }

    // =====================================================================
    // PROCESSING
    // =====================================================================

    /// Render the queued transforms (and optional format conversion) into
    /// the content-addressed cache and return a new Image bound to the
    /// derived file.
    ///
    /// Identity short-circuit: with no conversion, no queued transforms
    /// and `force_cache` off, the image itself is returned untouched.
    /// Otherwise the cache key is derived from the source path, the
    /// transform specifier, the target format's encode options and the
    /// source mtime; an existing cache file is reused without
    /// re-rendering.
    pub fn process(&mut self, target: Option<Format>, force_cache: bool) -> Result<Image> {
        let format = self.format()?;
        let target = target.unwrap_or(format);

        if !force_cache && target == format && self.transforms.is_empty() {
            return Image::new(self.path.clone(), self.options.clone());
        }

        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| {
                ImagemillError::file_read_failed(self.path.to_string_lossy().into_owned(), e)
            })?;

        let digest = cache::options_digest(target, &self.options);
        let key = cache::cache_key(&self.path, &self.transforms.specifier(), &digest, modified);

        let dir = self.options.process_path.join(&key);
        std::fs::create_dir_all(&dir).map_err(|e| {
            ImagemillError::file_write_failed(dir.to_string_lossy().into_owned(), e)
        })?;

        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let target_path = dir.join(format!("{stem}.{}", target.extension()));

        {
            // at most one render per key; concurrent requests for the
            // same derivative wait instead of re-rendering
            let lock = cache::render_lock(&key);
            let _guard = lock.lock();

            if target_path.exists() {
                debug!(key = %key, path = %target_path.display(), "cache hit");
            } else {
                debug!(key = %key, path = %target_path.display(), "cache miss, rendering");
                self.render_to(&target_path, target)?;
            }
        }

        let image = Image::new(target_path, self.options.clone())?;
        self.transforms.clear();
        self.handler = None;
        Ok(image)
    }

    /// Convert to GIF
    pub fn to_gif(&mut self) -> Result<Image> {
        self.process(Some(Format::Gif), false)
    }

    /// Convert to JPEG
    pub fn to_jpeg(&mut self) -> Result<Image> {
        self.process(Some(Format::Jpeg), false)
    }

    /// Convert to PNG
    pub fn to_png(&mut self) -> Result<Image> {
        self.process(Some(Format::Png), false)
    }

    /// Convert to WebP
    pub fn to_webp(&mut self) -> Result<Image> {
        self.process(Some(Format::Webp), false)
    }

    /// Render in place over the source file
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone();
        self.save_as(path, None)
    }

    /// Render the queued transforms to an explicit path, optionally
    /// converting format. Unlike `process()`, this bypasses the cache.
    pub fn save_as(&mut self, path: impl AsRef<Path>, target: Option<Format>) -> Result<()> {
        let format = self.format()?;
        let target = target.unwrap_or(format);
        self.render_with(path.as_ref(), target)
    }

    fn render_to(&mut self, path: &Path, target: Format) -> Result<()> {
        self.render_with(path, target)
    }

    fn render_with(&mut self, path: &Path, target: Format) -> Result<()> {
        let format = self.format()?;
        self.ensure_handler()?;
        let handler = self.handler.as_ref().expect("handler just ensured");

        if !handler.supports_transforms()? {
            if target == format && self.transforms.is_empty() {
                return handler.save_as(path);
            }
            if self.transforms.is_empty() {
                return Err(ImagemillError::unsupported_conversion(
                    format.mime_type(),
                    target.mime_type(),
                ));
            }
            return Err(ImagemillError::transforms_unsupported(format.mime_type()));
        }

        handler
            .process(Some(&self.transforms), Some(target))?
            .save_as(path)
    }
}

fn read_head(path: &Path, limit: usize) -> Result<Vec<u8>> {
    use std::io::Read;
    let display = || path.to_string_lossy().into_owned();

    if !path.exists() {
        return Err(ImagemillError::file_not_found(display()));
    }
    let file = File::open(path).map_err(|e| ImagemillError::file_read_failed(display(), e))?;
    let mut head = Vec::with_capacity(limit);
    file.take(limit as u64)
        .read_to_end(&mut head)
        .map_err(|e| ImagemillError::file_read_failed(display(), e))?;
    Ok(head)
}

/// Read the whole file through a memory map (zero-copy until the single
/// copy into the handler's owned buffer).
fn read_all(path: &Path) -> Result<Vec<u8>> {
    let display = || path.to_string_lossy().into_owned();

    if !path.exists() {
        return Err(ImagemillError::file_not_found(display()));
    }
    let file = File::open(path).map_err(|e| ImagemillError::file_read_failed(display(), e))?;

    // Safety: the mapping is read once into an owned Vec; external
    // modification during that window is the caller's race to lose,
    // as with any read.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ImagemillError::mmap_failed(display(), e))?;
    Ok(mmap.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_jpeg(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let raster = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 2 % 256) as u8, (y * 2 % 256) as u8, 90, 255])
        });
        let bytes = codec::encode::encode_jpeg(&raster, 90, false).unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn options_for(dir: &TempDir) -> ImageOptions {
        ImageOptions {
            process_path: dir.path().join("cache"),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_detection_lazy() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "photo.jpg", 10, 10);
        let mut image = Image::new(path, options_for(&dir)).unwrap();
        assert_eq!(image.format().unwrap(), Format::Jpeg);
        assert_eq!(image.mime_type().unwrap(), "image/jpeg");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut image = Image::new(dir.path().join("nope.jpg"), options_for(&dir)).unwrap();
        assert!(matches!(
            image.format().unwrap_err(),
            ImagemillError::FileNotFound { .. }
        ));
    }

    #[test]
    fn test_identity_short_circuit() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "photo.jpg", 10, 10);
        let mut image = Image::new(path.clone(), options_for(&dir)).unwrap();

        let processed = image.process(None, false).unwrap();
        assert_eq!(processed.path(), path.as_path());
        // no cache directory was created for the identity case
        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn test_process_writes_cache_and_drains_queue() {
        let dir = TempDir::new().unwrap();
        let path = write_jpeg(&dir, "photo.jpg", 60, 40);
        let mut image = Image::new(path, options_for(&dir)).unwrap();

        image.crop(0, 0, 30, 20).unwrap();
        assert!(!image.transforms().is_empty());

        let mut derived = image.process(None, false).unwrap();
        assert!(image.transforms().is_empty());
        assert!(derived.path().starts_with(dir.path().join("cache")));
        assert_eq!(derived.path().extension().unwrap(), "jpg");

        let info = derived.info().unwrap();
        assert_eq!(info.width(), 30);
        assert_eq!(info.height(), 20);
    }

    #[test]
    fn test_invalid_options_rejected_at_construction() {
        let dir = TempDir::new().unwrap();
        let options = ImageOptions {
            jpeg_quality: 500,
            ..options_for(&dir)
        };
        assert!(Image::new(dir.path().join("x.jpg"), options).is_err());
    }
}
