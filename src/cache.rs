// src/cache.rs
//
// Content-addressed derivative cache keys and the per-key render lock.
//
// The key is a pure function of: source path, transform chain specifier,
// the encode options relevant to the target format, and the source's
// modification time. Identical inputs always hash to the same directory;
// changing any single encode option invalidates the key.

use crate::handler::Format;
use crate::options::ImageOptions;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Hex length of a cache key
const KEY_LENGTH: usize = 32;

/// Digest of the encode options that affect bytes in the given target
/// format. Options irrelevant to the format stay out of the digest so
/// changing them does not invalidate unrelated cache entries.
pub fn options_digest(format: Format, options: &ImageOptions) -> String {
    let mime = format.mime_type();
    match format {
        Format::Jpeg => format!(
            "{}{}{}{}{}",
            mime,
            options.jpeg_quality,
            options.jpeg_progressive,
            options.preserve_color_profile,
            options.preserve_exif_data
        ),
        Format::Png => format!(
            "{}{}{}{}",
            mime,
            options.png_compression,
            options.preserve_color_profile,
            options.preserve_exif_data
        ),
        Format::Webp => format!(
            "{}{}{}{}",
            mime,
            options.webp_quality,
            options.preserve_color_profile,
            options.preserve_exif_data
        ),
        Format::Gif => format!("{}{}", mime, options.gif_colors),
        Format::Svg => mime.to_string(),
    }
}

/// Derive the cache key for a (source, transform chain, target format)
/// triple: sha256 truncated to 32 hex characters.
pub fn cache_key(
    source: &Path,
    specifier: &str,
    digest: &str,
    modified: SystemTime,
) -> String {
    let mtime = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(source.to_string_lossy().as_bytes());
    hasher.update(specifier.as_bytes());
    hasher.update(digest.as_bytes());
    hasher.update(mtime.to_string().as_bytes());

    let hex: String = hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    hex[..KEY_LENGTH].to_string()
}

/// Process-wide registry of per-key render locks. Two requests for the
/// same cache key serialize on one mutex so the render runs at most once;
/// distinct keys never contend. (Entries are tiny and keys recur, so the
/// registry is never pruned.)
static RENDER_LOCKS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn render_lock(key: &str) -> Arc<Mutex<()>> {
    let mut locks = RENDER_LOCKS.lock();
    locks
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}
