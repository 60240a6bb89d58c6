// src/handler/svg.rs
//
// SVG pass-through support: the handler can report dimensions and copy
// the file, but SVG is vector data - no rasterization, no transforms, no
// embedded EXIF/ICC. Dimensions come from the root element's width and
// height attributes, falling back to the viewBox.

use crate::error::{ImagemillError, Result};
use crate::info::{ImageInfo, ImageInfoFields};

pub fn info(data: &[u8]) -> Result<ImageInfo> {
    let text = std::str::from_utf8(data)
        .map_err(|_| ImagemillError::decode_failed("svg: not valid UTF-8"))?;

    let tag = root_tag(text).ok_or_else(|| ImagemillError::decode_failed("svg: no <svg> root"))?;

    let width = attribute(tag, "width").and_then(parse_length);
    let height = attribute(tag, "height").and_then(parse_length);

    let (width, height) = match (width, height) {
        (Some(w), Some(h)) => (w, h),
        _ => view_box_size(tag)
            .ok_or_else(|| ImagemillError::decode_failed("svg: no usable dimensions"))?,
    };

    ImageInfo::new(ImageInfoFields {
        mime_type: "image/svg+xml",
        width,
        height,
        ..Default::default()
    })
}

/// The opening `<svg ...>` tag, without scanning the whole document.
fn root_tag(text: &str) -> Option<&str> {
    let start = text.find("<svg")?;
    let rest = &text[start..];
    let end = rest.find('>')?;
    Some(&rest[..end])
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut search = tag;
    loop {
        let at = search.find(name)?;
        let after = &search[at + name.len()..];
        // reject substring hits like "stroke-width"
        let preceding = search[..at].chars().next_back();
        let boundary = preceding.map_or(true, |c| c.is_whitespace());
        let after_trim = after.trim_start();
        if boundary && after_trim.starts_with('=') {
            let value = after_trim[1..].trim_start();
            let quote = value.chars().next()?;
            if quote == '"' || quote == '\'' {
                let inner = &value[1..];
                let close = inner.find(quote)?;
                return Some(&inner[..close]);
            }
        }
        search = after;
    }
}

/// Parse a length attribute, tolerating a `px` suffix. Percentages and
/// other units have no pixel meaning here.
fn parse_length(value: &str) -> Option<u32> {
    let trimmed = value.trim().trim_end_matches("px").trim();
    let parsed: f64 = trimmed.parse().ok()?;
    if parsed < 1.0 {
        return None;
    }
    Some(parsed.round() as u32)
}

fn view_box_size(tag: &str) -> Option<(u32, u32)> {
    let value = attribute(tag, "viewBox")?;
    let parts: Vec<f64> = value
        .split([' ', ','])
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.parse().ok())
        .collect();
    if parts.len() != 4 || parts[2] < 1.0 || parts[3] < 1.0 {
        return None;
    }
    Some((parts[2].round() as u32, parts[3].round() as u32))
}
