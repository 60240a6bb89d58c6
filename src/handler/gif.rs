// src/handler/gif.rs
//
// GIF info extraction. Width/height and the palette size come from the
// logical screen descriptor, transparency and frame delay from the
// graphic control extension, the repeat count from the Netscape looping
// extension. GIF carries neither EXIF nor ICC data.

use crate::error::Result;
use crate::info::{ColorSpace, ImageInfo, ImageInfoFields};
use crate::segment::gif::{
    GifBlock, GifBlocks, GRAPHIC_CONTROL_LABEL, NETSCAPE_EXT_HEADER,
};

pub fn info(data: &[u8]) -> Result<ImageInfo> {
    let mut fields = ImageInfoFields {
        mime_type: "image/gif",
        color_space: Some(ColorSpace::Palette),
        color_depth: Some(8),
        ..Default::default()
    };

    for block in GifBlocks::new(data) {
        match block? {
            GifBlock::Screen { desc, .. } => {
                fields.width = desc.width as u32;
                fields.height = desc.height as u32;
                fields.color_number = Some(desc.color_count());
            }
            GifBlock::Extension { label, value, .. } => {
                if label == GRAPHIC_CONTROL_LABEL && value.len() >= 6 {
                    fields.has_alpha_channel |= value[3] & 0x01 == 1;
                    if !fields.is_animation {
                        // a non-zero frame delay marks an animation
                        fields.is_animation = u16::from_le_bytes([value[4], value[5]]) > 0;
                    }
                } else if value.starts_with(NETSCAPE_EXT_HEADER) && value.len() >= 18 {
                    let mut repeat = u16::from_le_bytes([value[16], value[17]]) as u32;
                    if repeat > 0 {
                        // the stored count excludes the first play
                        repeat += 1;
                    }
                    fields.animation_repeat_count = Some(repeat);
                }
            }
            GifBlock::Image { .. } => {
                if fields.is_animation {
                    fields.animation_frames =
                        Some(fields.animation_frames.unwrap_or(0) + 1);
                }
            }
        }
    }

    ImageInfo::new(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animated_gif(frames: usize, loop_count: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF89a");
        data.extend_from_slice(&[0x04, 0x00, 0x03, 0x00]); // 4x3
        data.push(0x91); // GCT, 4 entries
        data.extend_from_slice(&[0x00, 0x00]);
        data.extend_from_slice(&[0u8; 12]);

        // Netscape looping extension
        data.extend_from_slice(b"!\xff\x0bNETSCAPE2.0");
        data.push(0x03);
        data.push(0x01);
        data.extend_from_slice(&loop_count.to_le_bytes());
        data.push(0x00);

        for _ in 0..frames {
            // graphic control extension with delay + transparency
            data.extend_from_slice(&[0x21, 0xF9, 0x04, 0x01, 0x0A, 0x00, 0x00, 0x00]);
            // image descriptor + data
            data.push(0x2C);
            data.extend_from_slice(&[0, 0, 0, 0, 0x04, 0x00, 0x03, 0x00, 0x00]);
            data.push(0x02);
            data.extend_from_slice(&[0x02, 0x44, 0x01]);
            data.push(0x00);
        }

        data.push(0x3B);
        data
    }

    #[test]
    fn test_animated_info() {
        let info = info(&animated_gif(3, 2)).unwrap();
        assert_eq!(info.width(), 4);
        assert_eq!(info.height(), 3);
        assert_eq!(info.color_space(), Some(ColorSpace::Palette));
        assert_eq!(info.color_number(), Some(4));
        assert!(info.has_alpha_channel());
        assert!(info.is_animation());
        assert_eq!(info.animation_frames(), Some(3));
        // stored loop count 2 plays 3 times in total
        assert_eq!(info.animation_repeat_count(), Some(3));
    }

    #[test]
    fn test_still_gif() {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF89a");
        data.extend_from_slice(&[0x02, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00]);
        data.push(0x2C);
        data.extend_from_slice(&[0, 0, 0, 0, 0x02, 0x00, 0x02, 0x00, 0x00]);
        data.push(0x02);
        data.extend_from_slice(&[0x02, 0x44, 0x01]);
        data.push(0x00);
        data.push(0x3B);

        let info = info(&data).unwrap();
        assert!(!info.is_animation());
        assert_eq!(info.animation_frames(), None);
        assert_eq!(info.animation_repeat_count(), None);
        assert!(!info.has_alpha_channel());
    }

    #[test]
    fn test_truncated_gif_fails() {
        let data = b"GIF89a\x04\x00";
        assert!(info(data).is_err());
    }
}
