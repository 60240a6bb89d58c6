// src/segment/gif.rs
//
// GIF block decoder. Yields the logical screen descriptor, extension
// blocks and image blocks in stream order, stopping at the trailer.
//
// Extension and image blocks carry their raw bytes from the introducer
// through the sub-block terminator, so callers can pattern-match
// application extensions (e.g. the Netscape looping extension) without a
// second parse.

use crate::error::{ImagemillError, Result};

/// Graphic Control Extension label
pub const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;
/// Application Extension label
pub const APPLICATION_LABEL: u8 = 0xFF;
/// Raw header of the Netscape looping extension, as it appears at the
/// start of an application extension block's bytes.
pub const NETSCAPE_EXT_HEADER: &[u8] = b"!\xff\x0bNETSCAPE2.0";

const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_SEPARATOR: u8 = 0x2C;
const TRAILER: u8 = 0x3B;

/// Parsed fields of the logical screen descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    /// Global color table size field (bits 0-2 of the packed byte);
    /// the table holds 2^(n+1) entries
    pub global_table_size: u8,
    pub has_global_table: bool,
    pub background_index: u8,
}

impl ScreenDescriptor {
    /// Number of entries in the global color table
    pub fn color_count(&self) -> u32 {
        1 << (self.global_table_size as u32 + 1)
    }
}

/// A decoded GIF block. `offset`/`position` delimit the raw bytes of the
/// block within the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GifBlock<'a> {
    /// Header + logical screen descriptor + global color table, as one
    /// leading block. `value` spans from the start of the buffer.
    Screen {
        desc: ScreenDescriptor,
        value: &'a [u8],
        offset: usize,
        position: usize,
    },
    /// Extension block; `value` starts at the 0x21 introducer and includes
    /// the terminating zero-length sub-block.
    Extension {
        label: u8,
        value: &'a [u8],
        offset: usize,
        position: usize,
    },
    /// Image descriptor + optional local color table + LZW data.
    Image {
        value: &'a [u8],
        offset: usize,
        position: usize,
    },
}

impl<'a> GifBlock<'a> {
    pub fn value(&self) -> &'a [u8] {
        match self {
            GifBlock::Screen { value, .. }
            | GifBlock::Extension { value, .. }
            | GifBlock::Image { value, .. } => value,
        }
    }
}

/// Lazy iterator over the blocks of a GIF byte stream.
///
/// Iteration ends cleanly at the 0x3B trailer; a buffer that ends without
/// one, or that truncates mid-block, yields a decode error.
pub struct GifBlocks<'a> {
    data: &'a [u8],
    pos: usize,
    started: bool,
    done: bool,
}

impl<'a> GifBlocks<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            started: false,
            done: false,
        }
    }

    fn fail(&mut self, err: ImagemillError) -> Option<Result<GifBlock<'a>>> {
        self.done = true;
        Some(Err(err))
    }

    fn take(&mut self, count: usize) -> std::result::Result<&'a [u8], ImagemillError> {
        if self.pos + count > self.data.len() {
            return Err(ImagemillError::truncated_data(
                self.pos,
                self.pos + count - self.data.len(),
            ));
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Advance past a chain of 1-byte-length-prefixed sub-blocks,
    /// including the zero-length terminator.
    fn skip_sub_blocks(&mut self) -> std::result::Result<(), ImagemillError> {
        loop {
            let size = self.take(1)?[0];
            if size == 0 {
                return Ok(());
            }
            self.take(size as usize)?;
        }
    }

    fn screen_block(&mut self) -> std::result::Result<GifBlock<'a>, ImagemillError> {
        let header = self.take(6)?;
        if header != b"GIF87a" && header != b"GIF89a" {
            return Err(ImagemillError::decode_failed("not a GIF (bad signature)"));
        }

        let lsd = self.take(7)?;
        let packed = lsd[4];
        let desc = ScreenDescriptor {
            width: u16::from_le_bytes([lsd[0], lsd[1]]),
            height: u16::from_le_bytes([lsd[2], lsd[3]]),
            global_table_size: packed & 0x07,
            has_global_table: packed & 0x80 != 0,
            background_index: lsd[5],
        };

        if desc.has_global_table {
            self.take(3 * desc.color_count() as usize)?;
        }

        Ok(GifBlock::Screen {
            desc,
            value: &self.data[..self.pos],
            offset: 0,
            position: self.pos,
        })
    }

    fn extension_block(&mut self) -> std::result::Result<GifBlock<'a>, ImagemillError> {
        let offset = self.pos;
        self.take(1)?; // introducer
        let label = self.take(1)?[0];
        self.skip_sub_blocks()?;
        Ok(GifBlock::Extension {
            label,
            value: &self.data[offset..self.pos],
            offset,
            position: self.pos,
        })
    }

    fn image_block(&mut self) -> std::result::Result<GifBlock<'a>, ImagemillError> {
        let offset = self.pos;
        let desc = self.take(10)?; // separator + 9-byte image descriptor
        let packed = desc[9];
        if packed & 0x80 != 0 {
            let entries = 1usize << ((packed & 0x07) as usize + 1);
            self.take(3 * entries)?;
        }
        self.take(1)?; // LZW minimum code size
        self.skip_sub_blocks()?;
        Ok(GifBlock::Image {
            value: &self.data[offset..self.pos],
            offset,
            position: self.pos,
        })
    }
}

impl<'a> Iterator for GifBlocks<'a> {
    type Item = Result<GifBlock<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if !self.started {
            self.started = true;
            return match self.screen_block() {
                Ok(block) => Some(Ok(block)),
                Err(err) => self.fail(err),
            };
        }

        let introducer = match self.take(1) {
            Ok(slice) => slice[0],
            Err(err) => return self.fail(err),
        };
        // re-read the introducer inside the block parsers
        self.pos -= 1;

        match introducer {
            TRAILER => {
                self.done = true;
                None
            }
            EXTENSION_INTRODUCER => match self.extension_block() {
                Ok(block) => Some(Ok(block)),
                Err(err) => self.fail(err),
            },
            IMAGE_SEPARATOR => match self.image_block() {
                Ok(block) => Some(Ok(block)),
                Err(err) => self.fail(err),
            },
            other => self.fail(ImagemillError::decode_failed(format!(
                "unexpected GIF block introducer 0x{:02X} at offset {}",
                other, self.pos
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2x1, 4-entry global table, one opaque image block
    fn minimal_gif() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF89a");
        data.extend_from_slice(&[0x02, 0x00, 0x01, 0x00]); // 2x1
        data.push(0x91); // GCT present, size field 1 -> 4 entries
        data.push(0x00); // background
        data.push(0x00); // aspect
        data.extend_from_slice(&[0u8; 12]); // 4 RGB entries
        // image descriptor
        data.push(0x2C);
        data.extend_from_slice(&[0, 0, 0, 0, 0x02, 0x00, 0x01, 0x00, 0x00]);
        data.push(0x02); // LZW min code size
        data.extend_from_slice(&[0x02, 0x44, 0x01]); // one sub-block
        data.push(0x00); // terminator
        data.push(0x3B); // trailer
        data
    }

    #[test]
    fn test_minimal_gif_blocks() {
        let data = minimal_gif();
        let blocks: Vec<_> = GifBlocks::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 2);

        match &blocks[0] {
            GifBlock::Screen { desc, .. } => {
                assert_eq!(desc.width, 2);
                assert_eq!(desc.height, 1);
                assert_eq!(desc.color_count(), 4);
                assert!(desc.has_global_table);
            }
            other => panic!("expected screen block, got {other:?}"),
        }
        assert!(matches!(blocks[1], GifBlock::Image { .. }));
    }

    #[test]
    fn test_extension_block_raw_value() {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF89a");
        data.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]); // 1x1, no GCT
        // graphic control extension
        data.extend_from_slice(&[0x21, 0xF9, 0x04, 0x01, 0x0A, 0x00, 0x00, 0x00]);
        data.push(0x3B);

        let blocks: Vec<_> = GifBlocks::new(&data).collect::<Result<_>>().unwrap();
        match &blocks[1] {
            GifBlock::Extension { label, value, .. } => {
                assert_eq!(*label, GRAPHIC_CONTROL_LABEL);
                // raw bytes from the introducer through the terminator
                assert_eq!(value[0], 0x21);
                assert_eq!(value[3] & 0x01, 1); // transparent color flag
                assert_eq!(u16::from_le_bytes([value[4], value[5]]), 10); // delay
            }
            other => panic!("expected extension block, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_mid_lsd() {
        // cut off inside the logical screen descriptor
        let data = b"GIF89a\x02\x00\x01";
        let result: Result<Vec<_>> = GifBlocks::new(data).collect();
        assert!(matches!(
            result.unwrap_err(),
            ImagemillError::TruncatedData { .. }
        ));
    }

    #[test]
    fn test_truncated_mid_sub_block() {
        let mut data = Vec::new();
        data.extend_from_slice(b"GIF89a");
        data.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0x21, 0xFE, 0x0B, b'h', b'i']); // claims 11 bytes, has 2
        let result: Result<Vec<_>> = GifBlocks::new(&data).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_trailer() {
        let mut data = minimal_gif();
        data.pop(); // drop the trailer
        let result: Result<Vec<_>> = GifBlocks::new(&data).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_signature() {
        let data = b"NOTAGIF\x00\x00\x00\x00";
        let result: Result<Vec<_>> = GifBlocks::new(data).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_restartable() {
        let data = minimal_gif();
        let first: Vec<_> = GifBlocks::new(&data).collect::<Result<_>>().unwrap();
        let second: Vec<_> = GifBlocks::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(first, second);
    }
}
