// src/exif/testutil.rs
//
// Minimal little-endian EXIF blob builder shared by the unit, integration
// and fuzz suites. Not part of the public API: the production writer wraps
// raw blobs, it never serializes IFDs.

/// Builds a single-IFD little-endian TIFF blob from (tag, value) pairs.
#[derive(Default)]
pub struct ExifBuilder {
    entries: Vec<(u16, u16, u32, Vec<u8>)>,
}

impl ExifBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ascii(mut self, tag: u16, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        let count = bytes.len() as u32;
        self.entries.push((tag, 2, count, bytes));
        self
    }

    pub fn short(mut self, tag: u16, value: u16) -> Self {
        self.entries.push((tag, 3, 1, value.to_le_bytes().to_vec()));
        self
    }

    pub fn long(mut self, tag: u16, value: u32) -> Self {
        self.entries.push((tag, 4, 1, value.to_le_bytes().to_vec()));
        self
    }

    pub fn rational(mut self, tag: u16, numerator: u32, denominator: u32) -> Self {
        let mut bytes = numerator.to_le_bytes().to_vec();
        bytes.extend_from_slice(&denominator.to_le_bytes());
        self.entries.push((tag, 5, 1, bytes));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.entries.sort_by_key(|&(tag, ..)| tag);

        let mut blob = Vec::new();
        blob.extend_from_slice(b"II");
        blob.extend_from_slice(&42u16.to_le_bytes());
        blob.extend_from_slice(&8u32.to_le_bytes()); // IFD0 right after the header

        blob.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());

        // out-of-line values start after the entries and the next-IFD pointer
        let mut data_offset = 8 + 2 + self.entries.len() * 12 + 4;
        let mut overflow = Vec::new();

        for (tag, field_type, count, bytes) in &self.entries {
            blob.extend_from_slice(&tag.to_le_bytes());
            blob.extend_from_slice(&field_type.to_le_bytes());
            blob.extend_from_slice(&count.to_le_bytes());
            if bytes.len() <= 4 {
                let mut inline = bytes.clone();
                inline.resize(4, 0);
                blob.extend_from_slice(&inline);
            } else {
                blob.extend_from_slice(&(data_offset as u32).to_le_bytes());
                data_offset += bytes.len();
                overflow.extend_from_slice(bytes);
            }
        }

        blob.extend_from_slice(&0u32.to_le_bytes()); // no next IFD
        blob.extend_from_slice(&overflow);
        blob
    }
}
