// tests/fuzz_regression.rs
//
// Regression tests for parser inputs found by fuzzing.
// Each test is a single cheap input and runs in the normal test suite.

use imagemill::segment::{GifBlocks, JpegSegments};
use imagemill::{exif, ColorProfile};

#[test]
fn fuzz_regression_jpeg_length_field_self_overlap() {
    // a length field of exactly 2 covers only itself: an empty payload,
    // which must not loop forever or slide backwards
    let data = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x02, 0xFF, 0xD9];
    let segments: Vec<_> = JpegSegments::new(&data)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1].value, &[] as &[u8]);
}

#[test]
fn fuzz_regression_jpeg_fill_bytes_before_marker() {
    // 0xFF padding between segments is legal and must not be read as
    // nested markers
    let data = [0xFF, 0xD8, 0xFF, 0xFF, 0xFF, 0xD9];
    let segments: Vec<_> = JpegSegments::new(&data)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(segments.last().unwrap().marker, 0xD9);
}

#[test]
fn fuzz_regression_jpeg_marker_at_last_byte() {
    // buffer ends right after a lone 0xFF: must be a truncation error,
    // not an index past the end
    let data = [0xFF, 0xD8, 0xFF];
    assert!(JpegSegments::new(&data)
        .collect::<Result<Vec<_>, _>>()
        .is_err());
}

#[test]
fn fuzz_regression_gif_sub_block_chain_to_edge() {
    // sub-block length that lands exactly on the end of the buffer,
    // with no terminator behind it
    let mut data = Vec::new();
    data.extend_from_slice(b"GIF89a");
    data.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    data.extend_from_slice(&[0x21, 0xFE, 0x02, b'h', b'i']);
    assert!(GifBlocks::new(&data).collect::<Result<Vec<_>, _>>().is_err());
}

#[test]
fn fuzz_regression_gif_huge_local_color_table() {
    // image descriptor flags claim the largest local color table on a
    // tiny buffer
    let mut data = Vec::new();
    data.extend_from_slice(b"GIF89a");
    data.extend_from_slice(&[0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    data.push(0x2C);
    data.extend_from_slice(&[0, 0, 0, 0, 0x01, 0x00, 0x01, 0x00, 0x87]);
    assert!(GifBlocks::new(&data).collect::<Result<Vec<_>, _>>().is_err());
}

#[test]
fn fuzz_regression_exif_value_offset_past_end() {
    // an out-of-line value whose offset points past the blob
    let mut blob = Vec::new();
    blob.extend_from_slice(b"II");
    blob.extend_from_slice(&42u16.to_le_bytes());
    blob.extend_from_slice(&8u32.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes()); // one entry
    blob.extend_from_slice(&0x010Fu16.to_le_bytes()); // Make
    blob.extend_from_slice(&2u16.to_le_bytes()); // ASCII
    blob.extend_from_slice(&64u32.to_le_bytes()); // 64 bytes (out of line)
    blob.extend_from_slice(&0xFFFF_FF00u32.to_le_bytes()); // far offset
    blob.extend_from_slice(&0u32.to_le_bytes());
    assert!(exif::reader::read(&blob).is_err());
}

#[test]
fn fuzz_regression_exif_count_times_size_overflow() {
    // count * type-size overflowing usize must be caught, not wrapped
    let mut blob = Vec::new();
    blob.extend_from_slice(b"II");
    blob.extend_from_slice(&42u16.to_le_bytes());
    blob.extend_from_slice(&8u32.to_le_bytes());
    blob.extend_from_slice(&1u16.to_le_bytes());
    blob.extend_from_slice(&0x829Au16.to_le_bytes()); // ExposureTime
    blob.extend_from_slice(&5u16.to_le_bytes()); // RATIONAL (8 bytes each)
    blob.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // absurd count
    blob.extend_from_slice(&8u32.to_le_bytes());
    blob.extend_from_slice(&0u32.to_le_bytes());
    assert!(exif::reader::read(&blob).is_err());
}

#[test]
fn fuzz_regression_icc_tag_count_overflow() {
    // tag count far larger than the blob: every entry read must stay
    // bounds-checked
    let mut data = vec![0u8; 140];
    data[36..40].copy_from_slice(b"acsp");
    data[128..132].copy_from_slice(&u32::MAX.to_be_bytes());
    assert!(ColorProfile::new(data).is_err());
}

#[test]
fn fuzz_regression_icc_tag_pointing_past_blob() {
    // a tag whose (offset, length) extends past the data must be
    // ignored by value lookups, not read out of bounds
    let mut data = vec![0u8; 160];
    data[36..40].copy_from_slice(b"acsp");
    data[128..132].copy_from_slice(&1u32.to_be_bytes());
    data[132..136].copy_from_slice(b"desc");
    data[136..140].copy_from_slice(&4000u32.to_be_bytes()); // offset
    data[140..144].copy_from_slice(&100u32.to_be_bytes()); // length
    let profile = ColorProfile::new(data).unwrap();
    assert_eq!(profile.name(), "");
}
