// tests/property_based.rs
//
// Property tests: dimension laws for crop/scale, specifier stability,
// and "never panic, never read out of bounds" sweeps over the binary
// parsers with arbitrary and mutated inputs.

use imagemill::exif;
use imagemill::segment::{GifBlocks, JpegSegments};
use imagemill::transform::{BlurMode, FlipDirection, ResizeMode, Transform};
use imagemill::{ColorProfile, ImageInfo};
use image::{Rgba, RgbaImage};
use proptest::prelude::*;

fn test_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    })
}

fn test_info(width: u32, height: u32) -> ImageInfo {
    ImageInfo::new(imagemill::info::ImageInfoFields {
        mime_type: "image/png",
        width,
        height,
        ..Default::default()
    })
    .unwrap()
}

fn in_bounds_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=64, 1u32..=64)
        .prop_flat_map(|(img_w, img_h)| {
            let crop_w = 1u32..=img_w;
            let crop_h = 1u32..=img_h;
            (Just(img_w), Just(img_h), crop_w, crop_h)
        })
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            let max_x = img_w - crop_w;
            let max_y = img_h - crop_h;
            (
                Just(img_w),
                Just(img_h),
                Just(crop_w),
                Just(crop_h),
                0u32..=max_x,
                0u32..=max_y,
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_in_bounds_crop_yields_exact_dimensions(
        (img_w, img_h, crop_w, crop_h, x, y) in in_bounds_crop_strategy()
    ) {
        let img = test_image(img_w, img_h);
        let info = test_info(img_w, img_h);
        let out = Transform::crop(x, y, crop_w, crop_h)
            .unwrap()
            .apply(img, &info)
            .unwrap();
        prop_assert_eq!(out.dimensions(), (crop_w, crop_h));
    }

    #[test]
    fn prop_scale_floors_dimensions(
        img_w in 1u32..=48,
        img_h in 1u32..=48,
        factor_milli in 100u32..=3000,
    ) {
        let factor = factor_milli as f64 / 1000.0;
        let img = test_image(img_w, img_h);
        let info = test_info(img_w, img_h);

        let expected_w = (img_w as f64 * factor).floor() as u32;
        let expected_h = (img_h as f64 * factor).floor() as u32;

        let result = Transform::scale(factor).unwrap().apply(img, &info);
        if expected_w == 0 || expected_h == 0 {
            prop_assert!(result.is_err());
        } else {
            prop_assert_eq!(result.unwrap().dimensions(), (expected_w, expected_h));
        }
    }

    #[test]
    fn prop_nonpositive_scale_fails_at_construction(factor in -10.0f64..=0.0) {
        prop_assert!(Transform::scale(factor).is_err());
    }

    #[test]
    fn prop_resize_always_hits_target(
        img_w in 1u32..=48,
        img_h in 1u32..=48,
        target_w in 1u32..=48,
        target_h in 1u32..=48,
        mode_index in 0usize..3,
    ) {
        let mode = [ResizeMode::Cover, ResizeMode::Contain, ResizeMode::Fill][mode_index];
        let img = test_image(img_w, img_h);
        let info = test_info(img_w, img_h);
        let out = Transform::resize(target_w, target_h, mode)
            .unwrap()
            .apply(img, &info)
            .unwrap();
        // every mode produces exactly the target canvas; they differ in
        // how the source is fitted into it
        prop_assert_eq!(out.dimensions(), (target_w, target_h));
    }

    #[test]
    fn prop_specifier_roundtrip_any_valid_transform(
        index in 0usize..7,
        a in 0i32..=100,
        b in 1u32..=256,
    ) {
        let transform = match index {
            0 => Transform::crop(a as u32, a as u32, b, b).unwrap(),
            1 => Transform::resize(b, b, ResizeMode::Contain).unwrap(),
            2 => Transform::blur(a, BlurMode::Gaussian).unwrap(),
            3 => Transform::brightness(a - 50).unwrap(),
            4 => Transform::contrast(a - 50).unwrap(),
            5 => Transform::pixelate(a),
            _ => Transform::flip(FlipDirection::Vertical),
        };
        let parsed = Transform::from_specifier(&transform.specifier()).unwrap();
        prop_assert_eq!(transform, parsed);
    }

    #[test]
    fn prop_jpeg_decoder_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = JpegSegments::new(&data).collect::<Result<Vec<_>, _>>();
    }

    #[test]
    fn prop_gif_decoder_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = GifBlocks::new(&data).collect::<Result<Vec<_>, _>>();
    }

    #[test]
    fn prop_exif_reader_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = exif::reader::read(&data);
    }

    #[test]
    fn prop_exif_reader_survives_mutated_valid_blob(
        flip_at in 0usize..64,
        value in any::<u8>(),
    ) {
        let mut blob = exif::testutil::ExifBuilder::new()
            .ascii(0x010F, "Maker")
            .rational(0x829A, 1, 60)
            .short(0x0112, 1)
            .build();
        let at = flip_at % blob.len();
        blob[at] = value;
        // mutated input may fail, but must fail cleanly
        let _ = exif::reader::read(&blob);
    }

    #[test]
    fn prop_icc_parser_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = ColorProfile::new(data);
    }

    #[test]
    fn prop_gif_decoder_handles_mutations(
        flip_at in 0usize..128,
        value in any::<u8>(),
    ) {
        let img = test_image(8, 8);
        let mut bytes = imagemill::codec::encode::encode_gif(&img, 16).unwrap();
        let at = flip_at % bytes.len();
        bytes[at] = value;
        let _ = GifBlocks::new(&bytes).collect::<Result<Vec<_>, _>>();
    }
}
