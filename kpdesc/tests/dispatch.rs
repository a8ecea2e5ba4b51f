use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use kpdesc::normalize::root_sift;
use kpdesc::preprocess::prepare;
use kpdesc::{
    extract_local_descriptors, legacy_orb_descriptors, DescriptorError, DescriptorKind, DescriptorMethod,
    ExtractorBuilder, ExtractorConfig, CANONICAL_SIZE,
};
use proptest::prelude::*;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn noise(x: u32, y: u32) -> u8 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    (h % 48) as u8
}

/// Red rectangles over a horizontal gradient, with per-pixel noise so that
/// corner scores do not tie. 320 pixels shrink to a 40 pixel period at the
/// canonical size.
fn scene() -> DynamicImage {
    let img = RgbImage::from_fn(320, 320, |x, y| {
        let (cx, cy) = (x % 50, y % 50);
        let n = noise(x, y);
        let gradient = (x * 40 / 320) as u8;
        if (12..32).contains(&cx) && (15..30).contains(&cy) {
            Rgb([200 + n / 2, 60 + n, 30 + gradient])
        } else {
            Rgb([20 + n + gradient, 30 + n, 40 + n / 2])
        }
    });
    DynamicImage::ImageRgb8(img)
}

fn checkerboard(size: u32, cell: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

fn flat() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([90, 90, 90])))
}

#[test]
fn every_method_has_its_width() {
    init();
    let img = scene();
    let expected = [
        ("sift", 128, DescriptorKind::Float),
        ("surf", 64, DescriptorKind::Float),
        ("root_sift", 128, DescriptorKind::Float),
        ("orb", 32, DescriptorKind::Binary),
        ("daisy", 200, DescriptorKind::Float),
        ("brisk", 64, DescriptorKind::Binary),
    ];
    for (method, cols, kind) in expected {
        let desc = extract_local_descriptors(&img, None, method)
            .unwrap()
            .unwrap_or_else(|| panic!("{method} found no keypoints"));
        assert!(desc.rows() > 0, "{method}");
        assert_eq!(desc.shape().1, cols, "{method}");
        assert_eq!(desc.kind(), kind, "{method}");
        assert_eq!(method.parse::<DescriptorMethod>().unwrap().descriptor_kind(), kind);
    }
}

#[test]
fn root_sift_is_hellinger_normalized_sift() {
    init();
    let img = scene();
    let sift = extract_local_descriptors(&img, None, "sift").unwrap().unwrap();
    let rooted = extract_local_descriptors(&img, None, "root_sift").unwrap().unwrap();
    assert_eq!(sift.shape(), rooted.shape());

    let rooted = rooted.as_float().unwrap();
    assert_eq!(root_sift(sift.as_float().unwrap(), 1e-7), *rooted);
    assert!(rooted.iter().all(|v| *v >= 0.0));
    for row in rooted.rows() {
        let sq: f32 = row.iter().map(|v| v * v).sum();
        if sq > 0.0 {
            approx::assert_relative_eq!(sq, 1.0, epsilon = 1e-4);
        }
    }
}

#[test]
fn unknown_method_is_rejected() {
    init();
    for key in ["freak", "SIFT", "root-sift", ""] {
        match extract_local_descriptors(&scene(), None, key) {
            Err(DescriptorError::InvalidMethod(k)) => assert_eq!(k, key),
            other => panic!("{key:?}: {other:?}"),
        }
    }
}

#[test]
fn non_rgb_and_empty_images_are_rejected() {
    init();
    let rgba = DynamicImage::ImageRgba8(RgbaImage::new(32, 32));
    let gray = DynamicImage::ImageLuma8(GrayImage::new(32, 32));
    let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
    for img in [rgba, gray, empty] {
        assert!(matches!(
            extract_local_descriptors(&img, None, "sift"),
            Err(DescriptorError::InvalidImage(_))
        ));
    }
}

#[test]
fn flat_image_has_no_descriptors() {
    init();
    for method in DescriptorMethod::ALL {
        assert!(
            extract_local_descriptors(&flat(), None, method.as_str()).unwrap().is_none(),
            "{method}"
        );
    }
}

#[test]
fn black_image_has_no_descriptors() {
    init();
    let black = DynamicImage::ImageRgb8(RgbImage::new(256, 256));
    for method in DescriptorMethod::ALL {
        assert!(
            extract_local_descriptors(&black, None, method.as_str()).unwrap().is_none(),
            "{method}"
        );
    }
}

#[test]
fn checkerboard_gives_none_or_full_width_rows() {
    init();
    let board = checkerboard(512, 32);
    for (method, cols) in [("sift", 128), ("orb", 32), ("surf", 64), ("root_sift", 128), ("daisy", 200), ("brisk", 64)] {
        match extract_local_descriptors(&board, None, method).unwrap() {
            None => {}
            Some(desc) => assert_eq!(desc.shape().1, cols, "{method}"),
        }
    }
}

#[test]
fn repeated_calls_are_bit_identical() {
    init();
    let img = scene();
    let mask = GrayImage::from_fn(320, 320, |_, y| Luma([if y > 40 { 1 } else { 0 }]));
    for method in DescriptorMethod::ALL {
        let first = extract_local_descriptors(&img, Some(&mask), method.as_str()).unwrap();
        let second = extract_local_descriptors(&img, Some(&mask), method.as_str()).unwrap();
        assert_eq!(first, second, "{method}");
    }
}

#[test]
fn zero_mask_suppresses_every_method() {
    init();
    let mask = GrayImage::new(320, 320);
    for method in DescriptorMethod::ALL {
        assert!(
            extract_local_descriptors(&scene(), Some(&mask), method.as_str()).unwrap().is_none(),
            "{method}"
        );
    }
    assert!(legacy_orb_descriptors(&scene(), Some(&mask)).unwrap().is_none());
}

#[test]
fn half_mask_keeps_a_subset() {
    init();
    let img = scene();
    let mask = GrayImage::from_fn(320, 320, |x, _| Luma([if x < 160 { 7 } else { 0 }]));
    let all = extract_local_descriptors(&img, None, "sift").unwrap().unwrap();
    let half = extract_local_descriptors(&img, Some(&mask), "sift").unwrap().unwrap();
    assert!(half.rows() > 0);
    assert!(half.rows() < all.rows());
}

#[test]
fn mask_extent_is_resized_independently() {
    init();
    let mask = GrayImage::from_pixel(64, 48, Luma([1]));
    let masked = extract_local_descriptors(&scene(), Some(&mask), "brisk").unwrap();
    let unmasked = extract_local_descriptors(&scene(), None, "brisk").unwrap();
    assert_eq!(masked, unmasked);
}

#[test]
fn legacy_orb_is_binary() {
    init();
    let desc = legacy_orb_descriptors(&scene(), None).unwrap().unwrap();
    assert_eq!(desc.shape().1, 32);
    assert!(desc.rows() <= 1200);
}

#[test]
fn thread_count_does_not_change_results() {
    init();
    let img = scene();
    let single = ExtractorBuilder::new().threads(1).build().unwrap();
    let multi = ExtractorBuilder::new().threads(4).build().unwrap();
    for method in DescriptorMethod::ALL {
        assert_eq!(
            single.extract_method(&img, None, method).unwrap(),
            multi.extract_method(&img, None, method).unwrap(),
            "{method}"
        );
    }
}

#[test]
fn custom_canonical_size() {
    init();
    let extractor = ExtractorBuilder::from_config(ExtractorConfig {
        canonical_size: 192,
        ..Default::default()
    })
    .build()
    .unwrap();
    assert_eq!(extractor.config().canonical_size, 192);
    let desc = extractor.extract(&scene(), None, "daisy").unwrap().unwrap();
    assert_eq!(desc.shape().1, 200);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn canonical_input_is_always_square(w in 1u32..96, h in 1u32..96, r: u8, g: u8, b: u8) {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([r, g, b])));
        let mask = GrayImage::from_fn(w, h, |x, y| Luma([((x * 31 + y * 17) % 3) as u8]));
        let input = prepare(&img, Some(&mask), CANONICAL_SIZE).unwrap();
        prop_assert_eq!(input.image.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
        let luma = kpdesc::preprocess::luma(r, g, b);
        prop_assert!(input.image.pixels().all(|p| p[0] == luma));
        let mask = input.mask.unwrap();
        prop_assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn constant_masks_keep_their_zero_ness(w in 1u32..96, h in 1u32..96, v: u8) {
        let img = DynamicImage::ImageRgb8(RgbImage::new(w, h));
        let mask = GrayImage::from_pixel(w, h, Luma([v]));
        let mask = prepare(&img, Some(&mask), CANONICAL_SIZE).unwrap().mask.unwrap();
        let expected = if v == 0 { 0 } else { 255 };
        prop_assert!(mask.pixels().all(|p| p[0] == expected));
    }

    #[test]
    fn root_sift_rows_are_unit_length(rows in prop::collection::vec(prop::collection::vec(0.0f32..255.0, 128), 1..6)) {
        let n = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        let d = ndarray::Array2::from_shape_vec((n, 128), flat).unwrap();
        let r = root_sift(&d, 1e-7);
        for (src, row) in d.rows().into_iter().zip(r.rows()) {
            prop_assert!(row.iter().all(|v| *v >= 0.0));
            if src.iter().any(|v| *v > 1e-3) {
                let sq: f32 = row.iter().map(|v| v * v).sum();
                prop_assert!((sq - 1.0).abs() < 1e-3);
            }
        }
    }
}
