use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use kpdesc::preprocess::prepare;
use kpdesc::{DescriptorMethod, ExtractorBuilder, CANONICAL_SIZE};

/// Rectangles of varying brightness over a horizontal gradient
fn create_benchmark_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let gradient = (x * 60 / width) as u8;
        let (cx, cy) = (x % 48, y % 48);
        if (10..30).contains(&cx) && (14..28).contains(&cy) {
            let v = 120 + ((x / 48 + y / 48) % 4) as u8 * 30;
            Rgb([v, v / 2, gradient])
        } else {
            let noise = ((x + 3 * y) % 7) as u8;
            Rgb([30 + gradient, 40 + noise, 50])
        }
    });
    DynamicImage::ImageRgb8(img)
}

/// Benchmark every dispatch method on the same input
fn bench_methods(c: &mut Criterion) {
    let img = create_benchmark_image(640, 480);
    let extractor = ExtractorBuilder::new().build().unwrap();

    let mut group = c.benchmark_group("extract");
    group.sample_size(10);
    for method in DescriptorMethod::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(method), &method, |b, &method| {
            b.iter(|| black_box(extractor.extract_method(black_box(&img), None, method).unwrap()))
        });
    }
    group.finish();
}

/// Benchmark the canonical conversion alone
fn bench_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    for &(width, height) in &[(128, 128), (640, 480), (1920, 1080)] {
        let img = create_benchmark_image(width, height);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{width}x{height}")), &img, |b, img| {
            b.iter(|| black_box(prepare(black_box(img), None, CANONICAL_SIZE).unwrap()))
        });
    }
    group.finish();
}

/// Single worker against one per CPU
fn bench_threads(c: &mut Criterion) {
    let img = create_benchmark_image(640, 480);
    let single = ExtractorBuilder::new().build().unwrap();
    let parallel = ExtractorBuilder::new().preset_parallel().build().unwrap();

    let mut group = c.benchmark_group("threads");
    group.sample_size(10);
    group.bench_function("sift_single", |b| {
        b.iter(|| black_box(single.extract_method(&img, None, DescriptorMethod::Sift).unwrap()))
    });
    group.bench_function("sift_parallel", |b| {
        b.iter(|| black_box(parallel.extract_method(&img, None, DescriptorMethod::Sift).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_methods, bench_preprocessing, bench_threads);
criterion_main!(benches);
