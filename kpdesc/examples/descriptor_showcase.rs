use std::time::Instant;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use kpdesc::{DescriptorMethod, ExtractorBuilder};

fn synthetic_scene() -> DynamicImage {
    let img = RgbImage::from_fn(480, 360, |x, y| {
        let (cx, cy) = (x % 60, y % 60);
        if (14..40).contains(&cx) && (18..36).contains(&cy) {
            Rgb([210, 80, 40])
        } else {
            Rgb([25, 35, (x / 4) as u8])
        }
    });
    DynamicImage::ImageRgb8(img)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let img = synthetic_scene();
    println!("Image: {}x{}", img.width(), img.height());

    let extractor = ExtractorBuilder::new().preset_parallel().build()?;
    println!("{}\n", extractor.config().summary());

    // Left half only
    let mask = GrayImage::from_fn(img.width(), img.height(), |x, _| {
        Luma([if x < img.width() / 2 { 255 } else { 0 }])
    });

    println!("{:<10} {:>8} {:>8} {:>8} {:>10}", "method", "rows", "cols", "masked", "time");
    println!("{}", "-".repeat(48));
    for method in DescriptorMethod::ALL {
        let start = Instant::now();
        let desc = extractor.extract_method(&img, None, method)?;
        let elapsed = start.elapsed();
        let masked = extractor.extract_method(&img, Some(&mask), method)?;

        let (rows, cols) = desc.as_ref().map_or((0, 0), |d| d.shape());
        let masked_rows = masked.as_ref().map_or(0, |d| d.rows());
        println!("{:<10} {:>8} {:>8} {:>8} {:>10.2?}", method, rows, cols, masked_rows, elapsed);
    }

    let legacy = extractor.extract_legacy_orb(&img, None)?;
    println!("\nlegacy orb: {} rows", legacy.map_or(0, |d| d.rows()));
    Ok(())
}
