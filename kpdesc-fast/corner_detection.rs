use image::GrayImage;
use rayon::prelude::*;

use crate::types::Corner;
use crate::utils::{circle_mask, has_contiguous_arc};

/// Corner detection algorithms (FAST and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Radius of the Bresenham circle; pixels closer to the edge are never tested.
    pub const BORDER: u32 = 3;

    /// Length of the contiguous arc (FAST-9/16).
    pub const ARC_LENGTH: usize = 9;

    /// Run the segment test on every pixel, one row per rayon task.
    ///
    /// Corners are returned in row-major order without suppression.
    pub fn detect_corners(img: &GrayImage, threshold: u8) -> Vec<Corner> {
        let (width, height) = img.dimensions();
        if width <= 2 * Self::BORDER || height <= 2 * Self::BORDER {
            return Vec::new();
        }

        let rows: Vec<Vec<Corner>> = (Self::BORDER..height - Self::BORDER)
            .into_par_iter()
            .map(|y| {
                (Self::BORDER..width - Self::BORDER)
                    .filter_map(|x| {
                        Self::corner_score(img, x, y, threshold).map(|score| Corner { x, y, score })
                    })
                    .collect()
            })
            .collect();

        rows.into_iter().flatten().collect()
    }

    /// Score of `(x, y)` if it is a FAST corner for `threshold`.
    ///
    /// The score is the largest threshold at which the pixel would still be
    /// a corner. The caller must keep `(x, y)` at least [`Self::BORDER`] pixels
    /// away from the image edge.
    pub fn corner_score(img: &GrayImage, x: u32, y: u32, threshold: u8) -> Option<u8> {
        let diffs = Self::circle_differences(img, x, y);
        let t = threshold as i16;

        let bright = circle_mask(&diffs, |d| d > t);
        let dark = circle_mask(&diffs, |d| d < -t);
        if !has_contiguous_arc(bright, Self::ARC_LENGTH) && !has_contiguous_arc(dark, Self::ARC_LENGTH)
        {
            return None;
        }

        // Best arc: the largest value v such that 9 contiguous differences all exceed v.
        let mut best = 0i16;
        for start in 0..16 {
            let mut brightest = i16::MAX;
            let mut darkest = i16::MAX;
            for k in 0..Self::ARC_LENGTH {
                let d = diffs[(start + k) % 16];
                brightest = brightest.min(d);
                darkest = darkest.min(-d);
            }
            best = best.max(brightest).max(darkest);
        }

        // best > t >= 0 here, so best - 1 fits in a u8
        Some((best - 1) as u8)
    }

    fn circle_differences(img: &GrayImage, x: u32, y: u32) -> [i16; 16] {
        let center = img.get_pixel(x, y)[0] as i16;
        let mut diffs = [0i16; 16];
        for (d, &(dx, dy)) in diffs.iter_mut().zip(Self::FAST_OFFSETS.iter()) {
            let px = (x as i32 + dx) as u32;
            let py = (y as i32 + dy) as u32;
            *d = img.get_pixel(px, py)[0] as i16 - center;
        }
        diffs
    }

    /// Harris corner response over a `block_size` window centered on `(x, y)`.
    ///
    /// Gradients use the 3x3 Sobel kernels. The response is normalized so
    /// that it does not depend on the window size or the 8-bit range.
    /// Returns 0 when the window plus gradient support leaves the image.
    pub fn harris_response(img: &GrayImage, x: u32, y: u32, block_size: u32, k: f32) -> f32 {
        let (width, height) = img.dimensions();
        let r = (block_size / 2) as i64;
        let (cx, cy) = (x as i64, y as i64);
        if cx - r < 1
            || cy - r < 1
            || cx - r + block_size as i64 >= width as i64
            || cy - r + block_size as i64 >= height as i64
        {
            return 0.0;
        }

        let mut ixx = 0i64;
        let mut ixy = 0i64;
        let mut iyy = 0i64;

        for wy in 0..block_size as i64 {
            for wx in 0..block_size as i64 {
                let (gx, gy) = Self::compute_gradients(img, (cx - r + wx) as u32, (cy - r + wy) as u32);
                ixx += gx * gx;
                ixy += gx * gy;
                iyy += gy * gy;
            }
        }

        let scale = 1.0 / ((1 << 2) as f64 * block_size as f64 * 255.0);
        let scale_sq_sq = scale * scale * scale * scale;
        let (a, b, c) = (ixx as f64, iyy as f64, ixy as f64);
        let response = (a * b - c * c - k as f64 * (a + b) * (a + b)) * scale_sq_sq;
        response as f32
    }

    /// Compute image gradients using Sobel operator
    fn compute_gradients(img: &GrayImage, x: u32, y: u32) -> (i64, i64) {
        let p = |dx: i32, dy: i32| img.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i64;

        // Sobel X kernel: [-1, 0, 1; -2, 0, 2; -1, 0, 1]
        let gx = (p(1, 0) - p(-1, 0)) * 2 + (p(1, -1) - p(-1, -1)) + (p(1, 1) - p(-1, 1));
        // Sobel Y kernel: [-1, -2, -1; 0, 0, 0; 1, 2, 1]
        let gy = (p(0, 1) - p(0, -1)) * 2 + (p(-1, 1) - p(-1, -1)) + (p(1, 1) - p(1, -1));

        (gx, gy)
    }
}
