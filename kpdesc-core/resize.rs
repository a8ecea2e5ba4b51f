//! Area-interpolation resize for 8-bit grayscale images.

use image::{GrayImage, Luma};

/// Source taps `(index, weight)` of one destination pixel along one axis.
type Taps = Vec<(usize, f32)>;

/// Per-axis weights that average the source cells covered by each
/// destination cell. Requires `src_len >= dst_len`.
fn area_taps(src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let fs1 = d as f64 * scale;
            let fs2 = fs1 + scale;
            let cell_width = scale.min(src_len as f64 - fs1);

            let s2 = (fs2.floor() as usize).min(src_len - 1);
            let s1 = (fs1.ceil() as usize).min(s2);
            let mut taps = Vec::with_capacity(scale.ceil() as usize + 2);

            if s1 as f64 - fs1 > 1e-3 {
                taps.push((s1 - 1, ((s1 as f64 - fs1) / cell_width) as f32));
            }
            for s in s1..s2 {
                taps.push((s, (1.0 / cell_width) as f32));
            }
            if fs2 - s2 as f64 > 1e-3 {
                let w = (fs2 - s2 as f64).min(1.0).min(cell_width) / cell_width;
                taps.push((s2, w as f32));
            }
            taps
        })
        .collect()
}

/// Per-axis linear taps used when area mode has to enlarge an axis.
fn linear_area_taps(src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    let inv_scale = dst_len as f64 / src_len as f64;
    (0..dst_len)
        .map(|d| {
            let mut s = (d as f64 * scale).floor() as i64;
            let mut f = (d + 1) as f64 - (s + 1) as f64 * inv_scale;
            f = if f <= 0.0 { 0.0 } else { f - f.floor() };
            if s < 0 {
                s = 0;
                f = 0.0;
            }
            if s + 1 >= src_len as i64 {
                s = src_len as i64 - 1;
                f = 0.0;
            }
            let s = s as usize;
            if f == 0.0 {
                vec![(s, 1.0)]
            } else {
                vec![(s, (1.0 - f) as f32), (s + 1, f as f32)]
            }
        })
        .collect()
}

/// Resizes `src` to `width` x `height` with area interpolation.
///
/// When neither axis grows, every output pixel is the area-weighted mean of
/// the source pixels its footprint covers. Otherwise both axes use linear
/// weights derived from the cell overlap. Results are rounded to the nearest
/// integer.
pub fn resize_area(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = src.dimensions();
    if (src_w, src_h) == (width, height) {
        return src.clone();
    }
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let shrinking = src_w >= width && src_h >= height;
    let (x_taps, y_taps) = if shrinking {
        (
            area_taps(src_w as usize, width as usize),
            area_taps(src_h as usize, height as usize),
        )
    } else {
        (
            linear_area_taps(src_w as usize, width as usize),
            linear_area_taps(src_h as usize, height as usize),
        )
    };

    // horizontal pass into f32 rows, then vertical
    let rows: Vec<Vec<f32>> = (0..src_h)
        .map(|y| {
            x_taps
                .iter()
                .map(|taps| {
                    taps.iter()
                        .map(|&(sx, w)| src.get_pixel(sx as u32, y)[0] as f32 * w)
                        .sum()
                })
                .collect()
        })
        .collect();

    GrayImage::from_fn(width, height, |x, y| {
        let v: f32 = y_taps[y as usize]
            .iter()
            .map(|&(sy, w)| rows[sy][x as usize] * w)
            .sum();
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_shrink_is_block_mean() {
        let src = GrayImage::from_fn(4, 4, |x, y| Luma([((x / 2) * 100 + (y / 2) * 20 + (x % 2) * 2) as u8]));
        let dst = resize_area(&src, 2, 2);
        assert_eq!(dst.get_pixel(0, 0)[0], 1);
        assert_eq!(dst.get_pixel(1, 0)[0], 101);
        assert_eq!(dst.get_pixel(1, 1)[0], 121);
    }

    #[test]
    fn test_fractional_shrink_weights_sum_to_one() {
        for (src, dst) in [(10, 3), (7, 4), (300, 256), (256, 256)] {
            if src == dst {
                continue;
            }
            for taps in area_taps(src, dst) {
                let sum: f32 = taps.iter().map(|t| t.1).sum();
                assert!((sum - 1.0).abs() < 1e-4, "{src}->{dst}: {sum}");
            }
        }
    }

    #[test]
    fn test_constant_image_survives_any_resize() {
        let src = GrayImage::from_pixel(37, 91, Luma([77]));
        for (w, h) in [(256, 256), (10, 10), (37, 300)] {
            let dst = resize_area(&src, w, h);
            assert_eq!(dst.dimensions(), (w, h));
            assert!(dst.pixels().all(|p| p[0] == 77));
        }
    }

    #[test]
    fn test_upscale_uses_linear_weights() {
        let src = GrayImage::from_fn(2, 1, |x, _| Luma([(x * 100) as u8]));
        let dst = resize_area(&src, 4, 1);
        let row: Vec<u8> = (0..4).map(|x| dst.get_pixel(x, 0)[0]).collect();
        assert_eq!(row, vec![0, 0, 100, 100]);
    }
}
