//! Separable filters on `f32` planes indexed `[row, col]`.

use image::GrayImage;
use ndarray::{Array2, ArrayView2};

/// Mirror an index into `[0, n)` without repeating the edge sample.
pub fn reflect_101(mut i: isize, n: isize) -> usize {
    if n == 1 {
        return 0;
    }
    loop {
        if i < 0 {
            i = -i;
        } else if i >= n {
            i = 2 * n - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Normalized 1D Gaussian kernel with a radius of about 4 sigma.
fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    let size = ((sigma * 8.0 + 1.0).round() as usize) | 1;
    let radius = (size / 2) as f64;
    let scale = -0.5 / (sigma * sigma);
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - radius;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Separable Gaussian blur with mirrored borders.
pub fn gaussian_blur(input: ArrayView2<f32>, sigma: f64) -> Array2<f32> {
    let (height, width) = input.dim();
    if sigma <= 0.0 || height == 0 || width == 0 {
        return input.to_owned();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    let temp = Array2::from_shape_fn((height, width), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let sx = reflect_101(x as isize + k as isize - radius, width as isize);
                input[[y, sx]] * w
            })
            .sum::<f32>()
    });

    Array2::from_shape_fn((height, width), |(y, x)| {
        kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let sy = reflect_101(y as isize + k as isize - radius, height as isize);
                temp[[sy, x]] * w
            })
            .sum::<f32>()
    })
}

/// Converts an 8-bit image to an `f32` plane in `[0, 255]`, indexed `[row, col]`.
pub fn to_plane(img: &GrayImage) -> Array2<f32> {
    let (width, height) = img.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        img.get_pixel(x as u32, y as u32)[0] as f32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_blur_spreads_impulse() {
        let input = Array2::from_shape_fn((9, 9), |(y, x)| if y == 4 && x == 4 { 255.0 } else { 0.0 });
        let result = gaussian_blur(input.view(), 0.8);
        assert_eq!(result.dim(), (9, 9));
        assert!(result[[4, 4]] > 0.0 && result[[4, 4]] < 255.0);
        assert!(result[[4, 5]] > 0.0);
        assert_relative_eq!(result.sum(), 255.0, epsilon = 1e-2);
    }

    #[test]
    fn test_blur_keeps_constant() {
        let input = Array2::from_elem((7, 5), 42.0f32);
        let result = gaussian_blur(input.view(), 3.0);
        for v in result.iter() {
            assert_relative_eq!(*v, 42.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(-7, 5), 1);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn test_to_plane_layout() {
        let img = GrayImage::from_fn(3, 2, |x, y| image::Luma([(x + 10 * y) as u8]));
        let plane = to_plane(&img);
        assert_eq!(plane.dim(), (2, 3));
        assert_eq!(plane[[1, 2]], 12.0);
    }
}
