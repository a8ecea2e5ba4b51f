//! Gaussian and difference-of-Gaussian pyramids on `f32` planes.

use image::GrayImage;
use kpdesc_core::filter::{gaussian_blur, to_plane};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Blur assumed to be present in the input image.
pub const INIT_SIGMA: f64 = 0.5;

/// Source coordinate and weight of the bilinear tap for destination index `d`.
fn linear_tap(d: usize, inv_scale: f32, n: usize) -> (usize, usize, f32) {
    let s = (d as f32 + 0.5) * inv_scale - 0.5;
    let mut s0 = s.floor();
    let mut f = s - s0;
    if s0 < 0.0 {
        s0 = 0.0;
        f = 0.0;
    }
    let mut i0 = s0 as usize;
    if i0 >= n - 1 {
        i0 = n - 1;
        f = 0.0;
    }
    (i0, (i0 + 1).min(n - 1), f)
}

/// Doubles the plane size with bilinear interpolation.
pub fn upsample_2x(input: ArrayView2<f32>) -> Array2<f32> {
    let (height, width) = input.dim();
    Array2::from_shape_fn((height * 2, width * 2), |(y, x)| {
        let (y0, y1, fy) = linear_tap(y, 0.5, height);
        let (x0, x1, fx) = linear_tap(x, 0.5, width);
        let top = input[[y0, x0]] * (1.0 - fx) + input[[y0, x1]] * fx;
        let bottom = input[[y1, x0]] * (1.0 - fx) + input[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Keeps every other row and column.
pub fn downsample_half(input: ArrayView2<f32>) -> Array2<f32> {
    let (height, width) = input.dim();
    let (h, w) = ((height / 2).max(1), (width / 2).max(1));
    Array2::from_shape_fn((h, w), |(y, x)| input[[(2 * y).min(height - 1), (2 * x).min(width - 1)]])
}

/// Octave count that keeps the coarsest octave at a few pixels.
pub fn default_octave_count(base_width: usize, base_height: usize) -> usize {
    let min_dim = base_width.min(base_height).max(1) as f64;
    ((min_dim.log2() - 2.0).round() as i64 + 1).max(1) as usize
}

/// Blur increments between consecutive Gaussian layers of an octave.
pub fn layer_sigmas(sigma: f64, n_octave_layers: usize) -> Vec<f64> {
    let n = n_octave_layers + 3;
    let k = 2f64.powf(1.0 / n_octave_layers as f64);
    let mut sig = vec![sigma; n];
    for (i, s) in sig.iter_mut().enumerate().skip(1) {
        let sig_prev = k.powi(i as i32 - 1) * sigma;
        let sig_total = sig_prev * k;
        *s = (sig_total * sig_total - sig_prev * sig_prev).sqrt();
    }
    sig
}

/// Gaussian scale space with `n_octave_layers + 3` images per octave and
/// their `n_octave_layers + 2` differences.
#[derive(Debug, Clone)]
pub struct ScaleSpace {
    gaussians: Vec<Array2<f32>>,
    dogs: Vec<Array2<f32>>,
    n_octaves: usize,
    n_octave_layers: usize,
    first_octave: i32,
}

impl ScaleSpace {
    /// Builds the pyramid.
    ///
    /// `first_octave == -1` doubles the image before blurring, any other value
    /// is treated as 0. `n_octaves` defaults to [`default_octave_count`].
    pub fn build(
        img: &GrayImage,
        n_octave_layers: usize,
        sigma: f64,
        first_octave: i32,
        n_octaves: Option<usize>,
    ) -> Self {
        let plane = to_plane(img);
        let (base, first_octave) = if first_octave < 0 {
            let sig_diff = (sigma * sigma - INIT_SIGMA * INIT_SIGMA * 4.0).max(0.01).sqrt();
            (gaussian_blur(upsample_2x(plane.view()).view(), sig_diff), -1)
        } else {
            let sig_diff = (sigma * sigma - INIT_SIGMA * INIT_SIGMA).max(0.01).sqrt();
            (gaussian_blur(plane.view(), sig_diff), 0)
        };

        let (rows, cols) = base.dim();
        let n_octaves = n_octaves.unwrap_or_else(|| default_octave_count(cols, rows)).max(1);
        let sig = layer_sigmas(sigma, n_octave_layers);
        let per_octave = n_octave_layers + 3;

        let mut gaussians: Vec<Array2<f32>> = Vec::with_capacity(n_octaves * per_octave);
        for o in 0..n_octaves {
            for i in 0..per_octave {
                let layer = if o == 0 && i == 0 {
                    base.clone()
                } else if i == 0 {
                    downsample_half(gaussians[(o - 1) * per_octave + n_octave_layers].view())
                } else {
                    gaussian_blur(gaussians[o * per_octave + i - 1].view(), sig[i])
                };
                gaussians.push(layer);
            }
        }

        let dog_pairs: Vec<(usize, usize)> = (0..n_octaves)
            .flat_map(|o| (0..n_octave_layers + 2).map(move |i| (o, i)))
            .collect();
        let dogs = dog_pairs
            .into_par_iter()
            .map(|(o, i)| {
                let src = o * per_octave + i;
                &gaussians[src + 1] - &gaussians[src]
            })
            .collect();

        log::trace!(
            "SIFT scale space: {} octaves x {} layers, base {}x{}",
            n_octaves,
            per_octave,
            cols,
            rows
        );

        Self {
            gaussians,
            dogs,
            n_octaves,
            n_octave_layers,
            first_octave,
        }
    }

    pub fn n_octaves(&self) -> usize {
        self.n_octaves
    }

    pub fn n_octave_layers(&self) -> usize {
        self.n_octave_layers
    }

    pub fn first_octave(&self) -> i32 {
        self.first_octave
    }

    /// Gaussian image `layer` of pyramid octave `octave` (0 = base).
    pub fn gaussian(&self, octave: usize, layer: usize) -> ArrayView2<'_, f32> {
        self.gaussians[octave * (self.n_octave_layers + 3) + layer].view()
    }

    pub fn dog(&self, octave: usize, layer: usize) -> ArrayView2<'_, f32> {
        self.dogs[octave * (self.n_octave_layers + 2) + layer].view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn test_resampling_sizes() {
        let input = Array2::from_shape_fn((4, 6), |(y, x)| (y * 6 + x) as f32);
        let up = upsample_2x(input.view());
        assert_eq!(up.dim(), (8, 12));
        assert_relative_eq!(up[[0, 0]], 0.0);
        assert_relative_eq!(up[[7, 11]], 23.0);
        let down = downsample_half(input.view());
        assert_eq!(down.dim(), (2, 3));
        assert_eq!(down[[1, 2]], input[[2, 4]]);
    }

    #[test]
    fn test_octave_count() {
        assert_eq!(default_octave_count(512, 512), 8);
        assert_eq!(default_octave_count(1, 1), 1);
    }

    #[test]
    fn test_scale_space_layout() {
        let img = GrayImage::from_fn(32, 24, |x, y| Luma([((x * 5 + y * 3) % 256) as u8]));
        let space = ScaleSpace::build(&img, 3, 1.6, -1, None);
        assert_eq!(space.first_octave(), -1);
        assert_eq!(space.gaussian(0, 0).dim(), (48, 64));
        assert_eq!(space.gaussian(1, 0).dim(), (24, 32));
        assert_eq!(space.dog(0, 4).dim(), (48, 64));
        assert_eq!(space.n_octaves(), default_octave_count(64, 48));
    }
}
