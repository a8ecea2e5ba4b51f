//! Orientation layers of the image gradient, smoothed at increasing scales.

use image::GrayImage;
use kpdesc_core::filter::{gaussian_blur, to_plane};
use ndarray::{Array2, ArrayView2, Zip};
use rayon::prelude::*;

/// Blur assumed in the image after pre-smoothing.
pub const SIGMA_INIT: f64 = 1.6;
/// Blur assumed in the raw input.
const SIGMA_INPUT: f64 = 0.5;

/// Central differences with replicated borders: `(dx, dy)`.
pub fn gradients(plane: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
    let (rows, cols) = plane.dim();
    let dx = Array2::from_shape_fn((rows, cols), |(y, x)| {
        let l = plane[[y, x.saturating_sub(1)]];
        let r = plane[[y, (x + 1).min(cols - 1)]];
        (r - l) * 0.5
    });
    let dy = Array2::from_shape_fn((rows, cols), |(y, x)| {
        let u = plane[[y.saturating_sub(1), x]];
        let d = plane[[(y + 1).min(rows - 1), x]];
        (d - u) * 0.5
    });
    (dx, dy)
}

/// Smoothing sigma of each ring: ring `r` of `q_radius` rings in a pattern of
/// `radius` pixels uses `(r + 1) * radius / q_radius / 2`.
pub fn cube_sigmas(radius: f32, q_radius: usize) -> Vec<f64> {
    let step = radius as f64 / q_radius as f64;
    (0..q_radius).map(|r| (r + 1) as f64 * step / 2.0).collect()
}

/// `cubes[r][h]` is orientation layer `h` smoothed for ring `r`.
#[derive(Debug, Clone)]
pub struct SmoothedLayers {
    cubes: Vec<Vec<Array2<f32>>>,
}

impl SmoothedLayers {
    /// Builds `q_hist` orientation layers of `img` (scaled to `[0, 1]`) and
    /// smooths them for each ring, each cube blurred from the previous one.
    pub fn build(img: &GrayImage, radius: f32, q_radius: usize, q_hist: usize) -> Self {
        let plane = to_plane(img).mapv(|v| v / 255.0);
        let plane = gaussian_blur(plane.view(), (SIGMA_INIT * SIGMA_INIT - SIGMA_INPUT * SIGMA_INPUT).sqrt());
        let (dx, dy) = gradients(plane.view());

        let layers: Vec<Array2<f32>> = (0..q_hist)
            .into_par_iter()
            .map(|h| {
                let theta = h as f32 * 2.0 * std::f32::consts::PI / q_hist as f32;
                let (sin_t, cos_t) = theta.sin_cos();
                let mut layer = Array2::zeros(dx.dim());
                Zip::from(&mut layer).and(&dx).and(&dy).for_each(|l, &gx, &gy| {
                    *l = (cos_t * gx + sin_t * gy).max(0.0);
                });
                layer
            })
            .collect();

        let sigmas = cube_sigmas(radius, q_radius);
        let mut cubes: Vec<Vec<Array2<f32>>> = Vec::with_capacity(q_radius);
        for (r, &sigma) in sigmas.iter().enumerate() {
            let (source, step) = match cubes.last() {
                Some(prev) => (prev, (sigma * sigma - sigmas[r - 1] * sigmas[r - 1]).sqrt()),
                None => (&layers, sigma),
            };
            let cube = source.par_iter().map(|l| gaussian_blur(l.view(), step)).collect();
            cubes.push(cube);
        }
        log::trace!("DAISY smoothed {} cubes of {} layers", cubes.len(), q_hist);
        Self { cubes }
    }

    pub fn n_cubes(&self) -> usize {
        self.cubes.len()
    }

    pub fn cube(&self, r: usize) -> &[Array2<f32>] {
        &self.cubes[r]
    }
}

/// Bilinear sample of `plane` at `(x, y)`. `None` outside the interpolation
/// domain.
pub fn sample(plane: &Array2<f32>, x: f32, y: f32) -> Option<f32> {
    let (rows, cols) = plane.dim();
    if x < 0.0 || y < 0.0 || x >= (cols - 1) as f32 || y >= (rows - 1) as f32 {
        return None;
    }
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);
    let top = plane[[y0, x0]] * (1.0 - fx) + plane[[y0, x0 + 1]] * fx;
    let bottom = plane[[y0 + 1, x0]] * (1.0 - fx) + plane[[y0 + 1, x0 + 1]] * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}
