//! Dominant orientation and Haar-wavelet descriptors of SURF keypoints.

use image::{imageops, GrayImage, Luma};
use kpdesc_core::KeyPoint;

use crate::hessian::{haar_response, resize_haar_pattern, Integral, HAAR_SIZE0};

/// Radius, in units of the keypoint scale, of the orientation samples.
pub const ORI_RADIUS: i32 = 6;
/// Angular step of the sliding orientation window, degrees.
pub const ORI_SEARCH_INC: i32 = 5;
/// Width of the sliding orientation window, degrees.
pub const ORI_WIN: i32 = 60;
pub const ORI_SIGMA: f64 = 2.5;
/// Side of the resampled descriptor patch.
pub const PATCH_SZ: usize = 20;
pub const DESC_SIGMA: f64 = 3.3;
/// Spatial cells per side.
pub const DESCR_WIDTH: usize = 4;

const ORI_DX: [[i32; 5]; 2] = [[0, 0, 2, 4, -1], [2, 0, 4, 4, 1]];
const ORI_DY: [[i32; 5]; 2] = [[0, 0, 4, 2, 1], [0, 2, 4, 4, -1]];

/// Normalized 1D Gaussian of `n` taps centered at `(n - 1) / 2`.
fn gaussian_kernel(n: usize, sigma: f64) -> Vec<f32> {
    let c = (n as f64 - 1.0) * 0.5;
    let raw: Vec<f64> = (0..n)
        .map(|i| (-(i as f64 - c).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.iter().map(|v| (v / total) as f32).collect()
}

fn angle_deg(y: f32, x: f32) -> f32 {
    let a = y.atan2(x).to_degrees();
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

/// Sample grid and weights shared by every keypoint.
#[derive(Debug, Clone)]
pub struct SurfSampler {
    ori_samples: Vec<(i32, i32)>,
    ori_weights: Vec<f32>,
    desc_weights: Vec<f32>,
}

impl Default for SurfSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfSampler {
    pub fn new() -> Self {
        let g_ori = gaussian_kernel(2 * ORI_RADIUS as usize + 1, ORI_SIGMA);
        let mut ori_samples = Vec::new();
        let mut ori_weights = Vec::new();
        for i in -ORI_RADIUS..=ORI_RADIUS {
            for j in -ORI_RADIUS..=ORI_RADIUS {
                if i * i + j * j <= ORI_RADIUS * ORI_RADIUS {
                    ori_samples.push((i, j));
                    ori_weights.push(g_ori[(i + ORI_RADIUS) as usize] * g_ori[(j + ORI_RADIUS) as usize]);
                }
            }
        }

        let g_desc = gaussian_kernel(PATCH_SZ, DESC_SIGMA);
        let desc_weights = (0..PATCH_SZ * PATCH_SZ)
            .map(|k| g_desc[k / PATCH_SZ] * g_desc[k % PATCH_SZ])
            .collect();

        Self {
            ori_samples,
            ori_weights,
            desc_weights,
        }
    }

    /// Number of orientation samples inside the disc.
    pub fn orientation_samples(&self) -> usize {
        self.ori_samples.len()
    }

    /// Dominant orientation in degrees, from the strongest sum of Haar
    /// responses in a sliding 60 degree window. `None` when the keypoint is
    /// too close to the border for any sample.
    pub fn orientation(&self, sum: &Integral, kp: &KeyPoint) -> Option<f32> {
        let s = kp.size * 1.2 / HAAR_SIZE0 as f32;
        let grad_wav_size = 2 * (2.0 * s).round() as i32;
        let (width, height) = (sum.width() as i32, sum.height() as i32);
        if height < grad_wav_size || width < grad_wav_size || grad_wav_size <= 0 {
            return None;
        }
        let dx_t = resize_haar_pattern(&ORI_DX, 4, grad_wav_size as u32);
        let dy_t = resize_haar_pattern(&ORI_DY, 4, grad_wav_size as u32);

        let offset = (grad_wav_size - 1) as f32 / 2.0;
        let mut responses = Vec::with_capacity(self.ori_samples.len());
        for (&(i, j), &w) in self.ori_samples.iter().zip(&self.ori_weights) {
            let x = (kp.x + i as f32 * s - offset).round() as i32;
            let y = (kp.y + j as f32 * s - offset).round() as i32;
            if y < 0 || y >= height - grad_wav_size || x < 0 || x >= width - grad_wav_size {
                continue;
            }
            let vx = haar_response(sum, x as u32, y as u32, &dx_t) * w;
            let vy = haar_response(sum, x as u32, y as u32, &dy_t) * w;
            responses.push((vx, vy, angle_deg(vy, vx)));
        }
        if responses.is_empty() {
            return None;
        }

        let mut best = (0f32, 0f32);
        let mut best_mod = 0f32;
        for start in (0..360).step_by(ORI_SEARCH_INC as usize) {
            let (mut sx, mut sy) = (0f32, 0f32);
            for &(vx, vy, angle) in &responses {
                let d = (angle.round() as i32 - start).abs();
                if d < ORI_WIN / 2 || d > 360 - ORI_WIN / 2 {
                    sx += vx;
                    sy += vy;
                }
            }
            let m = sx * sx + sy * sy;
            if m > best_mod {
                best_mod = m;
                best = (sx, sy);
            }
        }
        Some(angle_deg(-best.1, best.0))
    }

    /// Rotated, resampled patch of side `PATCH_SZ + 1` around `kp` with the
    /// sampling grid turned by `dir` degrees.
    fn patch(&self, img: &GrayImage, kp: &KeyPoint, dir: f32) -> GrayImage {
        let s = kp.size * 1.2 / HAAR_SIZE0 as f32;
        let win_size = (((PATCH_SZ + 1) as f32 * s) as usize).max(1);
        let (sin_dir, cos_dir) = {
            let (s, c) = dir.to_radians().sin_cos();
            (-s, c)
        };
        let (ncols1, nrows1) = (img.width() as i64 - 1, img.height() as i64 - 1);
        let win_offset = -((win_size - 1) as f32) / 2.0;
        let mut start_x = kp.x + win_offset * cos_dir + win_offset * sin_dir;
        let mut start_y = kp.y - win_offset * sin_dir + win_offset * cos_dir;

        let mut win = GrayImage::new(win_size as u32, win_size as u32);
        for i in 0..win_size {
            let (mut px, mut py) = (start_x as f64, start_y as f64);
            for j in 0..win_size {
                let (ix, iy) = (px.floor() as i64, py.floor() as i64);
                let value = if ix >= 0 && ix < ncols1 && iy >= 0 && iy < nrows1 {
                    let (a, b) = ((px - ix as f64) as f32, (py - iy as f64) as f32);
                    let at = |x: i64, y: i64| img.get_pixel(x as u32, y as u32)[0] as f32;
                    let v = at(ix, iy) * (1.0 - a) * (1.0 - b)
                        + at(ix + 1, iy) * a * (1.0 - b)
                        + at(ix, iy + 1) * (1.0 - a) * b
                        + at(ix + 1, iy + 1) * a * b;
                    v.round() as u8
                } else {
                    let x = (px.round() as i64).clamp(0, ncols1);
                    let y = (py.round() as i64).clamp(0, nrows1);
                    img.get_pixel(x as u32, y as u32)[0]
                };
                win.put_pixel(j as u32, i as u32, Luma([value]));
                px += cos_dir as f64;
                py -= sin_dir as f64;
            }
            start_x += sin_dir;
            start_y += cos_dir;
        }

        let side = (PATCH_SZ + 1) as u32;
        if win.dimensions() == (side, side) {
            win
        } else {
            imageops::resize(&win, side, side, imageops::FilterType::Triangle)
        }
    }

    /// 64 (or 128 when `extended`) element descriptor of `kp` oriented along
    /// `dir` degrees, scaled to unit length.
    pub fn describe(&self, img: &GrayImage, kp: &KeyPoint, dir: f32, extended: bool) -> Vec<f32> {
        let patch = self.patch(img, kp, dir);
        let p = |x: usize, y: usize| patch.get_pixel(x as u32, y as u32)[0] as f32;

        let mut dx = vec![0f32; PATCH_SZ * PATCH_SZ];
        let mut dy = vec![0f32; PATCH_SZ * PATCH_SZ];
        for i in 0..PATCH_SZ {
            for j in 0..PATCH_SZ {
                let w = self.desc_weights[i * PATCH_SZ + j];
                dx[i * PATCH_SZ + j] = (p(j + 1, i) - p(j, i) + p(j + 1, i + 1) - p(j, i + 1)) * w;
                dy[i * PATCH_SZ + j] = (p(j, i + 1) - p(j, i) + p(j + 1, i + 1) - p(j + 1, i)) * w;
            }
        }

        let cell = PATCH_SZ / DESCR_WIDTH;
        let per_cell = if extended { 8 } else { 4 };
        let mut desc = Vec::with_capacity(DESCR_WIDTH * DESCR_WIDTH * per_cell);
        for ci in 0..DESCR_WIDTH {
            for cj in 0..DESCR_WIDTH {
                let mut acc = [0f32; 8];
                for y in ci * cell..(ci + 1) * cell {
                    for x in cj * cell..(cj + 1) * cell {
                        let (tx, ty) = (dx[y * PATCH_SZ + x], dy[y * PATCH_SZ + x]);
                        if extended {
                            if ty < 0.0 {
                                acc[0] += tx;
                                acc[1] += tx.abs();
                            } else {
                                acc[2] += tx;
                                acc[3] += tx.abs();
                            }
                            if tx < 0.0 {
                                acc[4] += ty;
                                acc[5] += ty.abs();
                            } else {
                                acc[6] += ty;
                                acc[7] += ty.abs();
                            }
                        } else {
                            acc[0] += tx;
                            acc[1] += ty;
                            acc[2] += tx.abs();
                            acc[3] += ty.abs();
                        }
                    }
                }
                desc.extend_from_slice(&acc[..per_cell]);
            }
        }

        let norm = desc.iter().map(|v| v * v).sum::<f32>().sqrt();
        let scale = 1.0 / (norm + f32::EPSILON);
        desc.iter_mut().for_each(|v| *v *= scale);
        desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hessian::integral;

    fn ramp_x() -> GrayImage {
        GrayImage::from_fn(80, 80, |x, _| Luma([(x * 3) as u8]))
    }

    #[test]
    fn test_orientation_sample_count() {
        assert_eq!(SurfSampler::new().orientation_samples(), 113);
    }

    #[test]
    fn test_gaussian_kernel_sums_to_one() {
        let k = gaussian_kernel(20, 3.3);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[9] - k[10]).abs() < 1e-7);
    }

    #[test]
    fn test_horizontal_ramp_orientation() {
        let img = ramp_x();
        let sampler = SurfSampler::new();
        let kp = KeyPoint::new(40.0, 40.0, 15.0);
        let angle = sampler.orientation(&integral(&img), &kp).unwrap();
        assert!(angle < 1.0 || angle > 359.0, "angle {angle}");
    }

    #[test]
    fn test_vertical_ramp_orientation() {
        let img = GrayImage::from_fn(80, 80, |_, y| Luma([(y * 3) as u8]));
        let sampler = SurfSampler::new();
        let kp = KeyPoint::new(40.0, 40.0, 15.0);
        let angle = sampler.orientation(&integral(&img), &kp).unwrap();
        assert!((angle - 90.0).abs() < 1.0, "angle {angle}");
    }

    #[test]
    fn test_descriptor_is_unit_length() {
        let img = GrayImage::from_fn(80, 80, |x, y| Luma([((x * 7) ^ (y * 5)) as u8]));
        let sampler = SurfSampler::new();
        let kp = KeyPoint::new(40.0, 40.0, 20.0);
        for extended in [false, true] {
            let d = sampler.describe(&img, &kp, 30.0, extended);
            assert_eq!(d.len(), if extended { 128 } else { 64 });
            let norm = d.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_flat_patch_is_zero() {
        let img = GrayImage::from_pixel(60, 60, Luma([50]));
        let d = SurfSampler::new().describe(&img, &KeyPoint::new(30.0, 30.0, 12.0), 0.0, false);
        assert!(d.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_ramp_descriptor_points_along_x() {
        let sampler = SurfSampler::new();
        let d = sampler.describe(&ramp_x(), &KeyPoint::new(40.0, 40.0, 15.0), 0.0, false);
        let sum_dx: f32 = d.chunks(4).map(|c| c[0]).sum();
        let sum_dy: f32 = d.chunks(4).map(|c| c[1]).sum();
        assert!(sum_dx > 0.0);
        assert!(sum_dy.abs() < 1e-4);
    }
}
