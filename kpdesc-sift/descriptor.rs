use ndarray::ArrayView2;

use crate::orientation::angle_deg;

/// Spatial cells per side.
pub const DESCR_WIDTH: usize = 4;
/// Orientation bins per cell.
pub const DESCR_HIST_BINS: usize = 8;
pub const DESCRIPTOR_SIZE: usize = DESCR_WIDTH * DESCR_WIDTH * DESCR_HIST_BINS;
/// Cell width in units of the keypoint scale.
pub const DESCR_SCL_FCTR: f32 = 3.0;
/// Cap on any element after the first normalization.
pub const DESCR_MAG_THR: f32 = 0.2;
/// Scale from unit length to the byte range.
pub const INT_DESCR_FCTR: f32 = 512.0;

/// 128-element SIFT descriptor of the patch centered at `(x, y)` in `img`.
///
/// `ori` is the rotation in degrees applied to the sampling grid and `scl` the
/// keypoint scale in octave pixels. Elements are whole numbers in `[0, 255]`.
pub fn sift_descriptor(img: ArrayView2<f32>, x: f32, y: f32, ori: f32, scl: f32) -> Vec<f32> {
    let d = DESCR_WIDTH;
    let n = DESCR_HIST_BINS;
    let (rows, cols) = img.dim();
    let (px, py) = (x.round() as i64, y.round() as i64);

    let (sin_t, cos_t) = ori.to_radians().sin_cos();
    let bins_per_deg = n as f32 / 360.0;
    let exp_scale = -1.0 / (d as f32 * d as f32 * 0.5);
    let hist_width = DESCR_SCL_FCTR * scl;
    let radius = (hist_width * std::f32::consts::SQRT_2 * (d as f32 + 1.0) * 0.5).round() as i64;
    let radius = radius.min(((rows * rows + cols * cols) as f64).sqrt() as i64);
    let cos_t = cos_t / hist_width;
    let sin_t = sin_t / hist_width;

    // (d + 2) x (d + 2) x (n + 2) so that interpolation never needs bounds checks
    let mut hist = vec![0f32; (d + 2) * (d + 2) * (n + 2)];

    for i in -radius..=radius {
        for j in -radius..=radius {
            let c_rot = j as f32 * cos_t - i as f32 * sin_t;
            let r_rot = j as f32 * sin_t + i as f32 * cos_t;
            let rbin = r_rot + d as f32 / 2.0 - 0.5;
            let cbin = c_rot + d as f32 / 2.0 - 0.5;
            let r = py + i;
            let c = px + j;

            if !(rbin > -1.0
                && rbin < d as f32
                && cbin > -1.0
                && cbin < d as f32
                && r > 0
                && r < rows as i64 - 1
                && c > 0
                && c < cols as i64 - 1)
            {
                continue;
            }

            let (r, c) = (r as usize, c as usize);
            let dx = img[[r, c + 1]] - img[[r, c - 1]];
            let dy = img[[r - 1, c]] - img[[r + 1, c]];
            let weight = ((c_rot * c_rot + r_rot * r_rot) * exp_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt() * weight;
            let mut obin = (angle_deg(dy, dx) - ori) * bins_per_deg;

            let r0 = rbin.floor();
            let c0 = cbin.floor();
            let mut o0 = obin.floor();
            let rbin = rbin - r0;
            let cbin = cbin - c0;
            obin -= o0;
            if o0 < 0.0 {
                o0 += n as f32;
            }
            if o0 >= n as f32 {
                o0 -= n as f32;
            }

            // histogram update using tri-linear interpolation
            let v_r1 = mag * rbin;
            let v_r0 = mag - v_r1;
            let v_rc11 = v_r1 * cbin;
            let v_rc10 = v_r1 - v_rc11;
            let v_rc01 = v_r0 * cbin;
            let v_rc00 = v_r0 - v_rc01;
            let v_rco111 = v_rc11 * obin;
            let v_rco110 = v_rc11 - v_rco111;
            let v_rco101 = v_rc10 * obin;
            let v_rco100 = v_rc10 - v_rco101;
            let v_rco011 = v_rc01 * obin;
            let v_rco010 = v_rc01 - v_rco011;
            let v_rco001 = v_rc00 * obin;
            let v_rco000 = v_rc00 - v_rco001;

            let idx = (((r0 as i64 + 1) as usize * (d + 2)) + (c0 as i64 + 1) as usize) * (n + 2) + o0 as usize;
            hist[idx] += v_rco000;
            hist[idx + 1] += v_rco001;
            hist[idx + (n + 2)] += v_rco010;
            hist[idx + (n + 3)] += v_rco011;
            hist[idx + (d + 2) * (n + 2)] += v_rco100;
            hist[idx + (d + 2) * (n + 2) + 1] += v_rco101;
            hist[idx + (d + 3) * (n + 2)] += v_rco110;
            hist[idx + (d + 3) * (n + 2) + 1] += v_rco111;
        }
    }

    // finalize histogram, since the orientation histograms are circular
    let mut dst = vec![0f32; DESCRIPTOR_SIZE];
    for i in 0..d {
        for j in 0..d {
            let idx = ((i + 1) * (d + 2) + (j + 1)) * (n + 2);
            hist[idx] += hist[idx + n];
            hist[idx + 1] += hist[idx + n + 1];
            for k in 0..n {
                dst[(i * d + j) * n + k] = hist[idx + k];
            }
        }
    }

    normalize_descriptor(&mut dst);
    dst
}

/// Clip at [`DESCR_MAG_THR`] of the norm, renormalize to [`INT_DESCR_FCTR`] and
/// saturate into the byte range.
fn normalize_descriptor(dst: &mut [f32]) {
    let nrm: f32 = dst.iter().map(|v| v * v).sum::<f32>().sqrt();
    let thr = nrm * DESCR_MAG_THR;

    let mut nrm2 = 0.0f32;
    for v in dst.iter_mut() {
        *v = v.min(thr);
        nrm2 += *v * *v;
    }
    let factor = INT_DESCR_FCTR / nrm2.sqrt().max(f32::EPSILON);
    for v in dst.iter_mut() {
        *v = (*v * factor).round().clamp(0.0, 255.0);
    }
}
