//! Scale-space extrema detection and sub-pixel localisation.

use kpdesc_core::linalg::solve3;
use kpdesc_core::KeyPoint;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::orientation::{orientation_histogram, peak_angles, ORI_HIST_BINS, ORI_RADIUS, ORI_SIG_FCTR};
use crate::scale_space::ScaleSpace;
use crate::SiftParams;

/// Width of the border where no extremum is searched.
pub const IMG_BORDER: usize = 5;
/// Maximum number of interpolation steps.
pub const MAX_INTERP_STEPS: usize = 5;

/// Packs a pyramid position into [`KeyPoint::octave`]: the octave in the low
/// byte (two's complement), the layer in the second and the sub-layer offset
/// in the third byte.
pub fn pack_octave(octave: i32, layer: usize, sub_layer: f32) -> i32 {
    let sub = ((sub_layer + 0.5) * 255.0).round() as i32;
    (octave & 255) | ((layer as i32) << 8) | (sub << 16)
}

/// Inverse of [`pack_octave`], returning `(octave, layer, scale)` where
/// `scale` maps input image coordinates to the octave's coordinates.
pub fn unpack_octave(kp: &KeyPoint) -> (i32, usize, f32) {
    let low = kp.octave & 255;
    let layer = ((kp.octave >> 8) & 255) as usize;
    let octave = if low < 128 { low } else { low - 256 };
    let scale = if octave >= 0 {
        1.0 / (1u32 << octave) as f32
    } else {
        (1u32 << (-octave)) as f32
    };
    (octave, layer, scale)
}

/// A DoG extremum after interpolation, in octave coordinates.
#[derive(Debug, Clone, Copy)]
pub struct LocalExtremum {
    pub keypoint: KeyPoint,
    pub layer: usize,
    pub row: usize,
    pub col: usize,
}

/// Moves a candidate towards the true extremum with Newton steps and applies
/// the contrast and edge tests.
pub fn adjust_local_extremum(
    space: &ScaleSpace,
    params: &SiftParams,
    octave: usize,
    mut layer: usize,
    mut row: usize,
    mut col: usize,
) -> Option<LocalExtremum> {
    let img_scale = 1.0 / 255.0;
    let deriv_scale = img_scale * 0.5;
    let second_deriv_scale = img_scale;
    let cross_deriv_scale = img_scale * 0.25;
    let n_layers = params.n_octave_layers;

    let gradient = |prev: ArrayView2<f32>, img: ArrayView2<f32>, next: ArrayView2<f32>, r: usize, c: usize| {
        [
            (img[[r, c + 1]] - img[[r, c - 1]]) as f64 * deriv_scale,
            (img[[r + 1, c]] - img[[r - 1, c]]) as f64 * deriv_scale,
            (next[[r, c]] - prev[[r, c]]) as f64 * deriv_scale,
        ]
    };

    let (mut xi, mut xr, mut xc) = (0.0f64, 0.0f64, 0.0f64);
    let mut step = 0;
    while step < MAX_INTERP_STEPS {
        let img = space.dog(octave, layer);
        let prev = space.dog(octave, layer - 1);
        let next = space.dog(octave, layer + 1);
        let (r, c) = (row, col);

        let d_d = gradient(prev, img, next, r, c);
        let v2 = img[[r, c]] as f64 * 2.0;
        let dxx = (img[[r, c + 1]] as f64 + img[[r, c - 1]] as f64 - v2) * second_deriv_scale;
        let dyy = (img[[r + 1, c]] as f64 + img[[r - 1, c]] as f64 - v2) * second_deriv_scale;
        let dss = (next[[r, c]] as f64 + prev[[r, c]] as f64 - v2) * second_deriv_scale;
        let dxy = (img[[r + 1, c + 1]] - img[[r + 1, c - 1]] - img[[r - 1, c + 1]] + img[[r - 1, c - 1]]) as f64
            * cross_deriv_scale;
        let dxs = (next[[r, c + 1]] - next[[r, c - 1]] - prev[[r, c + 1]] + prev[[r, c - 1]]) as f64
            * cross_deriv_scale;
        let dys = (next[[r + 1, c]] - next[[r - 1, c]] - prev[[r + 1, c]] + prev[[r - 1, c]]) as f64
            * cross_deriv_scale;

        let x = solve3([[dxx, dxy, dxs], [dxy, dyy, dys], [dxs, dys, dss]], d_d);
        xc = -x[0];
        xr = -x[1];
        xi = -x[2];

        if xi.abs() < 0.5 && xr.abs() < 0.5 && xc.abs() < 0.5 {
            break;
        }
        if xi.abs() > (i32::MAX / 3) as f64 || xr.abs() > (i32::MAX / 3) as f64 || xc.abs() > (i32::MAX / 3) as f64
        {
            return None;
        }

        let new_col = col as i64 + xc.round() as i64;
        let new_row = row as i64 + xr.round() as i64;
        let new_layer = layer as i64 + xi.round() as i64;
        let (rows, cols) = img.dim();
        if new_layer < 1
            || new_layer > n_layers as i64
            || new_col < IMG_BORDER as i64
            || new_col >= (cols - IMG_BORDER) as i64
            || new_row < IMG_BORDER as i64
            || new_row >= (rows - IMG_BORDER) as i64
        {
            return None;
        }
        col = new_col as usize;
        row = new_row as usize;
        layer = new_layer as usize;
        step += 1;
    }

    if step >= MAX_INTERP_STEPS {
        return None;
    }

    let img = space.dog(octave, layer);
    let prev = space.dog(octave, layer - 1);
    let next = space.dog(octave, layer + 1);
    let (r, c) = (row, col);

    let d_d = gradient(prev, img, next, r, c);
    let t = d_d[0] * xc + d_d[1] * xr + d_d[2] * xi;
    let contr = img[[r, c]] as f64 * img_scale + t * 0.5;
    if contr.abs() * (n_layers as f64) < params.contrast_threshold as f64 {
        return None;
    }

    // principal curvatures are computed using the trace and det of Hessian
    let v2 = img[[r, c]] as f64 * 2.0;
    let dxx = (img[[r, c + 1]] as f64 + img[[r, c - 1]] as f64 - v2) * second_deriv_scale;
    let dyy = (img[[r + 1, c]] as f64 + img[[r - 1, c]] as f64 - v2) * second_deriv_scale;
    let dxy = (img[[r + 1, c + 1]] - img[[r + 1, c - 1]] - img[[r - 1, c + 1]] + img[[r - 1, c - 1]]) as f64
        * cross_deriv_scale;
    let tr = dxx + dyy;
    let det = dxx * dyy - dxy * dxy;
    let edge = params.edge_threshold as f64;
    if det <= 0.0 || tr * tr * edge >= (edge + 1.0) * (edge + 1.0) * det {
        return None;
    }

    let octave_scale = (1u32 << octave) as f64;
    let size = params.sigma as f64 * 2f64.powf((layer as f64 + xi) / n_layers as f64) * octave_scale * 2.0;
    let keypoint = KeyPoint {
        x: ((c as f64 + xc) * octave_scale) as f32,
        y: ((r as f64 + xr) * octave_scale) as f32,
        size: size as f32,
        angle: -1.0,
        response: contr.abs() as f32,
        octave: pack_octave(octave as i32, layer, xi as f32),
        class_id: -1,
    };

    Some(LocalExtremum {
        keypoint,
        layer,
        row,
        col,
    })
}

/// True if `val` is at least as extreme as its 26 neighbours in the same
/// direction.
fn is_extremum(
    prev: ArrayView2<f32>,
    curr: ArrayView2<f32>,
    next: ArrayView2<f32>,
    r: usize,
    c: usize,
    val: f32,
) -> bool {
    let neighbours = || {
        (r - 1..=r + 1).flat_map(move |y| {
            (c - 1..=c + 1).flat_map(move |x| [prev[[y, x]], curr[[y, x]], next[[y, x]]])
        })
    };
    if val > 0.0 {
        neighbours().all(|n| val >= n)
    } else {
        neighbours().all(|n| val <= n)
    }
}

/// Finds oriented keypoints in all octaves and layers.
///
/// Positions and sizes are in pyramid-base coordinates (the doubled image when
/// the scale space starts at octave -1). A keypoint is emitted once per
/// dominant orientation.
pub fn find_scale_space_extrema(space: &ScaleSpace, params: &SiftParams) -> Vec<KeyPoint> {
    let n_layers = params.n_octave_layers;
    let threshold = (0.5 * params.contrast_threshold as f64 / n_layers as f64 * 255.0).floor() as f32;

    let slots: Vec<(usize, usize)> = (0..space.n_octaves())
        .flat_map(|o| (1..=n_layers).map(move |i| (o, i)))
        .collect();

    let per_slot: Vec<Vec<KeyPoint>> = slots
        .into_par_iter()
        .map(|(o, i)| {
            let prev = space.dog(o, i - 1);
            let curr = space.dog(o, i);
            let next = space.dog(o, i + 1);
            let (rows, cols) = curr.dim();
            let mut found = Vec::new();
            if rows <= 2 * IMG_BORDER || cols <= 2 * IMG_BORDER {
                return found;
            }

            for r in IMG_BORDER..rows - IMG_BORDER {
                for c in IMG_BORDER..cols - IMG_BORDER {
                    let val = curr[[r, c]];
                    if val.abs() <= threshold || !is_extremum(prev, curr, next, r, c, val) {
                        continue;
                    }
                    let Some(ext) = adjust_local_extremum(space, params, o, i, r, c) else {
                        continue;
                    };

                    let scl_octv = ext.keypoint.size * 0.5 / (1u32 << o) as f32;
                    let (hist, max) = orientation_histogram(
                        space.gaussian(o, ext.layer),
                        ext.row,
                        ext.col,
                        (ORI_RADIUS * scl_octv).round() as i64,
                        ORI_SIG_FCTR * scl_octv,
                    );
                    for angle in peak_angles(&hist, max) {
                        found.push(ext.keypoint.with_angle(angle));
                    }
                }
            }
            found
        })
        .collect();

    let keypoints: Vec<KeyPoint> = per_slot.into_iter().flatten().collect();
    log::trace!("SIFT: {} oriented extrema ({} bins)", keypoints.len(), ORI_HIST_BINS);
    keypoints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_roundtrip_positive() {
        let mut kp = KeyPoint::new(0.0, 0.0, 1.0);
        kp.octave = pack_octave(2, 3, 0.1);
        let (octave, layer, scale) = unpack_octave(&kp);
        assert_eq!(octave, 2);
        assert_eq!(layer, 3);
        assert_eq!(scale, 0.25);
    }

    #[test]
    fn test_pack_negative_octave() {
        let mut kp = KeyPoint::new(0.0, 0.0, 1.0);
        kp.octave = pack_octave(-1, 1, -0.2);
        let (octave, layer, scale) = unpack_octave(&kp);
        assert_eq!(octave, -1);
        assert_eq!(layer, 1);
        assert_eq!(scale, 2.0);
    }
}
