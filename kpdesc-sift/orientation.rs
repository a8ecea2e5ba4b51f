use ndarray::ArrayView2;

/// Bins of the orientation histogram.
pub const ORI_HIST_BINS: usize = 36;
/// Gaussian weighting sigma, relative to the keypoint scale.
pub const ORI_SIG_FCTR: f32 = 1.5;
/// Window radius, relative to the keypoint scale.
pub const ORI_RADIUS: f32 = 3.0 * ORI_SIG_FCTR;
/// Secondary peaks at least this fraction of the highest one spawn a keypoint.
pub const ORI_PEAK_RATIO: f32 = 0.8;

/// Polar angle of `(x, y)` in degrees in `[0, 360)`.
pub(crate) fn angle_deg(y: f32, x: f32) -> f32 {
    let a = y.atan2(x).to_degrees();
    if a < 0.0 {
        a + 360.0
    } else if a >= 360.0 {
        a - 360.0
    } else {
        a
    }
}

/// Gaussian-weighted, smoothed gradient orientation histogram around
/// `(row, col)`. Returns the histogram and its maximum.
///
/// Gradients point up-positive (`dy = I[r-1] - I[r+1]`).
pub fn orientation_histogram(
    img: ArrayView2<f32>,
    row: usize,
    col: usize,
    radius: i64,
    sigma: f32,
) -> ([f32; ORI_HIST_BINS], f32) {
    let n = ORI_HIST_BINS;
    let (rows, cols) = img.dim();
    let expf_scale = -1.0 / (2.0 * sigma * sigma);
    let mut temp = [0f32; ORI_HIST_BINS];

    for i in -radius..=radius {
        let y = row as i64 + i;
        if y <= 0 || y >= rows as i64 - 1 {
            continue;
        }
        for j in -radius..=radius {
            let x = col as i64 + j;
            if x <= 0 || x >= cols as i64 - 1 {
                continue;
            }
            let (y, x) = (y as usize, x as usize);
            let dx = img[[y, x + 1]] - img[[y, x - 1]];
            let dy = img[[y - 1, x]] - img[[y + 1, x]];
            let w = (((i * i + j * j) as f32) * expf_scale).exp();
            let mag = (dx * dx + dy * dy).sqrt();
            let ori = angle_deg(dy, dx);

            let mut bin = ((n as f32 / 360.0) * ori).round() as i64;
            if bin >= n as i64 {
                bin -= n as i64;
            }
            if bin < 0 {
                bin += n as i64;
            }
            temp[bin as usize] += w * mag;
        }
    }

    let mut hist = [0f32; ORI_HIST_BINS];
    for (i, h) in hist.iter_mut().enumerate() {
        let at = |k: i64| temp[(i as i64 + k).rem_euclid(n as i64) as usize];
        *h = (at(-2) + at(2)) * (1.0 / 16.0) + (at(-1) + at(1)) * (4.0 / 16.0) + at(0) * (6.0 / 16.0);
    }
    let max = hist.iter().copied().fold(0.0f32, f32::max);
    (hist, max)
}

/// Keypoint angles (degrees) of every local peak within [`ORI_PEAK_RATIO`]
/// of the maximum, refined by a parabola through the neighbouring bins.
///
/// Angles follow the image convention: the histogram measures up-positive
/// gradients, so a bin at `b` gives `360 - b * 10` degrees.
pub fn peak_angles(hist: &[f32; ORI_HIST_BINS], max: f32) -> Vec<f32> {
    let n = ORI_HIST_BINS;
    let mag_thr = max * ORI_PEAK_RATIO;
    let mut angles = Vec::new();

    for j in 0..n {
        let l = if j > 0 { j - 1 } else { n - 1 };
        let r2 = if j < n - 1 { j + 1 } else { 0 };
        if hist[j] > hist[l] && hist[j] > hist[r2] && hist[j] >= mag_thr {
            let mut bin = j as f32 + 0.5 * (hist[l] - hist[r2]) / (hist[l] - 2.0 * hist[j] + hist[r2]);
            if bin < 0.0 {
                bin += n as f32;
            } else if bin >= n as f32 {
                bin -= n as f32;
            }
            let mut angle = 360.0 - (360.0 / n as f32) * bin;
            if (angle - 360.0).abs() < f32::EPSILON {
                angle = 0.0;
            }
            angles.push(angle);
        }
    }
    angles
}
