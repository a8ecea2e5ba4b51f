use image::GrayImage;

/// Half-widths of the circular patch, row by row.
///
/// `umax[v]` is the largest `|u|` such that `(u, v)` lies inside the circle of
/// radius `half_patch`. The table is made symmetric under swapping `u` and `v`.
pub fn circular_extent(half_patch: u32) -> Vec<i32> {
    let half = half_patch as i32;
    let mut umax = vec![0i32; half as usize + 2];

    let vmax = (half as f64 * std::f64::consts::SQRT_2 / 2.0 + 1.0).floor() as i32;
    let vmin = (half as f64 * std::f64::consts::SQRT_2 / 2.0).ceil() as i32;
    let hp2 = (half * half) as f64;
    for v in 0..=vmax.min(half + 1) {
        umax[v as usize] = (hp2 - (v * v) as f64).max(0.0).sqrt().round() as i32;
    }

    let mut v0 = 0usize;
    let mut v = half;
    while v >= vmin {
        while v0 + 1 < umax.len() && umax[v0] == umax[v0 + 1] {
            v0 += 1;
        }
        umax[v as usize] = v0 as i32;
        v0 += 1;
        v -= 1;
    }
    umax
}

/// Orientation of the patch around `(x, y)` from its intensity centroid, in
/// degrees in `[0, 360)`.
///
/// Pixels outside the image are clamped to the nearest edge.
pub fn intensity_centroid_angle(img: &GrayImage, x: f32, y: f32, half_patch: u32, umax: &[i32]) -> f32 {
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let (width, height) = img.dimensions();
    let sample = |u: i64, v: i64| -> i64 {
        let px = (cx + u).clamp(0, width as i64 - 1) as u32;
        let py = (cy + v).clamp(0, height as i64 - 1) as u32;
        img.get_pixel(px, py)[0] as i64
    };

    let half = half_patch as i64;
    let mut m_01 = 0i64;
    let mut m_10 = 0i64;

    for u in -half..=half {
        m_10 += u * sample(u, 0);
    }

    // Rows above and below the center are processed together
    for v in 1..=half {
        let d = umax.get(v as usize).copied().unwrap_or(0) as i64;
        let mut v_sum = 0i64;
        for u in -d..=d {
            let val_plus = sample(u, v);
            let val_minus = sample(u, -v);
            v_sum += val_plus - val_minus;
            m_10 += u * (val_plus + val_minus);
        }
        m_01 += v * v_sum;
    }

    let angle = (m_01 as f32).atan2(m_10 as f32).to_degrees();
    if angle < 0.0 {
        angle + 360.0
    } else if angle >= 360.0 {
        angle - 360.0
    } else {
        angle
    }
}

/// Sub-pixel offset of the peak of a 3x3 score patch from a quadratic fit.
///
/// `samples[row][col]` holds the scores around the center `samples[1][1]`.
/// The offset is clamped to half a pixel in each direction.
pub fn refine_subpixel(samples: &[[f32; 3]; 3]) -> (f32, f32) {
    let dx = (samples[1][2] - samples[1][0]) / 2.0;
    let dy = (samples[2][1] - samples[0][1]) / 2.0;
    let dxx = samples[1][2] - 2.0 * samples[1][1] + samples[1][0];
    let dyy = samples[2][1] - 2.0 * samples[1][1] + samples[0][1];
    let dxy = (samples[2][2] - samples[2][0] - samples[0][2] + samples[0][0]) / 4.0;

    let det = dxx * dyy - dxy * dxy;
    if det.abs() < 1e-6 {
        return (0.0, 0.0);
    }

    let offset_x = -(dyy * dx - dxy * dy) / det;
    let offset_y = -(dxx * dy - dxy * dx) / det;

    (offset_x.clamp(-0.5, 0.5), offset_y.clamp(-0.5, 0.5))
}

/// Bilinear interpolation for fractional coordinates, edges clamped.
pub fn bilinear_interpolate(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x1 = x.floor() as u32;
    let y1 = y.floor() as u32;
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);

    let fx = x - x1 as f32;
    let fy = y - y1 as f32;

    let p11 = img.get_pixel(x1, y1)[0] as f32;
    let p12 = img.get_pixel(x2, y1)[0] as f32;
    let p21 = img.get_pixel(x1, y2)[0] as f32;
    let p22 = img.get_pixel(x2, y2)[0] as f32;

    let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
    let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

    interpolated_top * (1.0 - fy) + interpolated_bottom * fy
}
