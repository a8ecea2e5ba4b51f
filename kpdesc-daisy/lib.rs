//! DAISY descriptors.
//!
//! A DAISY descriptor samples gradient orientation histograms on concentric
//! rings around the keypoint. Outer rings read from more strongly smoothed
//! layers, so every histogram summarizes a region proportional to its
//! distance from the center. DAISY only describes; pair it with any
//! [`KeypointDetector`](kpdesc_core::KeypointDetector).

pub mod layers;

use image::GrayImage;
use kpdesc_core::{check_image, DescriptorComputer, DescriptorKind, Descriptors, FeatureError, FeatureResult, KeyPoint};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use layers::SmoothedLayers;

/// Cap on any element for [`DaisyNorm::Sift`].
pub const SIFT_NORM_THRESHOLD: f32 = 0.154;

/// Descriptor normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DaisyNorm {
    /// Raw histogram values.
    #[default]
    None,
    /// Each histogram scaled to unit length.
    Partial,
    /// The whole descriptor scaled to unit length.
    Full,
    /// Like `Full`, with elements clipped and renormalized until stable.
    Sift,
}

/// DAISY settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DaisyParams {
    /// Radius of the outermost ring in pixels.
    pub radius: f32,
    /// Number of rings.
    pub q_radius: usize,
    /// Histograms per ring.
    pub q_theta: usize,
    /// Orientation bins per histogram.
    pub q_hist: usize,
    pub norm: DaisyNorm,
    /// Rotate the pattern by the keypoint angle.
    pub use_orientation: bool,
}

impl Default for DaisyParams {
    fn default() -> Self {
        Self {
            radius: 15.0,
            q_radius: 3,
            q_theta: 8,
            q_hist: 8,
            norm: DaisyNorm::None,
            use_orientation: false,
        }
    }
}

impl DaisyParams {
    pub fn validate(&self) -> FeatureResult<()> {
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(FeatureError::invalid_parameter(
                "radius",
                format!("{} (must be > 0)", self.radius),
            ));
        }
        if self.q_radius == 0 {
            return Err(FeatureError::invalid_parameter("q_radius", "must be > 0"));
        }
        if self.q_theta == 0 {
            return Err(FeatureError::invalid_parameter("q_theta", "must be > 0"));
        }
        if self.q_hist == 0 {
            return Err(FeatureError::invalid_parameter("q_hist", "must be > 0"));
        }
        Ok(())
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_q_radius(mut self, q_radius: usize) -> Self {
        self.q_radius = q_radius;
        self
    }

    pub fn with_q_theta(mut self, q_theta: usize) -> Self {
        self.q_theta = q_theta;
        self
    }

    pub fn with_q_hist(mut self, q_hist: usize) -> Self {
        self.q_hist = q_hist;
        self
    }

    pub fn with_norm(mut self, norm: DaisyNorm) -> Self {
        self.norm = norm;
        self
    }

    pub fn with_use_orientation(mut self, use_orientation: bool) -> Self {
        self.use_orientation = use_orientation;
        self
    }

    /// Histograms per descriptor: the center plus every ring sample.
    pub fn n_histograms(&self) -> usize {
        self.q_radius * self.q_theta + 1
    }

    pub fn descriptor_size(&self) -> usize {
        self.n_histograms() * self.q_hist
    }
}

#[derive(Debug, Clone, Default)]
pub struct Daisy {
    params: DaisyParams,
}

impl Daisy {
    pub fn new(params: DaisyParams) -> FeatureResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &DaisyParams {
        &self.params
    }

    /// `(ring, dx, dy)` offsets of every ring sample, ring by ring.
    fn grid(&self) -> Vec<(usize, f32, f32)> {
        let p = &self.params;
        let step = p.radius / p.q_radius as f32;
        (0..p.q_radius)
            .flat_map(|r| {
                let rad = (r + 1) as f32 * step;
                (0..p.q_theta).map(move |t| {
                    let theta = t as f32 * 2.0 * std::f32::consts::PI / p.q_theta as f32;
                    (r, rad * theta.cos(), rad * theta.sin())
                })
            })
            .collect()
    }

    /// Histogram of cube `r` at `(x, y)`, circularly shifted by `shift` bins.
    /// Zero outside the image.
    fn histogram(&self, layers: &SmoothedLayers, r: usize, x: f32, y: f32, shift: usize, out: &mut [f32]) {
        let q = self.params.q_hist;
        let cube = layers.cube(r);
        for (h, plane) in cube.iter().enumerate() {
            out[(h + q - shift) % q] = layers::sample(plane, x, y).unwrap_or(0.0);
        }
    }

    fn describe(&self, layers: &SmoothedLayers, grid: &[(usize, f32, f32)], kp: &KeyPoint) -> Vec<f32> {
        let q = self.params.q_hist;
        let mut desc = vec![0f32; self.params.descriptor_size()];

        let (angle, shift) = if self.params.use_orientation && kp.angle >= 0.0 {
            let shift = ((kp.angle / 360.0 * q as f32).round() as usize) % q;
            (kp.angle.to_radians(), shift)
        } else {
            (0.0, 0)
        };
        let (sin_a, cos_a) = angle.sin_cos();

        self.histogram(layers, 0, kp.x, kp.y, shift, &mut desc[..q]);
        for (k, &(r, dx, dy)) in grid.iter().enumerate() {
            let x = kp.x + dx * cos_a - dy * sin_a;
            let y = kp.y + dx * sin_a + dy * cos_a;
            let start = (k + 1) * q;
            self.histogram(layers, r, x, y, shift, &mut desc[start..start + q]);
        }

        normalize(&mut desc, q, self.params.norm);
        desc
    }
}

fn scale_to_unit(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

fn normalize(desc: &mut [f32], q_hist: usize, norm: DaisyNorm) {
    match norm {
        DaisyNorm::None => {}
        DaisyNorm::Partial => desc.chunks_mut(q_hist).for_each(scale_to_unit),
        DaisyNorm::Full => scale_to_unit(desc),
        DaisyNorm::Sift => {
            scale_to_unit(desc);
            for _ in 0..5 {
                let mut changed = false;
                for v in desc.iter_mut() {
                    if *v > SIFT_NORM_THRESHOLD {
                        *v = SIFT_NORM_THRESHOLD;
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
                scale_to_unit(desc);
            }
        }
    }
}

impl DescriptorComputer for Daisy {
    fn descriptor_size(&self) -> usize {
        self.params.descriptor_size()
    }

    fn descriptor_kind(&self) -> DescriptorKind {
        DescriptorKind::Float
    }

    /// Describes every keypoint; none are dropped.
    fn compute(
        &self,
        image: &GrayImage,
        keypoints: &mut Vec<KeyPoint>,
    ) -> FeatureResult<Option<Descriptors>> {
        check_image(image)?;
        if keypoints.is_empty() {
            return Ok(None);
        }
        let p = &self.params;
        let layers = SmoothedLayers::build(image, p.radius, p.q_radius, p.q_hist);
        let grid = self.grid();
        let rows: Vec<Vec<f32>> = keypoints
            .par_iter()
            .map(|kp| self.describe(&layers, &grid, kp))
            .collect();
        log::debug!("DAISY described {} keypoints", rows.len());
        Descriptors::from_float_rows(rows, p.descriptor_size())
    }
}
