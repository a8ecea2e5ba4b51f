use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::types::ScaleLevel;

/// Image pyramid for multi-scale feature detection
#[derive(Debug, Clone)]
pub struct ImagePyramid {
    levels: Vec<GrayImage>,
    scale_levels: Vec<ScaleLevel>,
}

impl ImagePyramid {
    /// Generate scale levels for an image pyramid.
    ///
    /// Level `i` is scaled by `scale_factor^i`; its size is the rounded
    /// base size divided by that scale, never below one pixel.
    pub fn generate_scale_levels(
        width: u32,
        height: u32,
        scale_factor: f32,
        n_levels: usize,
    ) -> Vec<ScaleLevel> {
        let mut current_scale = 1.0f32;
        (0..n_levels)
            .map(|level| {
                let scale = current_scale;
                current_scale *= scale_factor;
                ScaleLevel {
                    level,
                    scale,
                    width: ((width as f32 / scale).round() as u32).max(1),
                    height: ((height as f32 / scale).round() as u32).max(1),
                }
            })
            .collect()
    }

    /// Build the pyramid, each level bilinearly resampled from the previous one.
    pub fn build(img: &GrayImage, scale_factor: f32, n_levels: usize) -> Self {
        let scale_levels = Self::generate_scale_levels(img.width(), img.height(), scale_factor, n_levels);
        let mut levels: Vec<GrayImage> = Vec::with_capacity(scale_levels.len());

        for scale_level in &scale_levels {
            let next = match levels.last() {
                None => img.clone(),
                Some(prev) => downsample_image(prev, scale_level.width, scale_level.height),
            };
            levels.push(next);
        }

        Self { levels, scale_levels }
    }

    /// Resize `mask` to every level of this pyramid with nearest neighbour sampling.
    pub fn build_mask(&self, mask: &GrayImage) -> Vec<GrayImage> {
        self.scale_levels
            .iter()
            .map(|sl| {
                if sl.level == 0 {
                    mask.clone()
                } else {
                    imageops::resize(mask, sl.width, sl.height, FilterType::Nearest)
                }
            })
            .collect()
    }

    pub fn levels(&self) -> &[GrayImage] {
        &self.levels
    }

    pub fn scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScaleLevel, &GrayImage)> {
        self.scale_levels.iter().zip(self.levels.iter())
    }
}

/// Downsample image using bilinear interpolation with pixel centers aligned.
fn downsample_image(img: &GrayImage, target_width: u32, target_height: u32) -> GrayImage {
    let (src_width, src_height) = img.dimensions();
    let x_ratio = src_width as f32 / target_width as f32;
    let y_ratio = src_height as f32 / target_height as f32;

    GrayImage::from_fn(target_width, target_height, |x, y| {
        let src_x = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
        let src_y = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
        let value = bilinear_sample(img, src_x, src_y);
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Sample image at fractional coordinates using bilinear interpolation
fn bilinear_sample(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (width, height) = img.dimensions();
    let x1 = (x.floor() as u32).min(width - 1);
    let y1 = (y.floor() as u32).min(height - 1);
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
