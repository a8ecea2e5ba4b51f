//! Hellinger (RootSIFT) normalization of float descriptors.

use kpdesc_core::Descriptors;
use ndarray::{Array2, Axis};

use crate::error::{DescriptorError, DescriptorResult};

/// Added to the L1 norm so that all-zero rows stay finite.
pub const ROOT_SIFT_EPS: f32 = 1e-7;

/// Divides each row by its L1 norm plus `eps`, then takes the square root of
/// every element.
pub fn root_sift(descriptors: &Array2<f32>, eps: f32) -> Array2<f32> {
    let mut out = descriptors.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let l1: f32 = row.iter().map(|v| v.abs()).sum();
        let denom = l1 + eps;
        row.mapv_inplace(|v| (v / denom).sqrt());
    }
    out
}

/// [`root_sift`] on a float descriptor matrix.
pub fn root_sift_descriptors(descriptors: Descriptors, eps: f32) -> DescriptorResult<Descriptors> {
    match descriptors {
        Descriptors::Float(rows) => Ok(Descriptors::Float(root_sift(&rows, eps))),
        Descriptors::Binary(_) => Err(DescriptorError::InvalidConfig(
            "RootSIFT normalization needs float descriptors".to_string(),
        )),
    }
}
