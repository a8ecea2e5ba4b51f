//! Local feature descriptors behind one entry point.
//!
//! Every image is converted to 8-bit intensity and area-resized to a fixed
//! 256x256 canonical square before any keypoint is detected, so descriptors
//! from differently sized inputs live in a comparable frame. An optional mask
//! is resized with the same policy and then binarized.
//!
//! ```no_run
//! use image::{DynamicImage, Rgb, RgbImage};
//!
//! let img = DynamicImage::ImageRgb8(RgbImage::from_fn(640, 480, |x, y| {
//!     if (x / 40 + y / 40) % 2 == 0 { Rgb([200, 80, 40]) } else { Rgb([20, 30, 40]) }
//! }));
//! match kpdesc::extract_local_descriptors(&img, None, "root_sift").unwrap() {
//!     Some(desc) => println!("{:?}", desc.shape()),
//!     None => println!("no keypoints"),
//! }
//! ```
//!
//! [`DescriptorExtractor`] keeps a configuration and a worker pool alive
//! across calls.

mod builder;
mod config;
mod error;
mod extractor;
mod method;
pub mod normalize;
pub mod preprocess;

pub use builder::ExtractorBuilder;
pub use config::ExtractorConfig;
pub use error::{DescriptorError, DescriptorResult};
pub use extractor::DescriptorExtractor;
pub use method::DescriptorMethod;
pub use preprocess::{CanonicalInput, CANONICAL_SIZE};

pub use kpdesc_core::{DescriptorKind, Descriptors, FeatureError, KeyPoint};

pub use kpdesc_brief as brief;
pub use kpdesc_brisk as brisk;
pub use kpdesc_daisy as daisy;
pub use kpdesc_fast as fast;
pub use kpdesc_sift as sift;
pub use kpdesc_surf as surf;

use std::sync::OnceLock;

use image::{DynamicImage, GrayImage};

static DEFAULT_EXTRACTOR: OnceLock<DescriptorExtractor> = OnceLock::new();

/// Process-wide extractor with [`ExtractorConfig::default`], created on first
/// use and shared by the free functions.
pub fn default_extractor() -> DescriptorResult<&'static DescriptorExtractor> {
    if let Some(extractor) = DEFAULT_EXTRACTOR.get() {
        return Ok(extractor);
    }
    let extractor = DescriptorExtractor::new(ExtractorConfig::default())?;
    Ok(DEFAULT_EXTRACTOR.get_or_init(|| extractor))
}

/// Descriptors of `image` computed with `method`, one of `sift`, `surf`,
/// `root_sift`, `orb`, `daisy` or `brisk`.
///
/// `mask`, when given, must cover the same extent as `image`; nonzero pixels
/// select where keypoints may be detected. `Ok(None)` means no keypoint
/// survived.
pub fn extract_local_descriptors(
    image: &DynamicImage,
    mask: Option<&GrayImage>,
    method: &str,
) -> DescriptorResult<Option<Descriptors>> {
    default_extractor()?.extract(image, mask, method)
}

/// Single-instance ORB (1200 features) that detects and describes in one
/// pass. Not selectable through [`extract_local_descriptors`].
pub fn legacy_orb_descriptors(image: &DynamicImage, mask: Option<&GrayImage>) -> DescriptorResult<Option<Descriptors>> {
    default_extractor()?.extract_legacy_orb(image, mask)
}
