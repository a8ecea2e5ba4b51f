//! FAST corner detection, image pyramids and oriented FAST keypoints for ORB.

pub mod config;
pub mod corner_detection;
pub mod detector;
pub mod orb_detector;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use config::{FastParams, OrbParams, OrbScoreType};
pub use corner_detection::CornerDetector;
pub use detector::{fast_corners, non_maximum_suppression, FastFeatureDetector, FAST_KEYPOINT_SIZE};
pub use orb_detector::OrbDetector;
pub use pyramid::ImagePyramid;
pub use refinement::{bilinear_interpolate, circular_extent, intensity_centroid_angle, refine_subpixel};
pub use types::{Corner, ScaleLevel};
