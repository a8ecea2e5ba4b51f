//! Rotated BRIEF binary descriptors and the ORB detector/descriptor pair.

pub mod descriptor;
pub mod orb;
pub mod pattern;

pub use descriptor::{BriefGenerator, DESCRIPTOR_SIZE};
pub use orb::Orb;
pub use pattern::{generate_pattern, PointPair, PATTERN_PAIRS};
