/// Errors raised by detectors and descriptor computers.
#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Mask size {mask_width}x{mask_height} does not match image size {width}x{height}")]
    MaskSizeMismatch {
        width: u32,
        height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Descriptor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type FeatureResult<T> = Result<T, FeatureError>;

impl FeatureError {
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        FeatureError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
