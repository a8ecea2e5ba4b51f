use kpdesc_core::FeatureError;

/// Errors returned by the descriptor dispatcher.
#[derive(thiserror::Error, Debug)]
pub enum DescriptorError {
    #[error("Invalid descriptor method `{0}` (expected one of sift, surf, root_sift, orb, daisy, brisk)")]
    InvalidMethod(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Feature extraction failed: {0}")]
    Feature(#[from] FeatureError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "serde")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "serde")]
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[cfg(feature = "serde")]
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;
