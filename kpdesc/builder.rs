use kpdesc_brisk::BriskParams;
use kpdesc_daisy::DaisyParams;
use kpdesc_fast::{FastParams, OrbParams};
use kpdesc_sift::SiftParams;
use kpdesc_surf::SurfParams;

use crate::config::ExtractorConfig;
use crate::error::DescriptorResult;
use crate::extractor::DescriptorExtractor;

/// Builder for creating a [`DescriptorExtractor`]
#[derive(Debug, Clone, Default)]
pub struct ExtractorBuilder {
    config: ExtractorConfig,
}

impl ExtractorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Set the side of the canonical square
    pub fn canonical_size(mut self, size: u32) -> Self {
        self.config.canonical_size = size;
        self
    }

    pub fn root_sift_eps(mut self, eps: f32) -> Self {
        self.config.root_sift_eps = eps;
        self
    }

    /// Set the number of worker threads
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    pub fn sift(mut self, params: SiftParams) -> Self {
        self.config.sift = params;
        self
    }

    pub fn surf(mut self, params: SurfParams) -> Self {
        self.config.surf = params;
        self
    }

    pub fn orb_detect(mut self, params: OrbParams) -> Self {
        self.config.orb_detect = params;
        self
    }

    pub fn orb_compute(mut self, params: OrbParams) -> Self {
        self.config.orb_compute = params;
        self
    }

    pub fn orb_legacy(mut self, params: OrbParams) -> Self {
        self.config.orb_legacy = params;
        self
    }

    pub fn daisy_detector(mut self, params: FastParams) -> Self {
        self.config.daisy_detector = params;
        self
    }

    pub fn daisy(mut self, params: DaisyParams) -> Self {
        self.config.daisy = params;
        self
    }

    pub fn brisk(mut self, params: BriskParams) -> Self {
        self.config.brisk = params;
        self
    }

    /// One worker per logical CPU
    pub fn preset_parallel(mut self) -> Self {
        self.config.n_threads = ExtractorConfig::parallel().n_threads;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn to_config(self) -> ExtractorConfig {
        self.config
    }

    pub fn summary(&self) -> String {
        format!("ExtractorBuilder: {}", self.config.summary())
    }

    /// Validate the configuration and start the worker pool
    pub fn build(self) -> DescriptorResult<DescriptorExtractor> {
        DescriptorExtractor::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DescriptorError;

    #[test]
    fn test_fluent_setters() {
        let builder = ExtractorBuilder::new()
            .canonical_size(128)
            .threads(2)
            .root_sift_eps(1e-6)
            .brisk(BriskParams::default().with_threshold(20))
            .daisy(DaisyParams::default().with_radius(10.0));
        let config = builder.config();
        assert_eq!(config.canonical_size, 128);
        assert_eq!(config.n_threads, 2);
        assert_eq!(config.brisk.threshold, 20);
        assert_eq!(config.daisy.radius, 10.0);
        assert!(builder.summary().contains("128x128"));
    }

    #[test]
    fn test_build_validates() {
        assert!(matches!(
            ExtractorBuilder::new().threads(0).build(),
            Err(DescriptorError::InvalidConfig(_))
        ));
        assert!(ExtractorBuilder::new().preset_parallel().build().is_ok());
    }

    #[test]
    fn test_config_round_trip() {
        let config = ExtractorBuilder::new().canonical_size(64).to_config();
        assert_eq!(config.clone().to_builder().to_config(), config);
    }
}
