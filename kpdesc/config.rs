use kpdesc_brisk::BriskParams;
use kpdesc_daisy::DaisyParams;
use kpdesc_fast::{FastParams, OrbParams};
use kpdesc_sift::SiftParams;
use kpdesc_surf::SurfParams;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::builder::ExtractorBuilder;
use crate::error::{DescriptorError, DescriptorResult};
use crate::normalize::ROOT_SIFT_EPS;
use crate::preprocess::CANONICAL_SIZE;

/// Settings of a [`DescriptorExtractor`](crate::DescriptorExtractor): the
/// canonical resolution, worker threads and one parameter block per
/// algorithm instance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractorConfig {
    /// Side of the square images and masks are resized to.
    pub canonical_size: u32,
    /// Added to the L1 norm before RootSIFT normalization.
    pub root_sift_eps: f32,
    pub n_threads: usize,
    pub sift: SiftParams,
    pub surf: SurfParams,
    /// ORB instance that only detects.
    pub orb_detect: OrbParams,
    /// ORB instance that only describes.
    pub orb_compute: OrbParams,
    /// Single-instance ORB of [`legacy_orb_descriptors`](crate::legacy_orb_descriptors).
    pub orb_legacy: OrbParams,
    pub daisy_detector: FastParams,
    pub daisy: DaisyParams,
    pub brisk: BriskParams,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            canonical_size: CANONICAL_SIZE,
            root_sift_eps: ROOT_SIFT_EPS,
            n_threads: 1,
            sift: SiftParams::default(),
            surf: SurfParams::default(),
            orb_detect: OrbParams::default().with_fast_threshold(5).with_scale_factor(1.1),
            orb_compute: OrbParams::default().with_wta_k(2),
            orb_legacy: OrbParams::default().with_n_features(1200).with_wta_k(2),
            daisy_detector: FastParams::default(),
            daisy: DaisyParams::default(),
            brisk: BriskParams::default(),
        }
    }
}

impl ExtractorConfig {
    /// Default settings with one worker per logical CPU.
    pub fn parallel() -> Self {
        Self {
            n_threads: num_cpus::get().max(1),
            ..Self::default()
        }
    }

    pub fn to_builder(self) -> ExtractorBuilder {
        ExtractorBuilder::from_config(self)
    }

    pub fn summary(&self) -> String {
        format!(
            "ExtractorConfig: {0}x{0}, threads={1}, root_sift_eps={2:e}, orb_detect=[fast:{3}, scale:{4}], daisy=[R:{5}, rings:{6}], brisk=[t:{7}, octaves:{8}]",
            self.canonical_size,
            self.n_threads,
            self.root_sift_eps,
            self.orb_detect.fast_threshold,
            self.orb_detect.scale_factor,
            self.daisy.radius,
            self.daisy.q_radius,
            self.brisk.threshold,
            self.brisk.n_octaves
        )
    }

    pub fn validate(&self) -> DescriptorResult<()> {
        if self.canonical_size == 0 {
            return Err(DescriptorError::InvalidConfig("canonical_size must be > 0".to_string()));
        }
        if !self.root_sift_eps.is_finite() || self.root_sift_eps <= 0.0 {
            return Err(DescriptorError::InvalidConfig(format!(
                "root_sift_eps must be finite and > 0, got {}",
                self.root_sift_eps
            )));
        }
        if self.n_threads == 0 {
            return Err(DescriptorError::InvalidConfig("n_threads must be > 0".to_string()));
        }
        self.sift.validate()?;
        self.surf.validate()?;
        self.orb_detect.validate()?;
        self.orb_compute.validate()?;
        self.orb_legacy.validate()?;
        self.daisy_detector.validate()?;
        self.daisy.validate()?;
        self.brisk.validate()?;
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> DescriptorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> DescriptorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> DescriptorResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> DescriptorResult<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> DescriptorResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> DescriptorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> DescriptorResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> DescriptorResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dispatch_table() {
        let config = ExtractorConfig::default();
        assert_eq!(config.canonical_size, 256);
        assert_eq!(config.n_threads, 1);
        assert_eq!(config.orb_detect.fast_threshold, 5);
        assert_eq!(config.orb_detect.scale_factor, 1.1);
        assert_eq!(config.orb_compute.wta_k, 2);
        assert_eq!(config.orb_legacy.n_features, 1200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            ExtractorConfig {
                canonical_size: 0,
                ..Default::default()
            },
            ExtractorConfig {
                n_threads: 0,
                ..Default::default()
            },
            ExtractorConfig {
                root_sift_eps: 0.0,
                ..Default::default()
            },
            ExtractorConfig {
                root_sift_eps: f32::NAN,
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(DescriptorError::InvalidConfig(_))));
        }

        let bad_orb = ExtractorConfig {
            orb_compute: OrbParams::default().with_wta_k(3),
            ..Default::default()
        };
        assert!(matches!(bad_orb.validate(), Err(DescriptorError::Feature(_))));
    }

    #[test]
    fn test_parallel_preset() {
        let config = ExtractorConfig::parallel();
        assert!(config.n_threads >= 1);
        assert!(config.summary().contains("256x256"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_and_toml_round_trip() {
        let config = ExtractorConfig {
            canonical_size: 128,
            n_threads: 3,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(ExtractorConfig::from_json(&json).unwrap(), config);
        let toml_str = config.to_toml().unwrap();
        assert_eq!(ExtractorConfig::from_toml(&toml_str).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_load_validates() {
        let mut json: serde_json::Value = serde_json::from_str(&ExtractorConfig::default().to_json().unwrap()).unwrap();
        json["n_threads"] = serde_json::Value::from(0);
        assert!(ExtractorConfig::from_json(&json.to_string()).is_err());
    }
}
