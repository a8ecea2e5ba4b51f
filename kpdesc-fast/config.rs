use kpdesc_core::{FeatureError, FeatureResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// FAST corner detector settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FastParams {
    /// Intensity difference a circle pixel needs to count as brighter/darker.
    pub threshold: u8,
    /// Keep only corners whose score beats all 8 neighbours.
    pub nonmax_suppression: bool,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 10,
            nonmax_suppression: true,
        }
    }
}

impl FastParams {
    pub fn validate(&self) -> FeatureResult<()> {
        if self.threshold == u8::MAX {
            return Err(FeatureError::invalid_parameter(
                "threshold",
                "must be below 255",
            ));
        }
        Ok(())
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_nonmax_suppression(mut self, enable: bool) -> Self {
        self.nonmax_suppression = enable;
        self
    }
}

/// How ORB ranks FAST corners within a pyramid level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OrbScoreType {
    Harris,
    Fast,
}

/// ORB settings, shared by keypoint detection and rBRIEF description
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrbParams {
    pub n_features: usize,
    /// Ratio between consecutive pyramid levels, > 1.
    pub scale_factor: f32,
    pub n_levels: usize,
    /// Border in level pixels where no keypoint is detected.
    pub edge_threshold: u32,
    /// Points compared per descriptor element. Only 2 is supported.
    pub wta_k: u32,
    pub score_type: OrbScoreType,
    /// Side of the oriented patch used for orientation and description.
    pub patch_size: u32,
    pub fast_threshold: u8,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            n_features: 500,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            wta_k: 2,
            score_type: OrbScoreType::Harris,
            patch_size: 31,
            fast_threshold: 20,
        }
    }
}

impl OrbParams {
    pub fn validate(&self) -> FeatureResult<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(FeatureError::invalid_parameter(
                "scale_factor",
                format!("{} (must be > 1)", self.scale_factor),
            ));
        }
        if self.n_levels == 0 {
            return Err(FeatureError::invalid_parameter("n_levels", "must be > 0"));
        }
        if self.wta_k != 2 {
            return Err(FeatureError::invalid_parameter(
                "wta_k",
                format!("{} (only 2 is supported)", self.wta_k),
            ));
        }
        if self.patch_size < 2 {
            return Err(FeatureError::invalid_parameter(
                "patch_size",
                format!("{} (must be >= 2)", self.patch_size),
            ));
        }
        if self.fast_threshold == u8::MAX {
            return Err(FeatureError::invalid_parameter(
                "fast_threshold",
                "must be below 255",
            ));
        }
        Ok(())
    }

    pub fn with_n_features(mut self, n_features: usize) -> Self {
        self.n_features = n_features;
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_n_levels(mut self, n_levels: usize) -> Self {
        self.n_levels = n_levels;
        self
    }

    pub fn with_edge_threshold(mut self, edge_threshold: u32) -> Self {
        self.edge_threshold = edge_threshold;
        self
    }

    pub fn with_wta_k(mut self, wta_k: u32) -> Self {
        self.wta_k = wta_k;
        self
    }

    pub fn with_score_type(mut self, score_type: OrbScoreType) -> Self {
        self.score_type = score_type;
        self
    }

    pub fn with_patch_size(mut self, patch_size: u32) -> Self {
        self.patch_size = patch_size;
        self
    }

    pub fn with_fast_threshold(mut self, fast_threshold: u8) -> Self {
        self.fast_threshold = fast_threshold;
        self
    }

    /// Number of keypoints to keep on each pyramid level.
    ///
    /// The budget shrinks geometrically with the level area, the last level
    /// takes whatever is left.
    pub fn features_per_level(&self) -> Vec<usize> {
        let n_levels = self.n_levels.max(1);
        let factor = 1.0 / self.scale_factor as f64;
        let mut desired = self.n_features as f64 * (1.0 - factor)
            / (1.0 - factor.powi(n_levels as i32));

        let mut per_level = Vec::with_capacity(n_levels);
        let mut sum = 0usize;
        for _ in 0..n_levels - 1 {
            let n = desired.round().max(0.0) as usize;
            per_level.push(n);
            sum += n;
            desired *= factor;
        }
        per_level.push(self.n_features.saturating_sub(sum));
        per_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orb_is_valid() {
        assert!(OrbParams::default().validate().is_ok());
        assert!(FastParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_orb_params() {
        let p = OrbParams::default().with_scale_factor(1.0);
        assert!(matches!(
            p.validate(),
            Err(FeatureError::InvalidParameter { name: "scale_factor", .. })
        ));
        let p = OrbParams::default().with_wta_k(3);
        assert!(matches!(
            p.validate(),
            Err(FeatureError::InvalidParameter { name: "wta_k", .. })
        ));
        let p = OrbParams::default().with_n_levels(0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_features_per_level_sums_to_total() {
        for params in [
            OrbParams::default(),
            OrbParams::default().with_scale_factor(1.1),
            OrbParams::default().with_n_features(1200),
        ] {
            let per_level = params.features_per_level();
            assert_eq!(per_level.len(), params.n_levels);
            assert_eq!(per_level.iter().sum::<usize>(), params.n_features);
            // finer levels get at least as many features as coarser ones
            for w in per_level[..per_level.len() - 1].windows(2) {
                assert!(w[0] >= w[1]);
            }
        }
    }
}
