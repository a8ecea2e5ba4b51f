use image::{DynamicImage, GrayImage};
use kpdesc_core::Descriptors;

use crate::config::ExtractorConfig;
use crate::error::DescriptorResult;
use crate::method::DescriptorMethod;
use crate::preprocess::{prepare, CanonicalInput};

/// Descriptor extraction with a fixed configuration and its own worker pool.
#[derive(Debug)]
pub struct DescriptorExtractor {
    config: ExtractorConfig,
    pool: rayon::ThreadPool,
}

impl DescriptorExtractor {
    pub fn new(config: ExtractorConfig) -> DescriptorResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.n_threads)
            .build()?;
        log::debug!("{}", config.summary());
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Converts `image` and `mask` to the canonical grayscale input.
    pub fn prepare(&self, image: &DynamicImage, mask: Option<&GrayImage>) -> DescriptorResult<CanonicalInput> {
        prepare(image, mask, self.config.canonical_size)
    }

    /// Descriptors of `image` with the method named `method`.
    pub fn extract(
        &self,
        image: &DynamicImage,
        mask: Option<&GrayImage>,
        method: &str,
    ) -> DescriptorResult<Option<Descriptors>> {
        let method: DescriptorMethod = method.parse()?;
        self.extract_method(image, mask, method)
    }

    pub fn extract_method(
        &self,
        image: &DynamicImage,
        mask: Option<&GrayImage>,
        method: DescriptorMethod,
    ) -> DescriptorResult<Option<Descriptors>> {
        let input = self.prepare(image, mask)?;
        self.pool.install(|| method.compute(&input, &self.config))
    }

    /// The retired single-pass ORB on the canonical input.
    pub fn extract_legacy_orb(
        &self,
        image: &DynamicImage,
        mask: Option<&GrayImage>,
    ) -> DescriptorResult<Option<Descriptors>> {
        let input = self.prepare(image, mask)?;
        self.pool
            .install(|| DescriptorMethod::compute_legacy_orb(&input, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DescriptorError;
    use image::RgbImage;

    #[test]
    fn test_unknown_method_before_any_work() {
        let extractor = DescriptorExtractor::new(ExtractorConfig::default()).unwrap();
        // the image is invalid too; the method is checked first
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            extractor.extract(&empty, None, "freak"),
            Err(DescriptorError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_extractor_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DescriptorExtractor>();
    }

    #[test]
    fn test_prepare_uses_configured_size() {
        let extractor = DescriptorExtractor::new(ExtractorConfig {
            canonical_size: 64,
            ..Default::default()
        })
        .unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 30));
        assert_eq!(extractor.prepare(&img, None).unwrap().image.dimensions(), (64, 64));
    }
}
