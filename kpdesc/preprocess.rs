//! Conversion of caller images to the canonical grayscale input.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgb};
use kpdesc_core::resize::resize_area;

use crate::error::{DescriptorError, DescriptorResult};

/// Side of the square every image and mask is resized to.
pub const CANONICAL_SIZE: u32 = 256;

/// Image and binarized mask at the canonical resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalInput {
    pub image: GrayImage,
    pub mask: Option<GrayImage>,
}

/// `0.299 R + 0.587 G + 0.114 B` in 14-bit fixed point, rounded.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

fn gray_from<P, F>(img: &ImageBuffer<P, Vec<P::Subpixel>>, to_u8: F) -> GrayImage
where
    P: Pixel,
    F: Fn(P::Subpixel) -> u8,
{
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let c = img.get_pixel(x, y).channels();
        Luma([luma(to_u8(c[0]), to_u8(c[1]), to_u8(c[2]))])
    })
}

/// Single-channel intensity of a 3-channel image.
///
/// 16-bit and float channels are first brought to the 8-bit range. Any other
/// layout, and empty images, are [`DescriptorError::InvalidImage`].
pub fn to_intensity(image: &DynamicImage) -> DescriptorResult<GrayImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DescriptorError::InvalidImage(format!(
            "empty image ({}x{})",
            image.width(),
            image.height()
        )));
    }
    let gray = match image {
        DynamicImage::ImageRgb8(img) => gray_from::<Rgb<u8>, _>(img, |v| v),
        DynamicImage::ImageRgb16(img) => gray_from::<Rgb<u16>, _>(img, |v| ((v as u32 + 128) / 257) as u8),
        DynamicImage::ImageRgb32F(img) => gray_from::<Rgb<f32>, _>(img, |v| (v.clamp(0.0, 1.0) * 255.0).round() as u8),
        other => {
            return Err(DescriptorError::InvalidImage(format!(
                "expected 3 color channels, got {:?} with {} channel(s)",
                other.color(),
                other.color().channel_count()
            )))
        }
    };
    Ok(gray)
}

/// Nonzero pixels become 255, zero stays 0.
pub fn binarize_mask(mask: &GrayImage) -> GrayImage {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get_pixel(x, y)[0] != 0 { 255 } else { 0 }])
    })
}

/// Converts `image` to intensity and resizes it, and the mask if present, to
/// `size` x `size`. The mask is binarized after resizing.
pub fn prepare(image: &DynamicImage, mask: Option<&GrayImage>, size: u32) -> DescriptorResult<CanonicalInput> {
    let intensity = to_intensity(image)?;
    if let Some(m) = mask {
        if m.width() == 0 || m.height() == 0 {
            return Err(DescriptorError::InvalidImage(format!(
                "empty mask ({}x{})",
                m.width(),
                m.height()
            )));
        }
    }
    let image = resize_area(&intensity, size, size);
    let mask = mask.map(|m| binarize_mask(&resize_area(m, size, size)));
    Ok(CanonicalInput { image, mask })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgb32FImage, RgbImage, RgbaImage};

    #[test]
    fn test_luma_weights() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 0, 0), 76);
        assert_eq!(luma(0, 255, 0), 150);
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn test_block_image_resizes_exactly() {
        // 2x2 constant blocks halve to their block values
        let img = RgbImage::from_fn(512, 512, |x, y| {
            let v = (((x / 2) * 7 + (y / 2) * 13) % 256) as u8;
            Rgb([v, v, v])
        });
        let input = prepare(&DynamicImage::ImageRgb8(img), None, CANONICAL_SIZE).unwrap();
        assert_eq!(input.image.dimensions(), (256, 256));
        for (x, y, p) in input.image.enumerate_pixels() {
            assert_eq!(p[0], ((x * 7 + y * 13) % 256) as u8);
        }
        assert!(input.mask.is_none());
    }

    #[test]
    fn test_mask_is_resized_then_binarized() {
        let img = RgbImage::from_pixel(100, 60, Rgb([10, 20, 30]));
        let mask = GrayImage::from_fn(100, 60, |x, _| Luma([if x < 50 { 1 } else { 0 }]));
        let input = prepare(&DynamicImage::ImageRgb8(img), Some(&mask), CANONICAL_SIZE).unwrap();
        let mask = input.mask.unwrap();
        assert_eq!(mask.dimensions(), (256, 256));
        assert!(mask.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(mask.get_pixel(10, 100)[0], 255);
        assert_eq!(mask.get_pixel(250, 100)[0], 0);
    }

    #[test]
    fn test_wider_formats() {
        let img = Rgb32FImage::from_pixel(8, 8, Rgb([1.0, 1.0, 1.0]));
        let gray = to_intensity(&DynamicImage::ImageRgb32F(img)).unwrap();
        assert!(gray.pixels().all(|p| p[0] == 255));

        let img = image::ImageBuffer::from_pixel(4, 4, Rgb([65535u16, 0, 0]));
        let gray = to_intensity(&DynamicImage::ImageRgb16(img)).unwrap();
        assert!(gray.pixels().all(|p| p[0] == 76));
    }

    #[test]
    fn test_rejects_other_layouts() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(10, 10));
        assert!(matches!(to_intensity(&gray), Err(DescriptorError::InvalidImage(_))));
        let rgba = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));
        assert!(matches!(to_intensity(&rgba), Err(DescriptorError::InvalidImage(_))));
        let la = DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(3, 3, LumaA([1, 2])));
        assert!(to_intensity(&la).is_err());
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 5));
        assert!(matches!(to_intensity(&empty), Err(DescriptorError::InvalidImage(_))));
    }
}
