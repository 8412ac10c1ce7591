//! Rectangular region extraction and reinsertion

use crate::{types::Rectangle, utils::convert_like};
use image::{imageops, DynamicImage};
use tracing::{span, Level};

/// Crops and pastes rectangular regions of interest
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionSelector;

impl RegionSelector {
    /// Flip negative extents and clip the rectangle to `bounds`
    #[must_use]
    pub fn normalize(rect: Rectangle, bounds: (u32, u32)) -> Rectangle {
        let normalized = rect.normalize(bounds);
        if normalized != rect {
            log::debug!("Normalized region {rect} to {normalized}");
        }
        normalized
    }

    /// Crop a normalized rectangle out of `image`
    ///
    /// A zero-area rectangle yields an empty image of the same pixel format.
    #[must_use]
    pub fn extract(image: &DynamicImage, rect: Rectangle) -> DynamicImage {
        let rect = Self::normalize(rect, (image.width(), image.height()));
        let _span = span!(Level::DEBUG, "extract_region", region = %rect).entered();

        if rect.is_empty() {
            return image.crop_imm(0, 0, 0, 0);
        }
        image.crop_imm(
            rect.x as u32,
            rect.y as u32,
            rect.width as u32,
            rect.height as u32,
        )
    }

    /// Copy of `full` with `roi` pasted at the rectangle's origin
    ///
    /// Pixels outside the rectangle are untouched. A zero-area rectangle is a
    /// no-op, and a region larger than the rectangle is clipped to it.
    #[must_use]
    pub fn reinsert(full: &DynamicImage, roi: &DynamicImage, rect: Rectangle) -> DynamicImage {
        let rect = Self::normalize(rect, (full.width(), full.height()));
        let _span = span!(Level::DEBUG, "reinsert_region", region = %rect).entered();

        if rect.is_empty() || roi.width() == 0 || roi.height() == 0 {
            return full.clone();
        }

        if (roi.width(), roi.height()) != (rect.width as u32, rect.height as u32) {
            log::warn!(
                "Region is {}x{} but rectangle is {}x{}, pasting the overlap",
                roi.width(),
                roi.height(),
                rect.width,
                rect.height
            );
        }

        let patch = convert_like(roi, full).crop_imm(0, 0, rect.width as u32, rect.height as u32);
        let mut out = full.clone();
        let (x, y) = (i64::from(rect.x), i64::from(rect.y));

        match (&mut out, &patch) {
            (DynamicImage::ImageLuma8(dst), DynamicImage::ImageLuma8(src)) => {
                imageops::replace(dst, src, x, y);
            },
            (DynamicImage::ImageLumaA8(dst), DynamicImage::ImageLumaA8(src)) => {
                imageops::replace(dst, src, x, y);
            },
            (DynamicImage::ImageRgb8(dst), DynamicImage::ImageRgb8(src)) => {
                imageops::replace(dst, src, x, y);
            },
            (DynamicImage::ImageRgba8(dst), DynamicImage::ImageRgba8(src)) => {
                imageops::replace(dst, src, x, y);
            },
            (dst, src) => imageops::replace(dst, src, x, y),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([x as u8, y as u8, (x + y) as u8])
        }))
    }

    #[test]
    fn test_normalize_flips_and_clips() {
        assert_eq!(
            RegionSelector::normalize(Rectangle::new(50, 40, -20, -10), (100, 100)),
            Rectangle::new(30, 30, 20, 10)
        );
        assert_eq!(
            RegionSelector::normalize(Rectangle::new(-10, 90, 30, 30), (100, 100)),
            Rectangle::new(0, 90, 20, 10)
        );
        assert!(RegionSelector::normalize(Rectangle::new(200, 0, 10, 10), (100, 100)).is_empty());
    }

    #[test]
    fn test_extract_is_direct_crop() {
        let image = gradient(20, 10);
        let roi = RegionSelector::extract(&image, Rectangle::new(5, 2, 4, 3));
        assert_eq!(roi.dimensions(), (4, 3));
        assert_eq!(roi.get_pixel(0, 0), image.get_pixel(5, 2));
        assert_eq!(roi.get_pixel(3, 2), image.get_pixel(8, 4));
        assert!(matches!(roi, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_extract_zero_area() {
        let image = gradient(8, 8);
        let roi = RegionSelector::extract(&image, Rectangle::new(3, 3, 0, 5));
        assert_eq!(roi.dimensions(), (0, 0));
    }

    #[test]
    fn test_reinsert_only_touches_rectangle() {
        let image = gradient(16, 16);
        let rect = Rectangle::new(4, 6, 5, 3);
        let patch = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 3, Rgb([255, 0, 255])));
        let out = RegionSelector::reinsert(&image, &patch, rect);

        for (x, y, pixel) in out.pixels() {
            if rect.contains(x, y) {
                assert_eq!(pixel.0, [255, 0, 255, 255]);
            } else {
                assert_eq!(pixel, image.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_reinsert_zero_area_is_noop() {
        let image = gradient(6, 6);
        let patch = DynamicImage::ImageRgb8(RgbImage::new(3, 3));
        assert_eq!(
            RegionSelector::reinsert(&image, &patch, Rectangle::new(2, 2, 0, 0)),
            image
        );
    }

    #[test]
    fn test_reinsert_converts_patch_format() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([10])));
        let patch = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([200, 200, 200])));
        let out = RegionSelector::reinsert(&image, &patch, Rectangle::new(1, 1, 2, 2));

        let out = out.as_luma8().unwrap();
        assert_eq!(out.get_pixel(1, 1), &Luma([200]));
        assert_eq!(out.get_pixel(0, 0), &Luma([10]));
    }

    #[test]
    fn test_extract_then_reinsert_is_identity() {
        let image = gradient(12, 9);
        let rect = Rectangle::new(11, 8, -6, -4);
        let roi = RegionSelector::extract(&image, rect);
        assert_eq!(RegionSelector::reinsert(&image, &roi, rect), image);
    }
}
