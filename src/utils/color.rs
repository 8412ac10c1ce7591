//! Channel conventions and pixel format normalization
//!
//! The pipeline works on 8-bit `Luma` or `Rgb` buffers. Alpha is split off
//! before processing and reattached unchanged afterwards; 16-bit and float
//! inputs come back as their 8-bit counterparts.

use image::{
    ColorType, DynamicImage, GrayAlphaImage, GrayImage, Luma, LumaA, RgbImage, Rgba, RgbaImage,
};

/// Named color channel of an RGB buffer
///
/// Buffers produced by the `image` crate store samples in R, G, B order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    /// Sample index of this channel within an `Rgb<u8>` pixel
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }
}

/// An image reduced to the formats the pipeline operates on
#[derive(Debug, Clone, PartialEq)]
pub struct ColorParts {
    /// `ImageLuma8` or `ImageRgb8`
    pub base: DynamicImage,
    /// Alpha channel of the source, if it had one
    pub alpha: Option<GrayImage>,
}

impl ColorParts {
    /// Split alpha off and normalize the remaining channels to 8 bits
    #[must_use]
    pub fn split(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Self {
                base: image.clone(),
                alpha: None,
            },
            DynamicImage::ImageLumaA8(buffer) => Self::split_luma_alpha(buffer),
            DynamicImage::ImageRgba8(buffer) => Self::split_rgba(buffer),
            other => {
                let color = other.color();
                match (color.has_color(), color.has_alpha()) {
                    (true, true) => Self::split_rgba(&other.to_rgba8()),
                    (true, false) => Self::from_base(DynamicImage::ImageRgb8(other.to_rgb8())),
                    (false, true) => Self::split_luma_alpha(&other.to_luma_alpha8()),
                    (false, false) => {
                        Self::from_base(DynamicImage::ImageLuma8(other.to_luma8()))
                    },
                }
            },
        }
    }

    fn from_base(base: DynamicImage) -> Self {
        Self { base, alpha: None }
    }

    fn split_rgba(buffer: &RgbaImage) -> Self {
        let (width, height) = buffer.dimensions();
        let rgb = RgbImage::from_fn(width, height, |x, y| {
            let [r, g, b, _] = buffer.get_pixel(x, y).0;
            image::Rgb([r, g, b])
        });
        let alpha = GrayImage::from_fn(width, height, |x, y| Luma([buffer.get_pixel(x, y).0[3]]));
        Self {
            base: DynamicImage::ImageRgb8(rgb),
            alpha: Some(alpha),
        }
    }

    fn split_luma_alpha(buffer: &GrayAlphaImage) -> Self {
        let (width, height) = buffer.dimensions();
        let luma = GrayImage::from_fn(width, height, |x, y| Luma([buffer.get_pixel(x, y).0[0]]));
        let alpha = GrayImage::from_fn(width, height, |x, y| Luma([buffer.get_pixel(x, y).0[1]]));
        Self {
            base: DynamicImage::ImageLuma8(luma),
            alpha: Some(alpha),
        }
    }

    /// Reattach the stored alpha channel to a processed base image
    #[must_use]
    pub fn merge(self, processed: DynamicImage) -> DynamicImage {
        let Some(alpha) = self.alpha else {
            return processed;
        };

        if alpha.dimensions() != (processed.width(), processed.height()) {
            tracing::warn!(
                alpha = ?alpha.dimensions(),
                image = ?(processed.width(), processed.height()),
                "Alpha channel size mismatch, dropping alpha"
            );
            return processed;
        }

        match processed {
            DynamicImage::ImageLuma8(luma) => {
                let (width, height) = luma.dimensions();
                DynamicImage::ImageLumaA8(GrayAlphaImage::from_fn(width, height, |x, y| {
                    LumaA([luma.get_pixel(x, y).0[0], alpha.get_pixel(x, y).0[0]])
                }))
            },
            DynamicImage::ImageRgb8(rgb) => {
                let (width, height) = rgb.dimensions();
                DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
                    let [r, g, b] = rgb.get_pixel(x, y).0;
                    Rgba([r, g, b, alpha.get_pixel(x, y).0[0]])
                }))
            },
            other => other,
        }
    }
}

/// Whether the image has a single intensity channel
#[must_use]
pub fn is_grayscale(image: &DynamicImage) -> bool {
    !image.color().has_color()
}

/// Convert to the 8-bit variant with the same channel layout
///
/// Already 8-bit images are returned unchanged.
#[must_use]
pub fn to_8bit(image: &DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => image.clone(),
        other => {
            let color = other.color();
            match (color.has_color(), color.has_alpha()) {
                (true, true) => DynamicImage::ImageRgba8(other.to_rgba8()),
                (true, false) => DynamicImage::ImageRgb8(other.to_rgb8()),
                (false, true) => DynamicImage::ImageLumaA8(other.to_luma_alpha8()),
                (false, false) => DynamicImage::ImageLuma8(other.to_luma8()),
            }
        },
    }
}

/// Convert `image` to the 8-bit pixel format of `reference`
#[must_use]
pub fn convert_like(image: &DynamicImage, reference: &DynamicImage) -> DynamicImage {
    if image.color() == reference.color() {
        return image.clone();
    }
    match reference.color() {
        ColorType::L8 => DynamicImage::ImageLuma8(image.to_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}

/// Rebuild an 8-bit image of `color` from interleaved samples
#[must_use]
pub fn from_raw_8bit(color: ColorType, width: u32, height: u32, samples: Vec<u8>) -> Option<DynamicImage> {
    match color {
        ColorType::L8 => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        ColorType::La8 => {
            GrayAlphaImage::from_raw(width, height, samples).map(DynamicImage::ImageLumaA8)
        },
        ColorType::Rgb8 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        ColorType::Rgba8 => RgbaImage::from_raw(width, height, samples).map(DynamicImage::ImageRgba8),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_channel_indices_follow_rgb_order() {
        let pixel = Rgb([10u8, 20, 30]);
        assert_eq!(pixel.0[Channel::Red.index()], 10);
        assert_eq!(pixel.0[Channel::Green.index()], 20);
        assert_eq!(pixel.0[Channel::Blue.index()], 30);
    }

    #[test]
    fn test_rgba_split_and_merge() {
        let rgba = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8, y as u8, 7, 100 + x as u8]));
        let image = DynamicImage::ImageRgba8(rgba.clone());

        let parts = ColorParts::split(&image);
        assert!(matches!(parts.base, DynamicImage::ImageRgb8(_)));
        assert_eq!(parts.alpha.as_ref().unwrap().get_pixel(2, 1).0[0], 102);

        let base = parts.base.clone();
        let merged = parts.merge(base);
        assert_eq!(merged, DynamicImage::ImageRgba8(rgba));
    }

    #[test]
    fn test_luma_alpha_split_and_merge() {
        let la = GrayAlphaImage::from_fn(2, 2, |x, y| LumaA([(x * 50) as u8, (y * 60) as u8]));
        let image = DynamicImage::ImageLumaA8(la.clone());

        let parts = ColorParts::split(&image);
        assert!(matches!(parts.base, DynamicImage::ImageLuma8(_)));
        let base = parts.base.clone();
        assert_eq!(parts.merge(base), DynamicImage::ImageLumaA8(la));
    }

    #[test]
    fn test_sixteen_bit_is_normalized() {
        let rgb16: ImageBuffer<Rgb<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(2, 2, Rgb([65535, 0, 32896]));
        let parts = ColorParts::split(&DynamicImage::ImageRgb16(rgb16));

        assert!(parts.alpha.is_none());
        let rgb = parts.base.as_rgb8().unwrap();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 128]));
    }

    #[test]
    fn test_merge_without_alpha_is_passthrough() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let parts = ColorParts::split(&image);
        assert_eq!(parts.merge(image.clone()), image);
    }

    #[test]
    fn test_merge_with_mismatched_alpha_drops_it() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 4])));
        let parts = ColorParts::split(&image);
        let smaller = DynamicImage::ImageRgb8(RgbImage::new(2, 2));
        assert!(matches!(parts.merge(smaller), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_is_grayscale() {
        assert!(is_grayscale(&DynamicImage::ImageLuma8(GrayImage::new(1, 1))));
        assert!(!is_grayscale(&DynamicImage::ImageRgb8(RgbImage::new(1, 1))));
    }

    #[test]
    fn test_to_8bit_and_convert_like() {
        let rgba16: ImageBuffer<Rgba<u16>, Vec<u16>> =
            ImageBuffer::from_pixel(2, 2, Rgba([65535, 0, 0, 65535]));
        let converted = to_8bit(&DynamicImage::ImageRgba16(rgba16));
        assert_eq!(converted.color(), ColorType::Rgba8);

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([9])));
        let as_rgb = convert_like(&gray, &DynamicImage::ImageRgb8(RgbImage::new(1, 1)));
        assert_eq!(as_rgb.as_rgb8().unwrap().get_pixel(1, 1), &Rgb([9, 9, 9]));
        assert_eq!(convert_like(&gray, &gray), gray);
    }

    #[test]
    fn test_from_raw_8bit() {
        let image = from_raw_8bit(ColorType::La8, 2, 1, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(image.as_luma_alpha8().unwrap().get_pixel(1, 0), &LumaA([3, 4]));
        assert!(from_raw_8bit(ColorType::Rgb8, 2, 2, vec![0; 5]).is_none());
        assert!(from_raw_8bit(ColorType::Rgb16, 1, 1, vec![0; 6]).is_none());
    }
}
