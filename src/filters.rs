//! Stylistic color filters applied to already processed images

use crate::{
    error::DenoiseError,
    utils::{Channel, ColorParts},
};
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{span, Level};

/// Named color transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFilter {
    /// Blue channel boosted by 20%
    AfterEffects,
    /// Red boosted by 20%, green by 10%
    Afterglow,
    /// Contrast 1.3 with brightness +10, optional letterbox bands
    Cinematic,
    /// Pass-through
    #[default]
    Identity,
}

impl ColorFilter {
    /// Filters that change pixels
    pub const NAMED: [ColorFilter; 3] = [Self::AfterEffects, Self::Afterglow, Self::Cinematic];

    /// Resolve a filter name, treating unknown names as [`ColorFilter::Identity`]
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::debug!("Unknown filter '{name}', leaving image unchanged");
            Self::Identity
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterEffects => "aftereffects",
            Self::Afterglow => "afterglow",
            Self::Cinematic => "cinematic",
            Self::Identity => "identity",
        }
    }
}

impl std::fmt::Display for ColorFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorFilter {
    type Err = DenoiseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aftereffects" => Ok(Self::AfterEffects),
            "afterglow" => Ok(Self::Afterglow),
            "cinematic" => Ok(Self::Cinematic),
            "identity" | "none" => Ok(Self::Identity),
            _ => Err(DenoiseError::invalid_config(format!(
                "Unknown filter: {s}. Supported: aftereffects, afterglow, cinematic"
            ))),
        }
    }
}

/// Apply `filter` to `image`
///
/// Alpha is left untouched. Channel filters leave grayscale images as they
/// are. With `letterbox`, the cinematic filter also blackens the top and
/// bottom tenth of the rows.
#[must_use]
pub fn apply_filter(image: &DynamicImage, filter: ColorFilter, letterbox: bool) -> DynamicImage {
    let _span = span!(Level::DEBUG, "filter", filter = %filter, letterbox).entered();

    if filter == ColorFilter::Identity || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let parts = ColorParts::split(image);
    let processed = match (&parts.base, filter) {
        (DynamicImage::ImageRgb8(rgb), ColorFilter::AfterEffects) => {
            DynamicImage::ImageRgb8(scale_channels(rgb, &[(Channel::Blue, 1.2)]))
        },
        (DynamicImage::ImageRgb8(rgb), ColorFilter::Afterglow) => DynamicImage::ImageRgb8(
            scale_channels(rgb, &[(Channel::Red, 1.2), (Channel::Green, 1.1)]),
        ),
        (DynamicImage::ImageRgb8(rgb), ColorFilter::Cinematic) => {
            let mut out = rgb.clone();
            out.iter_mut().for_each(|v| *v = contrast_brightness(*v));
            if letterbox {
                blacken_bands(&mut out);
            }
            DynamicImage::ImageRgb8(out)
        },
        (DynamicImage::ImageLuma8(gray), ColorFilter::Cinematic) => {
            let mut out: GrayImage = gray.clone();
            out.iter_mut().for_each(|v| *v = contrast_brightness(*v));
            if letterbox {
                blacken_bands(&mut out);
            }
            DynamicImage::ImageLuma8(out)
        },
        (base, _) => {
            log::debug!("Filter {filter} has no effect on single-channel images");
            base.clone()
        },
    };

    parts.merge(processed)
}

/// Apply the filter named `name`; unknown names return the image unchanged
#[must_use]
pub fn apply_named_filter(image: &DynamicImage, name: &str, letterbox: bool) -> DynamicImage {
    apply_filter(image, ColorFilter::from_name(name), letterbox)
}

/// Multiply channels by their factor, clamp, then truncate
fn scale_channels(rgb: &RgbImage, factors: &[(Channel, f32)]) -> RgbImage {
    let mut out = rgb.clone();
    for pixel in out.pixels_mut() {
        for &(channel, factor) in factors {
            if let Some(sample) = pixel.0.get_mut(channel.index()) {
                *sample = (f32::from(*sample) * factor).clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

#[inline]
fn contrast_brightness(value: u8) -> u8 {
    1.3f32
        .mul_add(f32::from(value), 10.0)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn blacken_bands<P>(image: &mut image::ImageBuffer<P, Vec<u8>>)
where
    P: image::Pixel<Subpixel = u8>,
{
    let height = image.height();
    let band = height / 10;
    if band == 0 {
        return;
    }
    let row_len = image.width() as usize * usize::from(P::CHANNEL_COUNT);
    for (row, samples) in image.chunks_mut(row_len).enumerate() {
        let row = row as u32;
        if row < band || row >= height - band {
            samples.fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, Rgba, RgbaImage};

    fn solid(rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 20, Rgb(rgb)))
    }

    fn pixel(image: &DynamicImage, x: u32, y: u32) -> [u8; 3] {
        image.as_rgb8().unwrap().get_pixel(x, y).0
    }

    #[test]
    fn test_aftereffects_boosts_blue() {
        let out = apply_filter(&solid([100, 100, 100]), ColorFilter::AfterEffects, false);
        assert_eq!(pixel(&out, 0, 0), [100, 100, 120]);

        let out = apply_filter(&solid([10, 20, 250]), ColorFilter::AfterEffects, false);
        assert_eq!(pixel(&out, 3, 19), [10, 20, 255]);
    }

    #[test]
    fn test_afterglow_boosts_red_and_green() {
        let out = apply_filter(&solid([100, 100, 100]), ColorFilter::Afterglow, false);
        assert_eq!(pixel(&out, 1, 1), [120, 110, 100]);

        // 33 * 1.1 = 36.3 truncates to 36
        let out = apply_filter(&solid([250, 33, 7]), ColorFilter::Afterglow, false);
        assert_eq!(pixel(&out, 1, 1), [255, 36, 7]);
    }

    #[test]
    fn test_cinematic_contrast() {
        let out = apply_filter(&solid([0, 100, 200]), ColorFilter::Cinematic, false);
        assert_eq!(pixel(&out, 2, 10), [10, 140, 255]);
        assert_eq!(pixel(&out, 2, 0), [10, 140, 255]);

        // 1.3 * 7 + 10 = 19.1
        let out = apply_filter(&solid([7, 7, 7]), ColorFilter::Cinematic, false);
        assert_eq!(pixel(&out, 0, 0), [19, 19, 19]);
    }

    #[test]
    fn test_cinematic_letterbox() {
        let out = apply_filter(&solid([100, 100, 100]), ColorFilter::Cinematic, true);
        assert_eq!(pixel(&out, 0, 0), [0, 0, 0]);
        assert_eq!(pixel(&out, 3, 1), [0, 0, 0]);
        assert_eq!(pixel(&out, 0, 2), [140, 140, 140]);
        assert_eq!(pixel(&out, 0, 17), [140, 140, 140]);
        assert_eq!(pixel(&out, 0, 18), [0, 0, 0]);
        assert_eq!(pixel(&out, 0, 19), [0, 0, 0]);
    }

    #[test]
    fn test_unknown_filter_is_identity() {
        let image = solid([1, 2, 3]);
        assert_eq!(apply_named_filter(&image, "not-a-real-filter", true), image);
        assert_eq!(ColorFilter::from_name("sepia"), ColorFilter::Identity);
        assert!("sepia".parse::<ColorFilter>().is_err());
        assert_eq!(" Cinematic ".parse::<ColorFilter>().unwrap(), ColorFilter::Cinematic);
    }

    #[test]
    fn test_alpha_preserved() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([100, 100, 100, 9])));
        let out = apply_filter(&rgba, ColorFilter::AfterEffects, false);
        assert_eq!(out.as_rgba8().unwrap().get_pixel(0, 0), &Rgba([100, 100, 120, 9]));
    }

    #[test]
    fn test_grayscale_handling() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([100])));
        assert_eq!(apply_filter(&gray, ColorFilter::Afterglow, false), gray);

        let out = apply_filter(&gray, ColorFilter::Cinematic, false);
        assert_eq!(out.as_luma8().unwrap().get_pixel(1, 1), &Luma([140]));
    }

    #[test]
    fn test_names_round_trip() {
        for filter in ColorFilter::NAMED {
            assert_eq!(ColorFilter::from_name(filter.as_str()), filter);
        }
        assert_eq!(
            serde_json::to_string(&ColorFilter::AfterEffects).unwrap(),
            "\"aftereffects\""
        );
    }
}
