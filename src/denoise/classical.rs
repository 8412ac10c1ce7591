//! Classical denoising chain: non-local means, then bilateral smoothing

use super::{bilateral::bilateral_filter, kernels::map_samples, nlmeans::non_local_means, Denoiser};
use crate::config::{BilateralParams, DenoiseConfig, DenoisingStrategy, NonLocalMeansParams};
use image::DynamicImage;
use tracing::{span, Level};

/// Run the classical chain over an interleaved buffer
pub(crate) fn classical_chain(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    nlm: &NonLocalMeansParams,
    bilateral: &BilateralParams,
) -> Vec<u8> {
    let denoised = non_local_means(src, width, height, channels, nlm);
    bilateral_filter(&denoised, width, height, channels, bilateral)
}

/// Denoiser built only from classical filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassicalDenoiser {
    non_local_means: NonLocalMeansParams,
    bilateral: BilateralParams,
}

impl ClassicalDenoiser {
    #[must_use]
    pub fn new(non_local_means: NonLocalMeansParams, bilateral: BilateralParams) -> Self {
        Self {
            non_local_means,
            bilateral,
        }
    }

    #[must_use]
    pub fn from_config(config: &DenoiseConfig) -> Self {
        Self::new(config.non_local_means, config.bilateral)
    }

    #[must_use]
    pub fn non_local_means(&self) -> &NonLocalMeansParams {
        &self.non_local_means
    }

    #[must_use]
    pub fn bilateral(&self) -> &BilateralParams {
        &self.bilateral
    }
}

impl Denoiser for ClassicalDenoiser {
    fn denoise(&self, image: &DynamicImage) -> DynamicImage {
        let _span = span!(
            Level::DEBUG,
            "classical_denoise",
            width = image.width(),
            height = image.height(),
            strength = self.non_local_means.strength
        )
        .entered();

        map_samples(image, |src, width, height, channels| {
            classical_chain(
                src,
                width,
                height,
                channels,
                &self.non_local_means,
                &self.bilateral,
            )
        })
    }

    fn strategy(&self) -> DenoisingStrategy {
        DenoisingStrategy::Classical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn fast_denoiser() -> ClassicalDenoiser {
        ClassicalDenoiser::new(
            NonLocalMeansParams {
                strength: 10.0,
                search_window: 5,
                template_window: 3,
            },
            BilateralParams {
                diameter: 5,
                sigma_color: 75.0,
                sigma_space: 75.0,
            },
        )
    }

    #[test]
    fn test_preserves_dimensions_and_format() {
        let denoiser = fast_denoiser();

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_fn(13, 7, |x, y| {
            Rgb([(x * 19) as u8, (y * 31) as u8, 90])
        }));
        let out = denoiser.denoise(&rgb);
        assert_eq!((out.width(), out.height()), (13, 7));
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));

        let gray = DynamicImage::ImageLuma8(GrayImage::from_fn(6, 9, |x, _| Luma([(x * 40) as u8])));
        let out = denoiser.denoise(&gray);
        assert_eq!((out.width(), out.height()), (6, 9));
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_alpha_is_untouched() {
        let rgba = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, 40, 50, (y * 30) as u8]));
        let out = fast_denoiser().denoise(&DynamicImage::ImageRgba8(rgba.clone()));
        let out = out.as_rgba8().unwrap();
        for (a, b) in out.pixels().zip(rgba.pixels()) {
            assert_eq!(a.0[3], b.0[3]);
        }
    }

    #[test]
    fn test_flat_image_is_fixed_point() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([128, 128, 128])));
        assert_eq!(fast_denoiser().denoise(&flat), flat);
    }

    #[test]
    fn test_reports_classical_strategy() {
        let denoiser = ClassicalDenoiser::from_config(&DenoiseConfig::default());
        assert_eq!(denoiser.strategy(), DenoisingStrategy::Classical);
        assert_eq!(denoiser.non_local_means().search_window, 21);
        assert_eq!(denoiser.bilateral().diameter, 9);
        assert!(denoiser.model_name().is_none());
    }
}
