//! Mask-weighted blending of original and denoised pixels

use crate::{
    types::Mask,
    utils::{convert_like, from_raw_8bit, to_8bit},
};
use image::DynamicImage;
use tracing::{span, Level};

/// Combines original and processed images under a mask
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    /// `original * mask + processed * (1 - mask)` per sample, truncated to 8 bits
    ///
    /// A mask weight of 1 keeps the original pixel and 0 takes the processed
    /// one. The mask is broadcast across every channel, alpha included. If
    /// the inputs disagree in size the processed image is returned unchanged.
    #[must_use]
    pub fn blend(original: &DynamicImage, processed: &DynamicImage, mask: &Mask) -> DynamicImage {
        let (width, height) = (original.width(), original.height());
        let _span = span!(Level::DEBUG, "blend", width, height).entered();

        if (processed.width(), processed.height()) != (width, height) || mask.dimensions() != (width, height) {
            log::warn!(
                "Cannot blend {}x{} original with {}x{} processed image and {}x{} mask",
                width,
                height,
                processed.width(),
                processed.height(),
                mask.width(),
                mask.height()
            );
            return processed.clone();
        }

        let original = to_8bit(original);
        let processed = convert_like(processed, &original);
        let channels = usize::from(original.color().channel_count());

        let samples: Vec<u8> = original
            .as_bytes()
            .chunks_exact(channels)
            .zip(processed.as_bytes().chunks_exact(channels))
            .zip(mask.values())
            .flat_map(|((kept, denoised), &weight)| {
                kept.iter()
                    .zip(denoised)
                    .map(move |(&o, &p)| blend_sample(o, p, weight))
            })
            .collect();

        match from_raw_8bit(original.color(), width, height, samples) {
            Some(blended) => blended,
            None => {
                log::warn!("Blended buffer has unexpected size, keeping processed image");
                processed
            },
        }
    }
}

#[inline]
fn blend_sample(original: u8, processed: u8, weight: f32) -> u8 {
    let value = f32::from(original) * weight + f32::from(processed) * (1.0 - weight);
    value.clamp(0.0, 255.0) as u8
}
