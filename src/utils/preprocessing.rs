//! Tensor conversion for learned denoising models
//!
//! Models take a square NCHW tensor of RGB samples in `[0, 1]` and return a
//! tensor of the same layout.

use crate::error::{DenoiseError, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Resampling filter used on both sides of inference
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Resize to `side x side` and convert to a normalized NCHW tensor
    ///
    /// The aspect ratio is not preserved; [`ImagePreprocessor::tensor_to_image`]
    /// stretches the result back to the original dimensions.
    ///
    /// # Errors
    /// - `side` is zero
    pub fn image_to_tensor(image: &RgbImage, side: u32) -> Result<Array4<f32>> {
        if side == 0 {
            return Err(DenoiseError::processing("Model input size must be non-zero"));
        }

        let resized = image::imageops::resize(image, side, side, RESIZE_FILTER);
        let side = side as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match the resized image
        for (y, row) in resized.rows().enumerate() {
            for (x, pixel) in row.enumerate() {
                tensor[[0, 0, y, x]] = f32::from(pixel[0]) / 255.0; // R channel
                tensor[[0, 1, y, x]] = f32::from(pixel[1]) / 255.0; // G channel
                tensor[[0, 2, y, x]] = f32::from(pixel[2]) / 255.0; // B channel
            }
        }

        Ok(tensor)
    }

    /// Denormalize a model output and resize it to `width x height`
    ///
    /// # Errors
    /// - Output is not a single-batch, three-channel tensor
    /// - Output has a zero spatial dimension
    pub fn tensor_to_image(tensor: &Array4<f32>, width: u32, height: u32) -> Result<RgbImage> {
        let (batch, channels, out_h, out_w) = tensor.dim();
        if batch != 1 || channels != 3 {
            return Err(DenoiseError::inference(format!(
                "Expected model output of shape (1, 3, H, W), got {:?}",
                tensor.dim()
            )));
        }
        if out_h == 0 || out_w == 0 {
            return Err(DenoiseError::inference("Model output has zero spatial size"));
        }

        let to_u8 = |v: f32| {
            if v.is_nan() {
                0
            } else {
                (v * 255.0).round().clamp(0.0, 255.0) as u8
            }
        };

        let denormalized = RgbImage::from_fn(out_w as u32, out_h as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let sample = |c: usize| tensor.get([0, c, y, x]).copied().unwrap_or(0.0);
            image::Rgb([to_u8(sample(0)), to_u8(sample(1)), to_u8(sample(2))])
        });

        if denormalized.dimensions() == (width, height) {
            Ok(denormalized)
        } else {
            Ok(image::imageops::resize(
                &denormalized,
                width,
                height,
                RESIZE_FILTER,
            ))
        }
    }
}
