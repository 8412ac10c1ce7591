//! Inference backend abstraction for learned denoising models

use crate::{config::DenoiseConfig, error::Result, models::ModelInfo};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// Tensors are NCHW with RGB channels and samples in `[0, 1]`. The output is
/// expected to have the same layout as the input.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// Returns the model load time, or `None` when already initialized.
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    fn initialize(&mut self, config: &DenoiseConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion errors or unexpected output rank
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get the expected input shape for this backend
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Get the expected output shape for this backend
    fn output_shape(&self) -> (usize, usize, usize, usize);

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    /// - Model metadata unavailable
    fn get_model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
