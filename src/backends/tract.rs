//! Tract backend for learned denoising models
//!
//! Pure Rust ONNX inference with no native dependencies. Only the CPU
//! execution provider exists; the configured provider is ignored.

use crate::config::DenoiseConfig;
use crate::error::{DenoiseError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running denoising models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl TractBackend {
    /// Create a new uninitialized Tract backend
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Create a Tract backend with a pre-configured model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Set the model manager for this backend
    pub fn set_model_manager(&mut self, model_manager: ModelManager) {
        self.model_manager = Some(model_manager);
    }

    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let Some(ref model_manager) = self.model_manager else {
            return Err(DenoiseError::model(
                "No model manager available for Tract backend",
            ));
        };

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;
        let side = model_info.input_shape.2;

        log::info!(
            "Initializing Tract backend with model {} ({}, {}x{})",
            model_info.name,
            model_info.precision,
            side,
            side
        );
        let size_mb = model_info.size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("Model size: {size_mb:.2} MB");

        // Pin the input fact so optimization can resolve every shape up front
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| DenoiseError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| DenoiseError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| DenoiseError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| DenoiseError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl Default for TractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &DenoiseConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| DenoiseError::inference("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| DenoiseError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| DenoiseError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            DenoiseError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_array = output_data
            .to_owned()
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|e| {
                DenoiseError::inference(format!(
                    "Expected 4D output tensor, got {:?}: {e}",
                    output_tensor.shape()
                ))
            })?;

        log::debug!(
            "Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output_array.shape()
        );

        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_manager
            .as_ref()
            .map_or((1, 3, 512, 512), |manager| {
                let side = manager.input_size() as usize;
                (1, 3, side, side)
            })
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.input_shape()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| DenoiseError::internal("Model manager not initialized"))?;
        model_manager.get_info()
    }
}

#[cfg(all(test, feature = "tract"))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_tract_backend_creation() {
        let backend = TractBackend::new();

        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 512, 512));
        assert_eq!(backend.output_shape(), backend.input_shape());
        assert!(backend.get_model_info().is_err());
    }

    #[test]
    fn test_tract_backend_without_manager_fails_to_initialize() {
        let mut backend = TractBackend::default();
        assert!(backend.initialize(&DenoiseConfig::default()).is_err());
        assert!(!backend.is_initialized());

        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
    }

    #[test]
    fn test_tract_backend_rejects_invalid_model_bytes() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("model.json"),
            r#"{"name": "broken", "input_size": 64}"#,
        )
        .unwrap();
        fs::write(dir.path().join("model.onnx"), b"not an onnx graph").unwrap();

        let manager = ModelManager::with_external_model(dir.path()).unwrap();
        let mut backend = TractBackend::with_model_manager(manager);

        assert_eq!(backend.input_shape(), (1, 3, 64, 64));
        assert!(backend.initialize(&DenoiseConfig::default()).is_err());
        assert!(!backend.is_initialized());
    }
}
