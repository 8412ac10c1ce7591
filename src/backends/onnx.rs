//! ONNX Runtime backend for learned denoising models
//!
//! Supports CPU, CUDA and `CoreML` execution providers with availability
//! checks, falling back to CPU when a requested accelerator is missing.

use crate::config::{DenoiseConfig, ExecutionProvider};
use crate::error::{DenoiseError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// ONNX Runtime backend for running denoising models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: Option<ModelManager>,
    initialized: bool,
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        log::debug!(
            "ONNX Runtime providers on {}/{}: cuda={}, coreml={}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            cuda_available,
            coreml_available
        );

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a new ONNX backend with specific model manager
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager: Some(model_manager),
            initialized: false,
        }
    }

    /// Create a new ONNX backend without a model
    #[must_use]
    pub fn new() -> Self {
        Self {
            session: None,
            model_manager: None,
            initialized: false,
        }
    }

    /// Set the model manager for this backend
    pub fn set_model_manager(&mut self, model_manager: ModelManager) {
        self.model_manager = Some(model_manager);
    }

    /// Providers to register for the requested execution provider
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let coreml = CoreMLExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        let mut providers = Vec::new();
        match requested {
            ExecutionProvider::Auto => {
                if cuda_available {
                    providers.push(cuda.build());
                }
                if coreml_available {
                    providers.push(coreml.with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
            },
            ExecutionProvider::Cpu => {},
            ExecutionProvider::Cuda => {
                if cuda_available {
                    providers.push(cuda.build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available {
                    providers.push(coreml.with_subgraphs(true).build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }
        providers
    }

    fn load_model(&mut self, config: &DenoiseConfig) -> Result<std::time::Duration> {
        let model_load_start = std::time::Instant::now();

        let model_manager = self
            .model_manager
            .as_ref()
            .ok_or_else(|| DenoiseError::model("No model manager available for ONNX backend"))?;

        let model_data = model_manager.load_model()?;
        let model_info = model_manager.get_info()?;

        let mut session_builder = Session::builder()
            .map_err(|e| DenoiseError::inference(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                DenoiseError::inference(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            log::info!(
                "Hardware acceleration enabled with {count} provider(s)",
                count = providers.len()
            );
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    DenoiseError::inference(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(8)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| DenoiseError::inference(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                DenoiseError::inference(format!("Failed to create session from model data: {e}"))
            })?;

        log::debug!(
            "ONNX Runtime session created: model {} ({}), provider {}, {} intra-op threads",
            model_info.name,
            model_info.precision,
            config.execution_provider,
            intra_threads
        );

        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

impl Default for OnnxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &DenoiseConfig) -> Result<Option<std::time::Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DenoiseError::inference("ONNX session not initialized"))?;

        let inference_start = std::time::Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            DenoiseError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs and outputs avoid depending on tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| DenoiseError::inference(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| DenoiseError::inference("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| DenoiseError::inference("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    DenoiseError::inference(format!("Failed to extract output tensor: {e}"))
                })?
        };

        let output_shape = output_tensor.shape().to_vec();
        let result = output_tensor
            .view()
            .to_owned()
            .into_dimensionality::<ndarray::Ix4>()
            .map_err(|e| {
                DenoiseError::inference(format!(
                    "Expected 4D output tensor, got {output_shape:?}: {e}"
                ))
            })?;

        log::debug!(
            "Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(result)
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

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(all(test, feature = "onnx"))]
mod tests {
    use super::*;

    #[test]
    fn test_onnx_backend_creation() {
        let backend = OnnxBackend::new();
        assert!(!backend.is_initialized());
        assert_eq!(backend.input_shape(), (1, 3, 512, 512));
        assert!(backend.get_model_info().is_err());
    }

    #[test]
    fn test_onnx_backend_without_manager_fails() {
        let mut backend = OnnxBackend::default();
        assert!(backend.initialize(&DenoiseConfig::default()).is_err());

        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
    }

    #[test]
    fn test_cpu_provider_always_listed() {
        let providers = OnnxBackend::list_providers();
        assert!(providers
            .iter()
            .any(|(name, available, _)| name == "CPU" && *available));
    }
}
