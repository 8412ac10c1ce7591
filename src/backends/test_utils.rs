//! Test utilities and mock backends for testing inference functionality
//!
//! Mock implementations of the `InferenceBackend` trait exercise the
//! model-backed denoiser and its fallbacks without model files or native
//! inference engines.

use crate::{
    config::{BackendType, DenoiseConfig},
    error::{DenoiseError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, ModelManager},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// How a [`MockBackend`] responds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBackendBehavior {
    /// Return the input tensor unchanged
    Identity,
    /// Return a tensor of the input's shape filled with this value
    Constant(f32),
    /// Return the input inverted (`1 - x`)
    Invert,
    /// Fail during `initialize`
    FailInit,
    /// Fail during `infer`
    FailInference,
    /// Return a single-channel tensor instead of RGB
    WrongChannels,
}

/// Mock denoising backend for testing
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    model_info: ModelInfo,
    behavior: MockBackendBehavior,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Identity backend expecting `side x side` input
    #[must_use]
    pub fn new(side: usize) -> Self {
        Self::with_behavior(side, MockBackendBehavior::Identity)
    }

    #[must_use]
    pub fn with_behavior(side: usize, behavior: MockBackendBehavior) -> Self {
        Self {
            initialized: false,
            model_info: ModelInfo {
                name: "mock-denoiser".to_string(),
                precision: "fp32".to_string(),
                size_bytes: 1024 * 1024,
                input_shape: (1, 3, side, side),
                output_shape: (1, 3, side, side),
            },
            behavior,
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the call history, usable after the backend is boxed
    #[must_use]
    pub fn call_history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    /// Get the call history for verification in tests
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &DenoiseConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");

        if self.behavior == MockBackendBehavior::FailInit {
            return Err(DenoiseError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            return Ok(None);
        }

        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(DenoiseError::inference("Mock backend not initialized"));
        }

        match self.behavior {
            MockBackendBehavior::Identity => Ok(input.clone()),
            MockBackendBehavior::Constant(value) => Ok(Array4::from_elem(input.dim(), value)),
            MockBackendBehavior::Invert => Ok(input.mapv(|v| 1.0 - v)),
            MockBackendBehavior::FailInit | MockBackendBehavior::FailInference => {
                Err(DenoiseError::inference("Mock backend inference failed"))
            },
            MockBackendBehavior::WrongChannels => {
                let (n, _, h, w) = input.dim();
                Ok(Array4::zeros((n, 1, h, w)))
            },
        }
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.input_shape
    }

    fn output_shape(&self) -> (usize, usize, usize, usize) {
        self.model_info.output_shape
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_info.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Test factory producing [`MockBackend`]s regardless of the requested type
#[derive(Debug)]
pub struct MockBackendFactory {
    pub behavior: MockBackendBehavior,
    /// Whether to fail backend creation entirely
    pub fail_backend_creation: bool,
    /// Backend types passed to `create_backend`
    pub requested: Arc<Mutex<Vec<BackendType>>>,
}

impl MockBackendFactory {
    #[must_use]
    pub fn new(behavior: MockBackendBehavior) -> Self {
        Self {
            behavior,
            fail_backend_creation: false,
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a factory that fails to create backends
    #[must_use]
    pub fn new_creation_failing() -> Self {
        Self {
            fail_backend_creation: true,
            ..Self::new(MockBackendBehavior::Identity)
        }
    }
}

impl crate::backends::BackendFactory for MockBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(backend_type);
        }

        if self.fail_backend_creation {
            return Err(DenoiseError::invalid_config(
                "Mock factory configured to fail backend creation",
            ));
        }

        Ok(Box::new(MockBackend::with_behavior(
            model_manager.input_size() as usize,
            self.behavior,
        )))
    }

    fn available_backends(&self) -> Vec<BackendType> {
        vec![BackendType::Tract, BackendType::Onnx]
    }
}

/// Helper functions for creating test images and model folders
pub mod test_helpers {
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::fs;
    use tempfile::TempDir;

    /// Create a gradient test image with specified dimensions
    pub fn create_test_image(width: u32, height: u32) -> DynamicImage {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            Rgb([r, g, 128])
        });

        DynamicImage::ImageRgb8(img)
    }

    /// Create a model folder with a `model.json` and placeholder weights
    pub fn create_model_dir(input_size: u32) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("model.json"),
            format!(r#"{{"name": "mock-denoiser", "input_size": {input_size}}}"#),
        )
        .unwrap();
        fs::write(dir.path().join("model.onnx"), b"placeholder").unwrap();
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendFactory;

    #[test]
    fn test_mock_backend_requires_initialization() {
        let mut backend = MockBackend::new(8);
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());

        backend.initialize(&DenoiseConfig::default()).unwrap();
        assert_eq!(backend.infer(&input).unwrap(), input);
        assert_eq!(
            backend.get_call_history(),
            vec!["infer", "initialize", "infer"]
        );
    }

    #[test]
    fn test_mock_backend_behaviors() {
        let input = Array4::<f32>::from_elem((1, 3, 4, 4), 0.25);

        let mut constant = MockBackend::with_behavior(4, MockBackendBehavior::Constant(0.5));
        constant.initialize(&DenoiseConfig::default()).unwrap();
        assert!(constant.infer(&input).unwrap().iter().all(|&v| v == 0.5));

        let mut invert = MockBackend::with_behavior(4, MockBackendBehavior::Invert);
        invert.initialize(&DenoiseConfig::default()).unwrap();
        assert!(invert.infer(&input).unwrap().iter().all(|&v| v == 0.75));

        let mut wrong = MockBackend::with_behavior(4, MockBackendBehavior::WrongChannels);
        wrong.initialize(&DenoiseConfig::default()).unwrap();
        assert_eq!(wrong.infer(&input).unwrap().dim(), (1, 1, 4, 4));
    }

    #[test]
    fn test_mock_backend_factory() {
        let dir = test_helpers::create_model_dir(24);
        let manager = ModelManager::with_external_model(dir.path()).unwrap();

        let factory = MockBackendFactory::new(MockBackendBehavior::Identity);
        let backend = factory.create_backend(BackendType::Onnx, manager).unwrap();
        assert_eq!(backend.input_shape(), (1, 3, 24, 24));
        assert_eq!(*factory.requested.lock().unwrap(), vec![BackendType::Onnx]);

        let manager = ModelManager::with_external_model(dir.path()).unwrap();
        let failing = MockBackendFactory::new_creation_failing();
        assert!(failing.create_backend(BackendType::Tract, manager).is_err());
    }
}
