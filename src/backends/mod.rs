//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (high performance, GPU acceleration)
//! - Tract backend (pure Rust, no external dependencies)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

use crate::{
    config::BackendType,
    error::Result,
    inference::InferenceBackend,
    models::ModelManager,
};

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the engines enabled through cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            BackendType::Onnx => {
                #[cfg(feature = "onnx")]
                {
                    Ok(Box::new(OnnxBackend::with_model_manager(model_manager)))
                }
                #[cfg(not(feature = "onnx"))]
                {
                    drop(model_manager);
                    Err(crate::error::DenoiseError::invalid_config(
                        "ONNX backend not compiled in. Rebuild with --features onnx",
                    ))
                }
            },
            BackendType::Tract => {
                #[cfg(feature = "tract")]
                {
                    Ok(Box::new(TractBackend::with_model_manager(model_manager)))
                }
                #[cfg(not(feature = "tract"))]
                {
                    drop(model_manager);
                    Err(crate::error::DenoiseError::invalid_config(
                        "Tract backend not compiled in. Rebuild with --features tract",
                    ))
                }
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        backends
    }
}
