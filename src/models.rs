//! External denoising model discovery and loading

use crate::error::{DenoiseError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default model file name inside a model directory
pub const DEFAULT_MODEL_FILE: &str = "model.onnx";

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// External model folder containing `model.json` and the ONNX file
    External(PathBuf),
    /// No model file; the model-backed strategy runs its classical simulation
    Simulated,
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => {
                format!(
                    "external:{}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                )
            },
            ModelSource::Simulated => "simulated".to_string(),
        }
    }
}

/// Complete model specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
}

impl ModelSpec {
    /// Spec for an external model folder
    pub fn external<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            source: ModelSource::External(path.into()),
        }
    }

    #[must_use]
    pub fn simulated() -> Self {
        Self {
            source: ModelSource::Simulated,
        }
    }
}

/// Contents of `model.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Human-readable model name
    pub name: String,
    /// Side of the square input the model expects
    pub input_size: u32,
    /// Model file relative to the folder
    #[serde(default = "default_model_file")]
    pub file: String,
}

fn default_model_file() -> String {
    DEFAULT_MODEL_FILE.to_string()
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Model manager for an external model folder
#[derive(Debug, Clone)]
pub struct ModelManager {
    model_dir: PathBuf,
    descriptor: ModelDescriptor,
}

impl ModelManager {
    /// Create a new model manager from a model specification
    ///
    /// # Errors
    /// - `ModelSource::Simulated` has no model file to manage
    /// - Any error from [`ModelManager::with_external_model`]
    pub fn from_spec(spec: &ModelSpec) -> Result<Self> {
        match &spec.source {
            ModelSource::External(path) => Self::with_external_model(path),
            ModelSource::Simulated => Err(DenoiseError::model(
                "Simulated model source has no model file",
            )),
        }
    }

    /// Create model manager with external model from folder path
    ///
    /// # Errors
    /// - Model path does not exist or is not a directory
    /// - Missing or invalid `model.json`
    /// - Zero `input_size`
    /// - Model file named by `model.json` does not exist
    pub fn with_external_model<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_dir = model_path.as_ref().to_path_buf();

        if !model_dir.exists() {
            return Err(DenoiseError::invalid_config(format!(
                "Model path does not exist: {}",
                model_dir.display()
            )));
        }

        if !model_dir.is_dir() {
            return Err(DenoiseError::invalid_config(format!(
                "Model path must be a directory: {}",
                model_dir.display()
            )));
        }

        let json_path = model_dir.join("model.json");
        let json_content = fs::read_to_string(&json_path).map_err(|e| {
            DenoiseError::model_error_with_context(
                "read configuration of",
                &model_dir,
                &format!("model.json: {e}"),
                &["add a model.json with name and input_size"],
            )
        })?;

        let descriptor: ModelDescriptor = serde_json::from_str(&json_content).map_err(|e| {
            DenoiseError::invalid_config(format!("Failed to parse model.json: {e}"))
        })?;

        if descriptor.input_size == 0 {
            return Err(DenoiseError::config_value_error(
                "model input_size",
                descriptor.input_size,
                ">= 1",
                None,
            ));
        }

        let model_file = model_dir.join(&descriptor.file);
        if !model_file.is_file() {
            return Err(DenoiseError::model_error_with_context(
                "locate",
                &model_file,
                "file not found",
                &["check the 'file' entry in model.json"],
            ));
        }

        log::debug!(
            "Resolved model '{}' ({}x{}) at {}",
            descriptor.name,
            descriptor.input_size,
            descriptor.input_size,
            model_file.display()
        );

        Ok(Self {
            model_dir,
            descriptor,
        })
    }

    /// Load model data
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let path = self.get_model_path();
        fs::read(&path).map_err(|e| DenoiseError::file_io_error("read model", &path, &e))
    }

    /// Get model information
    ///
    /// # Errors
    /// - Model file metadata cannot be read
    pub fn get_info(&self) -> Result<ModelInfo> {
        let path = self.get_model_path();
        let size_bytes = fs::metadata(&path)
            .map_err(|e| DenoiseError::file_io_error("inspect model", &path, &e))?
            .len() as usize;
        let side = self.descriptor.input_size as usize;

        Ok(ModelInfo {
            name: self.descriptor.name.clone(),
            precision: "fp32".to_string(),
            size_bytes,
            input_shape: (1, 3, side, side),
            output_shape: (1, 3, side, side),
        })
    }

    /// Full path of the model file
    #[must_use]
    pub fn get_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.descriptor.file)
    }

    #[must_use]
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn input_size(&self) -> u32 {
        self.descriptor.input_size
    }
}
