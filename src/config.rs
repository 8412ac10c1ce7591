//! Configuration types for denoising operations

use crate::{error::DenoiseError, models::ModelSpec};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Inference engine used for learned models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// Tract backend (pure Rust, no external dependencies)
    #[default]
    Tract,
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

impl FromStr for BackendType {
    type Err = DenoiseError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" | "ort" => Ok(Self::Onnx),
            other => Err(DenoiseError::invalid_config(format!(
                "Unknown backend '{}'. Expected tract or onnx",
                other
            ))),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Lossless PNG, keeps alpha
    #[default]
    Png,
    /// JPEG, alpha is dropped
    Jpeg,
    /// Lossless TIFF, keeps alpha
    Tiff,
}

impl OutputFormat {
    /// File extension without the leading dot
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Tiff => "tiff",
        }
    }

    /// Map a file extension to a format (case-insensitive)
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    #[must_use]
    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Denoising capability requested by the caller
///
/// `ModelBacked` resolves to the classical chain whenever no model can be
/// loaded, so the strategy recorded in results may differ from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenoisingStrategy {
    /// Non-local means followed by a bilateral filter
    #[default]
    Classical,
    /// Learned model, or its sharpened classical simulation
    ModelBacked,
}

impl std::fmt::Display for DenoisingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classical => write!(f, "classical"),
            Self::ModelBacked => write!(f, "model-backed"),
        }
    }
}

impl FromStr for DenoisingStrategy {
    type Err = DenoiseError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classical" | "traditional" => Ok(Self::Classical),
            "model" | "model-backed" | "ai" => Ok(Self::ModelBacked),
            other => Err(DenoiseError::invalid_config(format!(
                "Unknown denoising strategy '{}'. Expected classical or model",
                other
            ))),
        }
    }
}

/// Foreground mask refinement strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentationMethod {
    /// Canny edges, dilation and filled outer contours
    #[default]
    EdgeContours,
    /// Opening then closing of the Otsu threshold map
    Morphology,
}

impl std::fmt::Display for SegmentationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EdgeContours => write!(f, "edges"),
            Self::Morphology => write!(f, "morphology"),
        }
    }
}

impl FromStr for SegmentationMethod {
    type Err = DenoiseError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edges" | "edge-contours" | "contours" => Ok(Self::EdgeContours),
            "morphology" | "morph" => Ok(Self::Morphology),
            other => Err(DenoiseError::invalid_config(format!(
                "Unknown segmentation method '{}'. Expected edges or morphology",
                other
            ))),
        }
    }
}

/// Parameters of the non-local means stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NonLocalMeansParams {
    /// Filter strength `h`; larger values remove more noise and more detail
    pub strength: f32,
    /// Side of the square search window (odd)
    pub search_window: u32,
    /// Side of the square comparison patch (odd)
    pub template_window: u32,
}

impl Default for NonLocalMeansParams {
    fn default() -> Self {
        Self {
            strength: 10.0,
            search_window: 21,
            template_window: 7,
        }
    }
}

/// Parameters of the bilateral stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BilateralParams {
    /// Neighborhood diameter in pixels
    pub diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
}

impl Default for BilateralParams {
    fn default() -> Self {
        Self {
            diameter: 9,
            sigma_color: 75.0,
            sigma_space: 75.0,
        }
    }
}

/// Gaussian pass applied after sharpening in the simulated model path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    /// Kernel side (odd)
    pub kernel_size: u32,
    pub sigma: f32,
}

impl Default for GaussianParams {
    fn default() -> Self {
        Self {
            kernel_size: 3,
            sigma: 0.5,
        }
    }
}

/// Segmenter configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub method: SegmentationMethod,
    /// Canny hysteresis thresholds
    pub canny_low: f32,
    pub canny_high: f32,
    /// Dilation passes applied to the edge map (3x3 element each)
    pub dilate_iterations: u8,
    /// Contours enclosing this many pixels or fewer are discarded
    pub min_contour_area: f64,
    /// Radius of the square structuring element for opening/closing
    pub morph_kernel_radius: u8,
    pub morph_iterations: u8,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            method: SegmentationMethod::default(),
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_iterations: 2,
            min_contour_area: 500.0,
            morph_kernel_radius: 1,
            morph_iterations: 2,
        }
    }
}

/// Configuration for denoising operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenoiseConfig {
    /// Requested denoising strategy
    pub strategy: DenoisingStrategy,

    pub non_local_means: NonLocalMeansParams,

    pub bilateral: BilateralParams,

    /// Smoothing applied after the sharpening kernel
    pub sharpen_smoothing: GaussianParams,

    pub segmentation: SegmentationConfig,

    /// Blacken top and bottom bands when applying the cinematic filter
    pub letterbox: bool,

    /// External model used by the model-backed strategy (None = simulation)
    pub model_spec: Option<ModelSpec>,

    /// Inference engine for the external model
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Output format
    pub output_format: OutputFormat,

    /// JPEG quality (0-100, only used for JPEG output)
    pub jpeg_quality: u8,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            strategy: DenoisingStrategy::default(),
            non_local_means: NonLocalMeansParams::default(),
            bilateral: BilateralParams::default(),
            sharpen_smoothing: GaussianParams::default(),
            segmentation: SegmentationConfig::default(),
            letterbox: false,
            model_spec: None,
            backend_type: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            output_format: OutputFormat::default(),
            jpeg_quality: 90,
        }
    }
}

impl DenoiseConfig {
    /// Create a new configuration builder for fluent API construction
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgly_denoise::{DenoiseConfig, DenoisingStrategy, OutputFormat};
    ///
    /// let config = DenoiseConfig::builder()
    ///     .strategy(DenoisingStrategy::ModelBacked)
    ///     .output_format(OutputFormat::Jpeg)
    ///     .jpeg_quality(95)
    ///     .build()
    ///     .unwrap();
    /// ```
    #[must_use]
    pub fn builder() -> DenoiseConfigBuilder {
        DenoiseConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Even or zero window sizes
    /// - Template window not smaller than the search window
    /// - Non-positive strength or sigma values
    /// - Inverted Canny thresholds
    /// - JPEG quality above 100
    ///
    /// # Examples
    ///
    /// ```rust
    /// use imgly_denoise::DenoiseConfig;
    ///
    /// let mut config = DenoiseConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.non_local_means.search_window = 20;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> crate::Result<()> {
        let nlm = &self.non_local_means;
        validate_odd_window("search window", nlm.search_window, 21)?;
        validate_odd_window("template window", nlm.template_window, 7)?;
        if nlm.template_window >= nlm.search_window {
            return Err(DenoiseError::invalid_config(format!(
                "Template window ({}) must be smaller than search window ({})",
                nlm.template_window, nlm.search_window
            )));
        }
        validate_positive("filter strength", nlm.strength, 10.0)?;

        if self.bilateral.diameter == 0 {
            return Err(DenoiseError::config_value_error(
                "bilateral diameter",
                self.bilateral.diameter,
                ">= 1",
                Some(9),
            ));
        }
        validate_positive("bilateral sigma_color", self.bilateral.sigma_color, 75.0)?;
        validate_positive("bilateral sigma_space", self.bilateral.sigma_space, 75.0)?;

        validate_odd_window("gaussian kernel", self.sharpen_smoothing.kernel_size, 3)?;
        validate_positive("gaussian sigma", self.sharpen_smoothing.sigma, 0.5)?;

        let seg = &self.segmentation;
        if seg.canny_low.is_nan()
            || seg.canny_high.is_nan()
            || seg.canny_low < 0.0
            || seg.canny_low > seg.canny_high
        {
            return Err(DenoiseError::invalid_config(format!(
                "Canny thresholds must satisfy 0 <= low <= high (got {} / {})",
                seg.canny_low, seg.canny_high
            )));
        }
        if seg.min_contour_area.is_nan() || seg.min_contour_area < 0.0 {
            return Err(DenoiseError::config_value_error(
                "minimum contour area",
                seg.min_contour_area,
                ">= 0",
                Some(500.0),
            ));
        }

        if self.jpeg_quality > 100 {
            return Err(DenoiseError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "0-100",
                Some(90),
            ));
        }

        Ok(())
    }
}

fn validate_odd_window(parameter: &str, size: u32, recommended: u32) -> crate::Result<()> {
    if size == 0 || size % 2 == 0 {
        return Err(DenoiseError::config_value_error(
            parameter,
            size,
            "odd, >= 1",
            Some(recommended),
        ));
    }
    Ok(())
}

fn validate_positive(parameter: &str, value: f32, recommended: f32) -> crate::Result<()> {
    if value.is_nan() || value <= 0.0 {
        return Err(DenoiseError::config_value_error(
            parameter,
            value,
            "> 0",
            Some(recommended),
        ));
    }
    Ok(())
}

/// Builder for `DenoiseConfig`
#[derive(Debug, Default)]
pub struct DenoiseConfigBuilder {
    config: DenoiseConfig,
}

impl DenoiseConfigBuilder {
    /// Set the requested denoising strategy
    #[must_use]
    pub fn strategy(mut self, strategy: DenoisingStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    #[must_use]
    pub fn non_local_means(mut self, params: NonLocalMeansParams) -> Self {
        self.config.non_local_means = params;
        self
    }

    /// Set the non-local means filter strength
    #[must_use]
    pub fn filter_strength(mut self, strength: f32) -> Self {
        self.config.non_local_means.strength = strength;
        self
    }

    #[must_use]
    pub fn bilateral(mut self, params: BilateralParams) -> Self {
        self.config.bilateral = params;
        self
    }

    #[must_use]
    pub fn sharpen_smoothing(mut self, params: GaussianParams) -> Self {
        self.config.sharpen_smoothing = params;
        self
    }

    #[must_use]
    pub fn segmentation(mut self, segmentation: SegmentationConfig) -> Self {
        self.config.segmentation = segmentation;
        self
    }

    /// Set the mask refinement method, keeping other segmentation parameters
    #[must_use]
    pub fn segmentation_method(mut self, method: SegmentationMethod) -> Self {
        self.config.segmentation.method = method;
        self
    }

    /// Enable letterbox bands for the cinematic filter
    #[must_use]
    pub fn letterbox(mut self, letterbox: bool) -> Self {
        self.config.letterbox = letterbox;
        self
    }

    /// Set the external model specification
    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = Some(model_spec);
        self
    }

    /// Set the inference engine for external models
    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    /// Set execution provider
    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    /// Set number of intra-op threads
    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Set output format
    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set JPEG quality
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any rule checked by [`DenoiseConfig::validate`]
    pub fn build(self) -> crate::Result<DenoiseConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
