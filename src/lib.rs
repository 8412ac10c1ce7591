#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # IMG.LY Denoise Library
//!
//! An image denoising pipeline with three area modes, foreground-aware
//! blending and a small set of color grades.
//!
//! ## Features
//!
//! - **Area Modes**: denoise the whole image, only its background, or a
//!   caller-selected rectangle (negative extents are normalized)
//! - **Two Strategies**: non-local means plus bilateral filtering, or a
//!   model-backed path that runs a learned ONNX model when one is available
//!   and falls back to the classical chain otherwise
//! - **Segmentation**: Otsu thresholding with edge-contour or morphology
//!   refinement for background mode
//! - **Color Filters**: `aftereffects`, `afterglow` and `cinematic` (optional letterbox)
//! - **Multiple Backends**: Tract (pure Rust) and ONNX Runtime for learned models
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imgly_denoise::{AreaMode, DenoiseConfig, DenoiseProcessor, Rectangle};
//!
//! # fn example() -> anyhow::Result<()> {
//! let processor = DenoiseProcessor::new(DenoiseConfig::default())?;
//! let image = image::open("noisy.jpg")?;
//!
//! // Only the selected region is denoised
//! let result = processor.process(&image, AreaMode::Custom, Some(Rectangle::new(40, 40, 200, 120)));
//! result.image.save("region.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust model backend
//! - `onnx`: ONNX Runtime model backend with GPU execution providers
//! - `cli` (default): Command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! imgly-denoise = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod denoise;
pub mod error;
pub mod filters;
pub mod inference;
pub mod models;
pub mod processor;
pub mod region;
pub mod segmentation;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::{BackendFactory, DefaultBackendFactory};
pub use compositor::Compositor;
pub use config::{
    BackendType, BilateralParams, DenoiseConfig, DenoiseConfigBuilder, DenoisingStrategy,
    ExecutionProvider, GaussianParams, NonLocalMeansParams, OutputFormat, SegmentationConfig,
    SegmentationMethod,
};
pub use denoise::{create_denoiser, ClassicalDenoiser, Denoiser, ModelDenoiser, SHARPEN_KERNEL};
pub use error::{DenoiseError, Result};
pub use filters::{apply_filter, apply_named_filter, ColorFilter};
pub use inference::InferenceBackend;
pub use models::{ModelManager, ModelSource, ModelSpec};
pub use processor::DenoiseProcessor;
pub use region::RegionSelector;
pub use segmentation::Segmenter;
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressTracker, ProgressUpdate,
};
pub use types::{
    AreaMode, DenoiseResult, Mask, MaskStatistics, ProcessingMetadata, ProcessingTimings, Rectangle,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Denoise an in-memory image
///
/// Builds a processor for `config` and runs one request. Reuse a
/// [`DenoiseProcessor`] when processing many images so the denoiser and any
/// model are resolved only once.
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_denoise::{denoise_image, AreaMode, DenoiseConfig};
///
/// # fn example(img: image::DynamicImage) -> anyhow::Result<()> {
/// let result = denoise_image(&img, AreaMode::Background, None, &DenoiseConfig::default())?;
/// result.image.save("output.png")?;
/// # Ok(())
/// # }
/// ```
pub fn denoise_image(
    image: &image::DynamicImage,
    mode: AreaMode,
    rect: Option<Rectangle>,
    config: &DenoiseConfig,
) -> Result<DenoiseResult> {
    let processor = DenoiseProcessor::new(config.clone())?;
    Ok(processor.process(image, mode, rect))
}

/// Denoise an image provided as encoded bytes
///
/// Suitable for upload handlers and other memory-based flows.
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_denoise::{denoise_from_bytes, AreaMode, DenoiseConfig, OutputFormat};
///
/// # fn example(upload_bytes: Vec<u8>) -> anyhow::Result<()> {
/// let config = DenoiseConfig::default();
/// let result = denoise_from_bytes(&upload_bytes, AreaMode::Full, None, &config)?;
/// let output_bytes = result.to_bytes(OutputFormat::Jpeg, config.jpeg_quality)?;
/// # Ok(())
/// # }
/// ```
pub fn denoise_from_bytes(
    image_bytes: &[u8],
    mode: AreaMode,
    rect: Option<Rectangle>,
    config: &DenoiseConfig,
) -> Result<DenoiseResult> {
    let processor = DenoiseProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes, mode, rect)
}

/// Denoise an image read from an async stream
///
/// # Examples
///
/// ```rust,no_run
/// use imgly_denoise::{denoise_from_reader, AreaMode, DenoiseConfig, Rectangle};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("large_image.jpg").await?;
/// let rect = Rectangle::new(300, 200, -120, -80);
/// let result = denoise_from_reader(file, AreaMode::Custom, Some(rect), &DenoiseConfig::default()).await?;
/// assert_eq!(result.region, Some(Rectangle::new(180, 120, 120, 80)));
/// # Ok(())
/// # }
/// ```
pub async fn denoise_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    mode: AreaMode,
    rect: Option<Rectangle>,
    config: &DenoiseConfig,
) -> Result<DenoiseResult> {
    let processor = DenoiseProcessor::new(config.clone())?;
    processor.process_reader(reader, mode, rect).await
}

/// Decode `image_bytes`, apply the filter named `filter`, and re-encode
///
/// Unknown filter names leave the pixels unchanged.
///
/// # Errors
/// - Bytes are not a decodable image
/// - Encoding into `format` fails
pub fn apply_filter_to_bytes(
    image_bytes: &[u8],
    filter: &str,
    letterbox: bool,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>> {
    let image = ImageIOService::load_from_bytes(image_bytes)?;
    let filtered = apply_named_filter(&image, filter, letterbox);
    ImageIOService::encode_image(&filtered, format, quality)
}
