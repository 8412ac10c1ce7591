//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{CliArea, CliBackend, CliSegmentation, CliStrategy, ProcessArgs};
use crate::{
    config::{BackendType, DenoiseConfig, DenoisingStrategy, SegmentationMethod},
    models::ModelSpec,
    types::{AreaMode, Rectangle},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a validated `DenoiseConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the processor configuration for `process`
    ///
    /// `--model` implies the model-backed strategy. `--strategy model`
    /// without a model folder runs the simulated model path.
    pub(crate) fn from_process_args(args: &ProcessArgs) -> Result<DenoiseConfig> {
        let strategy = match (args.strategy, &args.model) {
            (_, Some(_)) | (CliStrategy::Model, None) => DenoisingStrategy::ModelBacked,
            (CliStrategy::Classical, None) => DenoisingStrategy::Classical,
        };

        let mut builder = DenoiseConfig::builder()
            .strategy(strategy)
            .filter_strength(args.strength)
            .segmentation_method(match args.segmentation {
                CliSegmentation::Edges => SegmentationMethod::EdgeContours,
                CliSegmentation::Morphology => SegmentationMethod::Morphology,
            })
            .backend_type(match args.backend {
                CliBackend::Tract => BackendType::Tract,
                CliBackend::Onnx => BackendType::Onnx,
            })
            .intra_threads(args.threads)
            .jpeg_quality(args.jpeg_quality);

        if let Some(format) = args.format {
            builder = builder.output_format(format.into());
        }

        builder = match (&args.model, strategy) {
            (Some(dir), _) => builder.model_spec(ModelSpec::external(dir)),
            (None, DenoisingStrategy::ModelBacked) => builder.model_spec(ModelSpec::simulated()),
            (None, DenoisingStrategy::Classical) => builder,
        };

        builder.build().context("Invalid denoise settings")
    }

    /// Area mode and rectangle requested on the command line
    pub(crate) fn area(args: &ProcessArgs) -> (AreaMode, Option<Rectangle>) {
        let mode = match args.area {
            CliArea::Full => AreaMode::Full,
            CliArea::Background => AreaMode::Background,
            CliArea::Custom => AreaMode::Custom,
        };
        (mode, args.rect.filter(|_| mode == AreaMode::Custom))
    }

    /// Reject argument combinations the library would silently degrade
    pub(crate) fn validate_process(args: &ProcessArgs) -> Result<()> {
        if args.area == CliArea::Custom && args.rect.is_none() {
            anyhow::bail!("--area custom requires --rect x,y,width,height");
        }
        if args.rect.is_some() && args.area != CliArea::Custom {
            log::warn!("--rect is only used with --area custom; ignoring it");
        }
        if args.jpeg_quality == 0 || args.jpeg_quality > 100 {
            anyhow::bail!("JPEG quality must be between 1 and 100 (got {})", args.jpeg_quality);
        }
        if let Some(model) = &args.model {
            if !model.is_dir() {
                anyhow::bail!("Model folder does not exist: {}", model.display());
            }
        }
        Ok(())
    }
}
