//! Denoising CLI tool
//!
//! Command-line interface over the unified processor: `process` denoises
//! images by area mode, `filter` applies a color grade to finished images.

use super::config::CliConfigBuilder;
use crate::{
    filters::ColorFilter,
    processor::DenoiseProcessor,
    services::{ImageIOService, ALLOWED_EXTENSIONS},
    tracing_config::{spans, TracingConfig, TracingFormat},
    types::Rectangle,
    OutputFormat,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::{sync::Semaphore, task::JoinSet};

/// Image denoising CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "imgly-denoise")]
pub struct Cli {
    /// Verbose logging (-v: DEBUG, -vv: TRACE for this crate, -vvv: everything)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Plain log lines without colors
    #[arg(long, global = true)]
    pub compact_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Denoise images, fully or in part
    Process(ProcessArgs),
    /// Apply a color filter to images
    Filter(FilterArgs),
}

#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProcessArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Which part of the image to denoise
    #[arg(short, long, value_enum, default_value_t = CliArea::Full)]
    pub area: CliArea,

    /// Region for `--area custom` as x,y,width,height (negative extents allowed)
    #[arg(long, value_name = "X,Y,W,H", allow_hyphen_values = true)]
    pub rect: Option<Rectangle>,

    /// Denoising strategy
    #[arg(short, long, value_enum, default_value_t = CliStrategy::Classical)]
    pub strategy: CliStrategy,

    /// Model folder with model.json and model.onnx (implies --strategy model)
    #[arg(short, long, value_name = "DIR")]
    pub model: Option<PathBuf>,

    /// Inference engine for --model
    #[arg(long, value_enum, default_value_t = CliBackend::Tract)]
    pub backend: CliBackend,

    /// Foreground segmentation for --area background
    #[arg(long, value_enum, default_value_t = CliSegmentation::Edges)]
    pub segmentation: CliSegmentation,

    /// Non-local means filter strength
    #[arg(long, default_value_t = 10.0)]
    pub strength: f32,

    /// Output format [default: from the output or input extension]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Inference threads (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Images processed concurrently
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Filter name (aftereffects, afterglow, cinematic)
    #[arg(long)]
    pub filter: ColorFilter,

    /// Blacken top and bottom bands with the cinematic filter
    #[arg(long)]
    pub letterbox: bool,

    /// Output file (single input) or directory (several inputs)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliArea {
    Full,
    Background,
    Custom,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliStrategy {
    Classical,
    Model,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBackend {
    Tract,
    Onnx,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliSegmentation {
    Edges,
    Morphology,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    Tiff,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.compact_logs {
        TracingFormat::Compact
    } else {
        TracingFormat::Console
    };
    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
        .context("Failed to initialize tracing")?;

    let start_time = Instant::now();
    let processed = match &cli.command {
        Command::Process(args) => run_process(args).await?,
        Command::Filter(args) => run_filter(args)?,
    };

    info!(
        "Processed {} image(s) in {:.2}s",
        processed,
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

async fn run_process(args: &ProcessArgs) -> Result<usize> {
    CliConfigBuilder::validate_process(args).context("Invalid arguments")?;
    let config = CliConfigBuilder::from_process_args(args).context("Invalid configuration")?;
    let (mode, rect) = CliConfigBuilder::area(args);

    let files = collect_inputs(&args.input, args.recursive)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(0);
    }
    let output_dir = prepare_output_dir(args.output.as_deref(), files.len())?;

    info!("Strategy: {}, area: {}", config.strategy, mode);
    let processor = Arc::new(DenoiseProcessor::new(config).context("Failed to create denoise processor")?);

    let batch_span = spans::batch_processing(files.len());
    let progress = batch_progress_bar(files.len());
    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for input in files.iter().cloned() {
        let output = resolve_output(&input, args.output.as_deref(), output_dir.as_deref(), args.format);
        let format = args.format.map_or_else(|| output_format_for(&output), OutputFormat::from);
        let processor = Arc::clone(&processor);
        let batch_span = batch_span.clone();
        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .context("Worker pool closed")?;

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let _batch = batch_span.entered();
            let _span = spans::file_processing(&input, mode.as_str()).entered();
            let outcome = denoise_file(&processor, &input, &output, format, mode, rect);
            (input, outcome)
        });
    }

    let mut processed = 0;
    let mut failed = 0;
    while let Some(joined) = tasks.join_next().await {
        let (input, outcome) = joined.context("Worker task panicked")?;
        match outcome {
            Ok(output) => {
                processed += 1;
                log::debug!("✅ {} -> {}", input.display(), output.display());
            },
            Err(e) => {
                failed += 1;
                error!("❌ Failed to process {}: {:#}", input.display(), e);
            },
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    finish_batch(progress, processed, failed);
    Ok(processed)
}

fn denoise_file(
    processor: &DenoiseProcessor,
    input: &Path,
    output: &Path,
    format: OutputFormat,
    mode: crate::AreaMode,
    rect: Option<Rectangle>,
) -> Result<PathBuf> {
    let mut result = processor
        .process_file(input, mode, rect)
        .with_context(|| format!("Failed to denoise {}", input.display()))?;

    result
        .save(output, format, processor.config().jpeg_quality)
        .with_context(|| format!("Failed to save {}", output.display()))?;

    let timings = result.timings();
    info!("📊 {}: {}", input.display(), timings.summary());
    Ok(output.to_path_buf())
}

fn run_filter(args: &FilterArgs) -> Result<usize> {
    let files = collect_inputs(&args.input, args.recursive)?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(0);
    }
    let output_dir = prepare_output_dir(args.output.as_deref(), files.len())?;
    let progress = batch_progress_bar(files.len());

    let mut processed = 0;
    let mut failed = 0;
    for input in &files {
        let _span = spans::filtering(input, args.filter.as_str()).entered();
        let output = match (args.output.as_deref(), output_dir.as_deref()) {
            (Some(file), None) => file.to_path_buf(),
            (_, dir) => {
                let name = input.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
                dir.or_else(|| input.parent())
                    .unwrap_or_else(|| Path::new("."))
                    .join(ImageIOService::filtered_file_name(args.filter, &name))
            },
        };

        let outcome = ImageIOService::load_image(input)
            .map(|image| crate::filters::apply_filter(&image, args.filter, args.letterbox))
            .and_then(|filtered| ImageIOService::save_image(&filtered, &output, output_format_for(&output), 90));

        match outcome {
            Ok(()) => {
                processed += 1;
                log::debug!("✅ {} -> {}", input.display(), output.display());
            },
            Err(e) => {
                failed += 1;
                error!("❌ Failed to filter {}: {}", input.display(), e);
            },
        }
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    finish_batch(progress, processed, failed);
    Ok(processed)
}

/// Expand files and directories into a sorted list of supported images
fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in inputs {
        if path.is_file() {
            if ImageIOService::is_allowed_extension(path) {
                files.push(path.clone());
            } else {
                warn!(
                    "Skipping {}: only {} files are supported",
                    path.display(),
                    ALLOWED_EXTENSIONS.join(", ")
                );
            }
        } else if path.is_dir() {
            files.extend(find_image_files(path, recursive)?);
        } else {
            anyhow::bail!("Input path does not exist or is not accessible: {}", path.display());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn find_image_files(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let walker = walkdir::WalkDir::new(dir).max_depth(if recursive { usize::MAX } else { 1 });
    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        if entry.file_type().is_file() && ImageIOService::is_allowed_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Output directory for batch runs, created on demand
fn prepare_output_dir(output: Option<&Path>, file_count: usize) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };
    if file_count == 1 && !output.is_dir() {
        return Ok(None);
    }
    if output.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output.display()
        );
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;
    Ok(Some(output.to_path_buf()))
}

/// Where the result for `input` is written
///
/// An explicit single output file wins; otherwise a fresh
/// `processed_<uuid>.<ext>` name is placed in the output directory or next
/// to the input.
fn resolve_output(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: Option<CliOutputFormat>,
) -> PathBuf {
    if let (Some(file), None) = (output, output_dir) {
        return file.to_path_buf();
    }

    let naming_source = match format {
        Some(format) => input.with_extension(OutputFormat::from(format).extension()),
        None => input.to_path_buf(),
    };
    let name = ImageIOService::processed_file_name(&naming_source);

    output_dir
        .or_else(|| input.parent())
        .unwrap_or_else(|| Path::new("."))
        .join(name)
}

fn output_format_for(path: &Path) -> OutputFormat {
    ImageIOService::format_for_path(path).unwrap_or_default()
}

fn batch_progress_bar(file_count: usize) -> Option<ProgressBar> {
    if file_count < 2 {
        return None;
    }
    let pb = ProgressBar::new(file_count as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    Some(pb)
}

fn finish_batch(progress: Option<ProgressBar>, processed: usize, failed: usize) {
    if let Some(pb) = progress {
        pb.finish_with_message(format!("Completed! Processed: {processed}, Failed: {failed}"));
    }
    if failed > 0 {
        warn!("Some files failed. Processed: {processed}, Failed: {failed}");
    }
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Jpeg => OutputFormat::Jpeg,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
        }
    }
}
