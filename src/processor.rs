//! Unified denoising processor
//!
//! `DenoiseProcessor` owns the resolved denoiser and segmenter and routes each
//! request through one of the three area modes. Both the CLI and the library
//! helpers go through it so every frontend sees the same behavior.

use crate::{
    backends::{BackendFactory, DefaultBackendFactory},
    compositor::Compositor,
    config::DenoiseConfig,
    denoise::{create_denoiser, Denoiser},
    error::Result,
    filters::{apply_filter, ColorFilter},
    region::RegionSelector,
    segmentation::Segmenter,
    services::{
        ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker,
    },
    types::{AreaMode, DenoiseResult, ProcessingMetadata, ProcessingTimings, Rectangle},
    utils::to_8bit,
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use tracing::{info as trace_info, instrument, span, Level};

/// Run `f` and return its output with the elapsed milliseconds
fn timed<T>(f: impl FnOnce() -> T) -> (T, u64) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed().as_millis() as u64)
}

/// Orchestrates segmentation, denoising, region selection and blending
pub struct DenoiseProcessor {
    config: DenoiseConfig,
    denoiser: Arc<dyn Denoiser>,
    segmenter: Segmenter,
    reporter: Arc<dyn ProgressReporter>,
}

impl DenoiseProcessor {
    /// Create a processor with the default backend factory
    ///
    /// # Errors
    /// - Invalid configuration values
    pub fn new(config: DenoiseConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Create a processor resolving model backends through `factory`
    ///
    /// A model that cannot be loaded does not fail construction; the
    /// processor then runs the classical chain.
    ///
    /// # Errors
    /// - Invalid configuration values
    pub fn with_factory(config: DenoiseConfig, factory: &dyn BackendFactory) -> Result<Self> {
        config.validate()?;

        let denoiser = {
            let _span = span!(Level::INFO, "initialization", strategy = ?config.strategy).entered();
            create_denoiser(&config, factory)
        };
        info!(
            "Denoiser ready: {:?}{}",
            denoiser.strategy(),
            denoiser
                .model_name()
                .map(|name| format!(" ({})", name))
                .unwrap_or_default()
        );

        Self::with_denoiser(config, denoiser)
    }

    /// Create a processor around an already resolved denoiser
    ///
    /// # Errors
    /// - Invalid configuration values
    pub fn with_denoiser(config: DenoiseConfig, denoiser: Arc<dyn Denoiser>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            segmenter: Segmenter::new(config.segmentation),
            config,
            denoiser,
            reporter: Arc::new(NoOpProgressReporter),
        })
    }

    /// Send progress of every following call to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn set_progress_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) {
        self.reporter = reporter;
    }

    #[must_use]
    pub fn config(&self) -> &DenoiseConfig {
        &self.config
    }

    #[must_use]
    pub fn denoiser(&self) -> &Arc<dyn Denoiser> {
        &self.denoiser
    }

    #[must_use]
    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(Arc::clone(&self.reporter))
    }

    /// Denoise `image` according to `mode`
    ///
    /// - `Full` denoises every pixel.
    /// - `Background` denoises everything, then restores original pixels
    ///   where the segmentation mask marks foreground.
    /// - `Custom` denoises only `rect` after normalizing it against the
    ///   image bounds. A rectangle that covers no pixels leaves the image
    ///   unchanged. Without a rectangle the full image is denoised and the
    ///   result reports [`AreaMode::Full`].
    ///
    /// The output keeps the dimensions and channel layout of the input;
    /// high bit depth input is processed at 8 bits per sample.
    #[must_use]
    pub fn process(&self, image: &DynamicImage, mode: AreaMode, rect: Option<Rectangle>) -> DenoiseResult {
        let mut tracker = self.tracker();
        self.process_tracked(image, mode, rect, &mut tracker)
    }

    /// Like [`DenoiseProcessor::process`], resolving the mode by name
    ///
    /// Unknown names denoise the full image.
    #[must_use]
    pub fn process_named(&self, image: &DynamicImage, mode: &str, rect: Option<Rectangle>) -> DenoiseResult {
        self.process(image, AreaMode::from_name(mode), rect)
    }

    #[instrument(
        skip(self, image, tracker),
        fields(
            area = %mode,
            strategy = ?self.denoiser.strategy(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn process_tracked(
        &self,
        image: &DynamicImage,
        mode: AreaMode,
        rect: Option<Rectangle>,
        tracker: &mut ProgressTracker,
    ) -> DenoiseResult {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();
        let color_type = format!("{:?}", image.color());
        let image = to_8bit(image);

        trace_info!(area = %mode, "Starting denoise");

        let (output, area_mode, region) = match (mode, rect) {
            (AreaMode::Full, _) => (self.denoise_full(&image, &mut timings, tracker), AreaMode::Full, None),
            (AreaMode::Background, _) => (
                self.denoise_background(&image, &mut timings, tracker),
                AreaMode::Background,
                None,
            ),
            (AreaMode::Custom, Some(rect)) => {
                let (output, region) = self.denoise_region(&image, rect, &mut timings, tracker);
                (output, AreaMode::Custom, Some(region))
            },
            (AreaMode::Custom, None) => {
                warn!("Custom area requested without a rectangle, denoising the full image");
                (self.denoise_full(&image, &mut timings, tracker), AreaMode::Full, None)
            },
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(timings.clone());
        debug!("{}", timings.summary());

        let mut metadata = ProcessingMetadata::new(self.denoiser.strategy(), color_type);
        metadata.model_name = self.denoiser.model_name();
        metadata.timings = timings;

        DenoiseResult::new(output, area_mode, region, metadata)
    }

    fn denoise_full(
        &self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
        tracker: &mut ProgressTracker,
    ) -> DynamicImage {
        tracker.report_stage(ProcessingStage::Denoising);
        let _span = span!(Level::INFO, "denoise", width = image.width(), height = image.height()).entered();
        let (output, elapsed) = timed(|| self.denoiser.denoise(image));
        timings.denoise_ms += elapsed;
        output
    }

    fn denoise_background(
        &self,
        image: &DynamicImage,
        timings: &mut ProcessingTimings,
        tracker: &mut ProgressTracker,
    ) -> DynamicImage {
        tracker.report_stage(ProcessingStage::Segmentation);
        let (mask, elapsed) = timed(|| self.segmenter.segment(image));
        timings.segmentation_ms = elapsed;

        let denoised = self.denoise_full(image, timings, tracker);

        tracker.report_stage(ProcessingStage::Blending);
        let (blended, elapsed) = timed(|| Compositor::blend(image, &denoised, &mask));
        timings.blend_ms = elapsed;
        blended
    }

    fn denoise_region(
        &self,
        image: &DynamicImage,
        rect: Rectangle,
        timings: &mut ProcessingTimings,
        tracker: &mut ProgressTracker,
    ) -> (DynamicImage, Rectangle) {
        tracker.report_stage(ProcessingStage::RegionSelection);
        let region = RegionSelector::normalize(rect, (image.width(), image.height()));
        if region.is_empty() {
            debug!("Region {} covers no pixels, leaving the image unchanged", rect);
            return (image.clone(), region);
        }

        let (roi, extract_ms) = timed(|| RegionSelector::extract(image, region));
        let denoised = self.denoise_full(&roi, timings, tracker);
        let (output, reinsert_ms) = timed(|| RegionSelector::reinsert(image, &denoised, region));
        timings.region_ms = extract_ms + reinsert_ms;

        (output, region)
    }

    /// Apply `filter`, honoring the configured letterbox setting
    #[must_use]
    pub fn apply_filter(&self, image: &DynamicImage, filter: ColorFilter) -> DynamicImage {
        let mut tracker = self.tracker();
        tracker.report_stage(ProcessingStage::Filtering);
        apply_filter(image, filter, self.config.letterbox)
    }

    /// Decode `bytes` and process the image
    ///
    /// # Errors
    /// - Bytes are empty or not a decodable image
    pub fn process_bytes(&self, bytes: &[u8], mode: AreaMode, rect: Option<Rectangle>) -> Result<DenoiseResult> {
        let mut tracker = self.tracker();
        tracker.report_stage(ProcessingStage::ImageLoading);
        let (image, decode_ms) = timed(|| ImageIOService::load_from_bytes(bytes));
        let image = image.inspect_err(|e| tracker.report_error(&e.to_string()))?;

        Ok(Self::with_decode_time(
            self.process_tracked(&image, mode, rect, &mut tracker),
            decode_ms,
        ))
    }

    /// Load the file at `path` and process it
    ///
    /// # Errors
    /// - File is missing, unreadable, or not a decodable image
    pub fn process_file<P: AsRef<Path>>(
        &self,
        path: P,
        mode: AreaMode,
        rect: Option<Rectangle>,
    ) -> Result<DenoiseResult> {
        let path = path.as_ref();
        let mut tracker = self.tracker();
        tracker.report_stage(ProcessingStage::ImageLoading);
        let (image, decode_ms) = timed(|| ImageIOService::load_image(path));
        let image = image.inspect_err(|e| tracker.report_error(&e.to_string()))?;
        debug!("Loaded {} ({}x{})", path.display(), image.width(), image.height());

        Ok(Self::with_decode_time(
            self.process_tracked(&image, mode, rect, &mut tracker),
            decode_ms,
        ))
    }

    /// Read an async stream to the end and process the decoded image
    ///
    /// # Errors
    /// - Reading the stream fails
    /// - Content is not a decodable image
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &self,
        reader: R,
        mode: AreaMode,
        rect: Option<Rectangle>,
    ) -> Result<DenoiseResult> {
        let mut tracker = self.tracker();
        tracker.report_stage(ProcessingStage::ImageLoading);
        let start = Instant::now();
        let image = ImageIOService::load_from_reader(reader)
            .await
            .inspect_err(|e| tracker.report_error(&e.to_string()))?;
        let decode_ms = start.elapsed().as_millis() as u64;

        Ok(Self::with_decode_time(
            self.process_tracked(&image, mode, rect, &mut tracker),
            decode_ms,
        ))
    }

    fn with_decode_time(mut result: DenoiseResult, decode_ms: u64) -> DenoiseResult {
        result.metadata.timings.image_decode_ms = decode_ms;
        result.metadata.timings.total_ms += decode_ms;
        result
    }
}

impl std::fmt::Debug for DenoiseProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenoiseProcessor")
            .field("denoiser", &self.denoiser)
            .field("segmenter", &self.segmenter)
            .finish_non_exhaustive()
    }
}
