//! Integration tests for complete denoising workflows
//!
//! These tests run the public API end to end on generated images. No model
//! files are needed: the classical chain, the simulated model path, and
//! injected denoisers cover every area mode.

use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use imgly_denoise::{
    apply_filter_to_bytes, denoise_from_bytes, denoise_from_reader, denoise_image, AreaMode,
    ColorFilter, DenoiseConfig, DenoiseProcessor, Denoiser, DenoisingStrategy, ImageIOService,
    ModelSpec, NonLocalMeansParams, OutputFormat, ProcessingStage, ProcessingTimings,
    ProgressReporter, ProgressUpdate, Rectangle, Result,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tempfile::TempDir;

/// Create a test image and its encoded bytes
fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Result<(DynamicImage, Vec<u8>)> {
    let dynamic_image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            let intensity = ((x + y) % 100) as u8;
            Rgb([intensity, 128, 255 - intensity])
        })),
        _ => DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            let intensity = ((x * 3 + y) % 100) as u8;
            Rgba([intensity, 128, 255 - intensity, 255])
        })),
    };

    let mut buffer = Vec::new();
    dynamic_image
        .write_to(&mut std::io::Cursor::new(&mut buffer), format)
        .map_err(|e| imgly_denoise::DenoiseError::processing(e.to_string()))?;
    Ok((dynamic_image, buffer))
}

/// Dark frame with one bright square, large enough to survive segmentation
fn square_scene() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
        if (17..47).contains(&x) && (17..47).contains(&y) {
            Rgb([200, 200, 200])
        } else {
            Rgb([40, 40, 40])
        }
    }))
}

fn fast_config() -> DenoiseConfig {
    DenoiseConfig::builder()
        .non_local_means(NonLocalMeansParams {
            strength: 10.0,
            search_window: 5,
            template_window: 3,
        })
        .build()
        .unwrap()
}

/// Replaces every sample with a constant so touched pixels are obvious
#[derive(Debug)]
struct FlatDenoiser(u8);

impl Denoiser for FlatDenoiser {
    fn denoise(&self, image: &DynamicImage) -> DynamicImage {
        let mut out = image.to_rgb8();
        out.iter_mut().for_each(|v| *v = self.0);
        DynamicImage::ImageRgb8(out)
    }

    fn strategy(&self) -> DenoisingStrategy {
        DenoisingStrategy::ModelBacked
    }

    fn model_name(&self) -> Option<String> {
        Some(format!("flat-{}", self.0))
    }
}

#[derive(Default)]
struct CountingReporter {
    updates: AtomicUsize,
    completions: Mutex<Vec<ProcessingTimings>>,
    stages: Mutex<Vec<ProcessingStage>>,
}

impl ProgressReporter for CountingReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.stages.lock().unwrap().push(update.stage);
    }

    fn report_completion(&self, timings: ProcessingTimings) {
        self.completions.lock().unwrap().push(timings);
    }

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

#[test]
fn test_file_round_trip_per_format() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let processor = DenoiseProcessor::new(fast_config())?;

    for (format, output_format) in [
        (ImageFormat::Png, OutputFormat::Png),
        (ImageFormat::Jpeg, OutputFormat::Jpeg),
    ] {
        let (_, bytes) = create_test_image(40, 30, format)?;
        let input = temp_dir.path().join(format!("input.{}", format.extensions_str()[0]));
        std::fs::write(&input, bytes).unwrap();

        let mut result = processor.process_file(&input, AreaMode::Full, None)?;
        assert_eq!(result.dimensions(), (40, 30));
        assert!(result.timings().total_ms >= result.timings().image_decode_ms);

        let output = temp_dir
            .path()
            .join("out")
            .join(ImageIOService::processed_file_name(&input));
        result.save(&output, output_format, 85)?;
        assert!(result.timings().image_encode_ms.is_some());

        let reloaded = ImageIOService::load_image(&output)?;
        assert_eq!(reloaded.dimensions(), (40, 30));
    }

    let tiff_path = temp_dir.path().join("result.tiff");
    let mut result = processor.process(&square_scene(), AreaMode::Full, None);
    result.save(&tiff_path, OutputFormat::Tiff, 90)?;
    assert_eq!(ImageIOService::load_image(&tiff_path)?.dimensions(), (64, 64));
    Ok(())
}

#[test]
fn test_background_mode_with_injected_denoiser() -> Result<()> {
    let processor = DenoiseProcessor::with_denoiser(fast_config(), Arc::new(FlatDenoiser(0)))?;
    let result = processor.process(&square_scene(), AreaMode::Background, None);
    let out = result.image.to_rgb8();

    assert_eq!(out.get_pixel(32, 32), &Rgb([200, 200, 200]));
    assert_eq!(out.get_pixel(2, 2), &Rgb([0, 0, 0]));
    assert_eq!(result.area_mode, AreaMode::Background);
    assert_eq!(result.metadata.model_name.as_deref(), Some("flat-0"));
    assert_eq!(result.metadata.strategy, DenoisingStrategy::ModelBacked);
    Ok(())
}

#[test]
fn test_custom_region_with_injected_denoiser() -> Result<()> {
    let processor = DenoiseProcessor::with_denoiser(fast_config(), Arc::new(FlatDenoiser(9)))?;
    let image = square_scene();

    // Drag from bottom-right to top-left
    let result = processor.process(&image, AreaMode::Custom, Some(Rectangle::new(30, 20, -10, -15)));
    assert_eq!(result.region, Some(Rectangle::new(20, 5, 10, 15)));

    let (before, after) = (image.to_rgb8(), result.image.to_rgb8());
    for (x, y, pixel) in after.enumerate_pixels() {
        let inside = (20..30).contains(&x) && (5..20).contains(&y);
        if inside {
            assert_eq!(pixel, &Rgb([9, 9, 9]), "({x}, {y})");
        } else {
            assert_eq!(pixel, before.get_pixel(x, y), "({x}, {y})");
        }
    }
    Ok(())
}

#[test]
fn test_simulated_model_workflow() -> Result<()> {
    let config = DenoiseConfig::builder()
        .strategy(DenoisingStrategy::ModelBacked)
        .model_spec(ModelSpec::simulated())
        .non_local_means(NonLocalMeansParams {
            strength: 10.0,
            search_window: 5,
            template_window: 3,
        })
        .build()?;

    let result = denoise_image(&square_scene(), AreaMode::Background, None, &config)?;
    assert_eq!(result.metadata.strategy, DenoisingStrategy::ModelBacked);
    assert_eq!(result.metadata.model_name.as_deref(), Some("simulated"));
    assert_eq!(result.dimensions(), (64, 64));
    Ok(())
}

#[test]
fn test_progress_reporting_across_requests() -> Result<()> {
    let reporter = Arc::new(CountingReporter::default());
    let processor = DenoiseProcessor::new(fast_config())?.with_progress_reporter(reporter.clone());

    let (_, bytes) = create_test_image(20, 20, ImageFormat::Png)?;
    processor.process_bytes(&bytes, AreaMode::Full, None)?;
    processor.process(&square_scene(), AreaMode::Background, None);

    assert_eq!(reporter.completions.lock().unwrap().len(), 2);
    let stages = reporter.stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&ProcessingStage::ImageLoading));
    assert!(stages.contains(&ProcessingStage::Blending));
    assert_eq!(stages.iter().filter(|s| **s == ProcessingStage::Completed).count(), 2);
    assert_eq!(reporter.updates.load(Ordering::SeqCst), stages.len());
    Ok(())
}

#[test]
fn test_shared_processor_across_threads() -> Result<()> {
    let processor = Arc::new(DenoiseProcessor::new(fast_config())?);
    let image = Arc::new(square_scene());

    let handles: Vec<_> = [AreaMode::Full, AreaMode::Background, AreaMode::Custom]
        .into_iter()
        .map(|mode| {
            let processor = Arc::clone(&processor);
            let image = Arc::clone(&image);
            std::thread::spawn(move || {
                processor.process(&image, mode, Some(Rectangle::new(0, 0, 16, 16)))
            })
        })
        .collect();

    for handle in handles {
        let result = handle.join().unwrap();
        assert_eq!(result.dimensions(), (64, 64));
    }
    Ok(())
}

#[tokio::test]
async fn test_async_reader_workflow() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let (_, bytes) = create_test_image(32, 24, ImageFormat::Png)?;
    let path = temp_dir.path().join("stream.png");
    tokio::fs::write(&path, &bytes).await.unwrap();

    let file = tokio::fs::File::open(&path).await.unwrap();
    let rect = Rectangle::new(4, 4, 100, 100);
    let result = denoise_from_reader(file, AreaMode::Custom, Some(rect), &fast_config()).await?;

    assert_eq!(result.region, Some(Rectangle::new(4, 4, 28, 20)));
    assert_eq!(result.timings().blend_ms, 0);
    Ok(())
}

#[test]
fn test_bytes_in_bytes_out() -> Result<()> {
    let (original, bytes) = create_test_image(16, 12, ImageFormat::Png)?;
    let config = fast_config();

    let result = denoise_from_bytes(&bytes, AreaMode::Full, None, &config)?;
    let encoded = result.to_bytes(OutputFormat::Jpeg, config.jpeg_quality)?;
    let decoded = ImageIOService::load_from_bytes(&encoded)?;
    assert_eq!(decoded.dimensions(), original.dimensions());
    Ok(())
}

#[test]
fn test_filter_workflow() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let (_, bytes) = create_test_image(10, 20, ImageFormat::Png)?;

    let graded = apply_filter_to_bytes(&bytes, "cinematic", true, OutputFormat::Png, 90)?;
    let graded = ImageIOService::load_from_bytes(&graded)?.to_rgb8();
    assert_eq!(graded.get_pixel(5, 0), &Rgb([0, 0, 0]));
    assert_eq!(graded.get_pixel(5, 19), &Rgb([0, 0, 0]));
    assert_ne!(graded.get_pixel(5, 10), &Rgb([0, 0, 0]));

    let processor = DenoiseProcessor::new(fast_config())?;
    let input = ImageIOService::load_from_bytes(&bytes)?;
    let boosted = processor.apply_filter(&input, ColorFilter::AfterEffects);

    let name = ImageIOService::filtered_file_name(ColorFilter::AfterEffects, "photo.png");
    assert_eq!(name, "aftereffects_photo.png");
    let path = temp_dir.path().join(name);
    ImageIOService::save_image(&boosted, &path, OutputFormat::Png, 90)?;

    // Intensity 46 at the last pixel leaves blue at 209, boosted to 250
    let saved = ImageIOService::load_image(&path)?;
    assert_eq!(saved.get_pixel(9, 19).0, [46, 128, 250, 255]);
    Ok(())
}
