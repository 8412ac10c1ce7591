//! Core types shared across the denoising pipeline

use crate::{
    config::{DenoisingStrategy, OutputFormat},
    error::{DenoiseError, Result},
    services::ImageIOService,
};
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Rectangular selection in pixel coordinates
///
/// Width and height are signed because selections dragged up or to the left
/// arrive with negative extents. Use [`Rectangle::normalize`] before indexing
/// pixels with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rectangle {
    #[must_use]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Flip negative extents so the rectangle covers the same pixels with
    /// a non-negative width and height
    #[must_use]
    pub fn with_positive_extent(self) -> Self {
        let (x, width) = if self.width < 0 {
            (self.x.saturating_add(self.width), self.width.saturating_abs())
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0 {
            (self.y.saturating_add(self.height), self.height.saturating_abs())
        } else {
            (self.y, self.height)
        };

        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersect with `[0, width] x [0, height]`
    ///
    /// Expects a rectangle with non-negative extents. A rectangle lying fully
    /// outside the bounds collapses to zero area.
    #[must_use]
    pub fn clip(self, width: u32, height: u32) -> Self {
        let max_x = i64::from(width);
        let max_y = i64::from(height);

        let x0 = i64::from(self.x).clamp(0, max_x);
        let y0 = i64::from(self.y).clamp(0, max_y);
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(0, max_x);
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(0, max_y);

        // Bounds fit in u32 and the clamped values never exceed them
        Self {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0).max(0) as i32,
            height: (y1 - y0).max(0) as i32,
        }
    }

    /// Normalize extents and clip against image bounds `(width, height)`
    #[must_use]
    pub fn normalize(self, bounds: (u32, u32)) -> Self {
        self.with_positive_extent().clip(bounds.0, bounds.1)
    }

    /// Whether the rectangle covers no pixels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of covered pixels (zero for inverted rectangles)
    #[must_use]
    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::from(self.width.unsigned_abs()) * u64::from(self.height.unsigned_abs())
        }
    }

    /// Whether pixel `(px, py)` lies inside a normalized rectangle
    #[must_use]
    pub fn contains(&self, px: u32, py: u32) -> bool {
        let px = i64::from(px);
        let py = i64::from(py);
        px >= i64::from(self.x)
            && py >= i64::from(self.y)
            && px < i64::from(self.x) + i64::from(self.width)
            && py < i64::from(self.y) + i64::from(self.height)
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Rectangle {
    type Err = DenoiseError;

    /// Parse `x,y,width,height`
    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                DenoiseError::invalid_config(format!("Invalid rectangle '{}': {}", s, e))
            })?;

        match parts.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(DenoiseError::invalid_config(format!(
                "Invalid rectangle '{}': expected x,y,width,height",
                s
            ))),
        }
    }
}

/// Which part of the image gets denoised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaMode {
    /// Denoise the entire image
    #[default]
    Full,
    /// Denoise everything, then keep original pixels where the mask marks foreground
    Background,
    /// Denoise only a caller-selected rectangle
    Custom,
}

impl AreaMode {
    /// Resolve a mode name, falling back to [`AreaMode::Full`] for unknown names
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(area = %name, "Unknown area mode, denoising the full image");
            Self::Full
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Background => "background",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for AreaMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaMode {
    type Err = DenoiseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "background" => Ok(Self::Background),
            "custom" => Ok(Self::Custom),
            other => Err(DenoiseError::invalid_config(format!(
                "Unknown area mode '{}'. Expected one of: full, background, custom",
                other
            ))),
        }
    }
}

/// Per-pixel foreground weights in `[0, 1]`
///
/// During blending a weight of 1 keeps the original pixel and 0 takes the
/// denoised pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    data: Vec<f32>,
    width: u32,
    height: u32,
}

impl Mask {
    /// Create a mask from row-major weights; values are clamped into `[0, 1]`
    ///
    /// # Errors
    /// - `data.len()` does not equal `width * height`
    pub fn new(data: Vec<f32>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DenoiseError::processing(format!(
                "Mask data has {} values, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }

        let data = data
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect();
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Mask with every weight set to `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        let value = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
        Self {
            data: vec![value; width as usize * height as usize],
            width,
            height,
        }
    }

    /// All-background mask
    #[must_use]
    pub fn zeros(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// All-foreground mask
    #[must_use]
    pub fn ones(width: u32, height: u32) -> Self {
        Self::filled(width, height, 1.0)
    }

    /// Build from an 8-bit map where 255 is foreground
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let data = image
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 255.0)
            .collect();
        Self {
            data,
            width,
            height,
        }
    }

    /// Render the mask as an 8-bit grayscale image
    #[must_use]
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([(self.get(x, y) * 255.0).round() as u8])
        })
    }

    /// Weight at `(x, y)`, 0 outside the mask
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.data.get(index).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major weights
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.data.len();
        let foreground_pixels = self.data.iter().filter(|&&v| v >= 0.5).count();
        let mean = if total_pixels == 0 {
            0.0
        } else {
            self.data.iter().map(|&v| f64::from(v)).sum::<f64>() / total_pixels as f64
        };
        let foreground_ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio,
            mean: mean as f32,
        }
    }

    /// Save mask as PNG
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_image()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub mean: f32,
}

/// Timing breakdown for one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding from bytes or file (zero for in-memory input)
    pub image_decode_ms: u64,

    /// Foreground segmentation (background mode only)
    pub segmentation_ms: u64,

    /// Denoiser execution
    pub denoise_ms: u64,

    /// ROI extraction and reinsertion (custom mode only)
    pub region_ms: u64,

    /// Mask blending (background mode only)
    pub blend_ms: u64,

    /// Final image encoding (if saving to file)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of total time spent in the denoiser
    #[must_use]
    pub fn denoise_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.denoise_ms as f64 / self.total_ms as f64
        }
    }

    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Denoise: {}ms | Segmentation: {}ms | Region: {}ms | Blend: {}ms",
            self.total_ms, self.denoise_ms, self.segmentation_ms, self.region_ms, self.blend_ms
        );
        if self.image_decode_ms > 0 {
            summary.push_str(&format!(" | Decode: {}ms", self.image_decode_ms));
        }
        if let Some(encode_ms) = self.image_encode_ms {
            summary.push_str(&format!(" | Encode: {}ms", encode_ms));
        }
        summary
    }
}

/// Metadata about the processing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Strategy that actually produced the denoised pixels
    pub strategy: DenoisingStrategy,

    /// Model name when a model-backed denoiser was used
    pub model_name: Option<String>,

    /// Pixel format of the input image
    pub color_type: String,

    /// When processing finished
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    #[must_use]
    pub fn new(strategy: DenoisingStrategy, color_type: String) -> Self {
        Self {
            timings: ProcessingTimings::new(),
            strategy,
            model_name: None,
            color_type,
            processed_at: Utc::now(),
        }
    }
}

/// Result of one pipeline invocation
#[derive(Debug, Clone)]
pub struct DenoiseResult {
    /// The processed image, same dimensions and pixel format as the input
    pub image: DynamicImage,

    /// Mode that actually ran (after fallbacks)
    pub area_mode: AreaMode,

    /// Normalized region for custom mode
    pub region: Option<Rectangle>,

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl DenoiseResult {
    #[must_use]
    pub fn new(
        image: DynamicImage,
        area_mode: AreaMode,
        region: Option<Rectangle>,
        metadata: ProcessingMetadata,
    ) -> Self {
        Self {
            image,
            area_mode,
            region,
            metadata,
        }
    }

    /// Get image dimensions
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get detailed timing breakdown
    #[must_use]
    pub fn timings(&self) -> &ProcessingTimings {
        &self.metadata.timings
    }

    /// Save in the specified format and record the encoding time
    pub fn save<P: AsRef<Path>>(&mut self, path: P, format: OutputFormat, quality: u8) -> Result<()> {
        let encode_start = instant::Instant::now();
        ImageIOService::save_image(&self.image, path, format, quality)?;
        self.metadata.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(())
    }

    /// Get the image as encoded bytes in the specified format
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        ImageIOService::encode_image(&self.image, format, quality)
    }

    /// Consume the result and return the image
    #[must_use]
    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}
