//! Image I/O operations service
//!
//! Keeps file and byte-stream handling apart from the pixel pipeline.

use crate::{
    config::OutputFormat,
    error::{DenoiseError, Result},
    filters::ColorFilter,
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage};
use std::io::Cursor;
use std::path::Path;

/// Extensions accepted for uploaded images
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content sniffing when the extension does not match the
    /// actual format.
    ///
    /// # Errors
    /// - File does not exist or cannot be read
    /// - Content cannot be decoded
    ///
    /// # Examples
    /// ```rust,no_run
    /// use imgly_denoise::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(DenoiseError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref)
                    .map_err(|io_err| DenoiseError::file_io_error("read image data", path_ref, &io_err))?;

                image::load_from_memory(&data).map_err(|content_err| {
                    DenoiseError::image_load_error(path_ref, &content_err)
                })
            },
        }
    }

    /// Decode an image from memory
    ///
    /// # Errors
    /// - Bytes are empty or not a decodable image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(DenoiseError::processing("Cannot decode an empty buffer"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            DenoiseError::processing(format!("Failed to decode image from bytes: {}", e))
        })
    }

    /// Read an async stream to the end and decode it
    ///
    /// # Errors
    /// - Reading the stream fails
    /// - Any error from [`ImageIOService::load_from_bytes`]
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| DenoiseError::processing(format!("Failed to read from stream: {}", e)))?;

        Self::load_from_bytes(&buffer)
    }

    /// Encode an image into `format`
    ///
    /// JPEG has no alpha channel; transparent images are flattened to RGB or
    /// grayscale first.
    ///
    /// # Errors
    /// - The encoder rejects the image
    pub fn encode_image(image: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            OutputFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
                let encoded = if image.color().has_color() {
                    encoder.encode_image(&image.to_rgb8())
                } else {
                    encoder.encode_image(&image.to_luma8())
                };
                encoded.map_err(|e| DenoiseError::processing(format!("Failed to encode JPEG: {}", e)))?;
            },
            OutputFormat::Png | OutputFormat::Tiff => {
                image.write_to(&mut cursor, format.image_format()).map_err(|e| {
                    DenoiseError::processing(format!(
                        "Failed to encode {}: {}",
                        format.extension().to_uppercase(),
                        e
                    ))
                })?;
            },
        }

        Ok(buffer)
    }

    /// Encode and write an image, creating parent directories as needed
    ///
    /// # Errors
    /// - Directory creation or file write fails
    /// - Any error from [`ImageIOService::encode_image`]
    pub fn save_image<P: AsRef<Path>>(
        image: &DynamicImage,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DenoiseError::file_io_error("create output directory", parent, &e))?;
        }

        let bytes = Self::encode_image(image, format, quality)?;
        std::fs::write(path_ref, bytes)
            .map_err(|e| DenoiseError::file_io_error("write image", path_ref, &e))?;
        log::debug!("Saved {} as {}", path_ref.display(), format.extension());
        Ok(())
    }

    /// Whether the file name carries one of [`ALLOWED_EXTENSIONS`]
    pub fn is_allowed_extension<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                ALLOWED_EXTENSIONS.contains(&ext.as_str())
            })
    }

    /// Output format matching the file's extension
    pub fn format_for_path<P: AsRef<Path>>(path: P) -> Option<OutputFormat> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(OutputFormat::from_extension)
    }

    /// Fresh `processed_<uuid>.<ext>` name for a result of `source`
    ///
    /// The extension is taken from `source`, defaulting to `png`.
    #[must_use]
    pub fn processed_file_name<P: AsRef<Path>>(source: P) -> String {
        let extension = source
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or_else(|| "png".to_string(), str::to_lowercase);
        format!("processed_{}.{}", uuid::Uuid::new_v4(), extension)
    }

    /// `<filter>_<name>` for a filtered copy of `file_name`
    #[must_use]
    pub fn filtered_file_name(filter: ColorFilter, file_name: &str) -> String {
        format!("{}_{}", filter.as_str(), file_name)
    }
}
