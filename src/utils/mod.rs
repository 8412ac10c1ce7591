//! Shared utilities for pixel format handling and model tensors

pub mod color;
pub mod preprocessing;

pub use color::{convert_like, from_raw_8bit, is_grayscale, to_8bit, Channel, ColorParts};
pub use preprocessing::ImagePreprocessor;
