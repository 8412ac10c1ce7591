//! Small-kernel filters over interleaved 8-bit buffers

use crate::utils::ColorParts;
use image::{DynamicImage, GrayImage, RgbImage};

/// 3x3 sharpening kernel: centre 9, every neighbour -1
pub const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Mirror an index into `0..len` without repeating the edge sample
///
/// `-1 -> 1`, `len -> len - 2`.
#[must_use]
pub(crate) fn reflect_101(index: i64, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let len = len as i64;
    let period = 2 * len - 2;
    let wrapped = index.rem_euclid(period);
    let mirrored = if wrapped >= len {
        period - wrapped
    } else {
        wrapped
    };
    mirrored as usize
}

/// Round and saturate a filtered sample
#[inline]
pub(crate) fn saturate_u8(value: f32) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// Run `filter` over the 8-bit `Luma`/`Rgb` samples of `image`
///
/// The filter receives `(samples, width, height, channels)` and returns a
/// buffer of the same length. Alpha is carried through untouched and empty
/// images are returned as-is.
pub(crate) fn map_samples<F>(image: &DynamicImage, filter: F) -> DynamicImage
where
    F: FnOnce(&[u8], usize, usize, usize) -> Vec<u8>,
{
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return image.clone();
    }

    let parts = ColorParts::split(image);
    let processed = match &parts.base {
        DynamicImage::ImageLuma8(buffer) => {
            let samples = filter(buffer.as_raw(), width as usize, height as usize, 1);
            GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8)
        },
        DynamicImage::ImageRgb8(buffer) => {
            let samples = filter(buffer.as_raw(), width as usize, height as usize, 3);
            RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8)
        },
        _ => None,
    };

    match processed {
        Some(processed) => parts.merge(processed),
        None => {
            tracing::warn!("Filter produced a buffer of unexpected size, keeping input");
            image.clone()
        },
    }
}

/// Convolve with a 3x3 kernel using mirrored borders
#[must_use]
pub(crate) fn convolve_3x3(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32; 9],
) -> Vec<u8> {
    let mut out = vec![0u8; src.len()];
    for y in 0..height {
        let rows = [
            reflect_101(y as i64 - 1, height),
            y,
            reflect_101(y as i64 + 1, height),
        ];
        for x in 0..width {
            let cols = [
                reflect_101(x as i64 - 1, width),
                x,
                reflect_101(x as i64 + 1, width),
            ];
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (ky, &row) in rows.iter().enumerate() {
                    for (kx, &col) in cols.iter().enumerate() {
                        let sample = src
                            .get((row * width + col) * channels + c)
                            .copied()
                            .unwrap_or(0);
                        let weight = kernel.get(ky * 3 + kx).copied().unwrap_or(0.0);
                        acc += weight * f32::from(sample);
                    }
                }
                if let Some(dst) = out.get_mut((y * width + x) * channels + c) {
                    *dst = saturate_u8(acc);
                }
            }
        }
    }
    out
}

/// Normalized 1D Gaussian kernel of odd `size`
#[must_use]
pub(crate) fn gaussian_kernel(size: u32, sigma: f32) -> Vec<f32> {
    let size = size.max(1) as i64;
    let radius = size / 2;
    let sigma = if sigma > 0.0 { sigma } else { 1.0 };
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / denom).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Separable Gaussian blur with mirrored borders
#[must_use]
pub(crate) fn gaussian_blur(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    size: u32,
    sigma: f32,
) -> Vec<u8> {
    let kernel = gaussian_kernel(size, sigma);
    let radius = (kernel.len() / 2) as i64;

    // Horizontal pass kept in f32 so the vertical pass rounds once
    let mut horizontal = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x as i64 + k as i64 - radius, width);
                    let sample = src.get((y * width + sx) * channels + c).copied().unwrap_or(0);
                    acc += weight * f32::from(sample);
                }
                if let Some(dst) = horizontal.get_mut((y * width + x) * channels + c) {
                    *dst = acc;
                }
            }
        }
    }

    let mut out = vec![0u8; src.len()];
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut acc = 0.0f32;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y as i64 + k as i64 - radius, height);
                    acc += weight
                        * horizontal
                            .get((sy * width + x) * channels + c)
                            .copied()
                            .unwrap_or(0.0);
                }
                if let Some(dst) = out.get_mut((y * width + x) * channels + c) {
                    *dst = saturate_u8(acc);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, Rgba, RgbaImage};

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(0, 5), 0);
        assert_eq!(reflect_101(4, 5), 4);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-7, 2), 1);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn test_saturate() {
        assert_eq!(saturate_u8(-3.0), 0);
        assert_eq!(saturate_u8(300.0), 255);
        assert_eq!(saturate_u8(127.5), 128);
        assert_eq!(saturate_u8(f32::NAN), 0);
    }

    #[test]
    fn test_sharpen_keeps_flat_regions() {
        let src = vec![90u8; 5 * 4 * 3];
        let out = convolve_3x3(&src, 5, 4, 3, &SHARPEN_KERNEL);
        assert_eq!(out, src);
    }

    #[test]
    fn test_sharpen_amplifies_isolated_peak() {
        let mut src = vec![100u8; 9];
        src[4] = 110;
        let out = convolve_3x3(&src, 3, 3, 1, &SHARPEN_KERNEL);
        // 9 * 110 - 8 * 100
        assert_eq!(out[4], 190);
        // The corner sees the peak four times through the mirrored border
        assert_eq!(out[0], 60);
    }

    #[test]
    fn test_gaussian_kernel_is_normalized() {
        let kernel = gaussian_kernel(3, 0.5);
        assert_eq!(kernel.len(), 3);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(kernel[1] > kernel[0]);
        assert!((kernel[0] - kernel[2]).abs() < 1e-7);
    }

    #[test]
    fn test_gaussian_blur_flat_is_identity() {
        let src = vec![42u8; 6 * 6];
        assert_eq!(gaussian_blur(&src, 6, 6, 1, 3, 0.5), src);
    }

    #[test]
    fn test_gaussian_blur_spreads_peak() {
        let mut src = vec![0u8; 25];
        src[12] = 255;
        let out = gaussian_blur(&src, 5, 5, 1, 3, 0.5);
        assert!(out[12] < 255);
        assert!(out[11] > 0);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn test_map_samples_preserves_format() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([10, 20, 30, 77])));
        let inverted = map_samples(&rgba, |src, _, _, channels| {
            assert_eq!(channels, 3);
            src.iter().map(|v| 255 - v).collect()
        });
        let out = inverted.as_rgba8().unwrap();
        assert_eq!(out.get_pixel(1, 1), &Rgba([245, 235, 225, 77]));

        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([5])));
        let out = map_samples(&gray, |src, _, _, channels| {
            assert_eq!(channels, 1);
            src.to_vec()
        });
        assert_eq!(out, gray);
    }

    #[test]
    fn test_map_samples_wrong_length_keeps_input() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])));
        let out = map_samples(&rgb, |_, _, _, _| vec![0u8; 2]);
        assert_eq!(out, rgb);
    }

    #[test]
    fn test_map_samples_empty_image() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 4));
        let out = map_samples(&empty, |_, _, _, _| unreachable!());
        assert_eq!(out, empty);
    }
}
