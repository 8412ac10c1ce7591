//! Non-local means denoising
//!
//! Every pixel becomes a weighted average of the pixels in its search window,
//! weighted by how similar the surrounding patches are. Patch distances are
//! computed per search offset with an integral image, so cost is
//! `O(search² · pixels)` independent of the patch size.
//!
//! For three-channel input the patch distance is taken jointly over all
//! channels, so every channel of a pixel shares one weight.

use super::kernels::{reflect_101, saturate_u8};
use crate::config::NonLocalMeansParams;

/// Weights below this fraction are dropped entirely
const WEIGHT_THRESHOLD: f64 = 0.001;

/// Mirrored copy of an interleaved buffer with `pad` extra samples per side
struct PaddedImage {
    data: Vec<f32>,
    width: usize,
    channels: usize,
}

impl PaddedImage {
    fn new(src: &[u8], width: usize, height: usize, channels: usize, pad: usize) -> Self {
        let padded_width = width + 2 * pad;
        let padded_height = height + 2 * pad;
        let mut data = Vec::with_capacity(padded_width * padded_height * channels);

        for py in 0..padded_height {
            let sy = reflect_101(py as i64 - pad as i64, height);
            for px in 0..padded_width {
                let sx = reflect_101(px as i64 - pad as i64, width);
                let base = (sy * width + sx) * channels;
                for c in 0..channels {
                    data.push(f32::from(src.get(base + c).copied().unwrap_or(0)));
                }
            }
        }

        Self {
            data,
            width: padded_width,
            channels,
        }
    }

    #[inline]
    fn sample(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data
            .get((y * self.width + x) * self.channels + c)
            .copied()
            .unwrap_or(0.0)
    }

    #[inline]
    fn squared_distance(&self, a: (usize, usize), b: (usize, usize)) -> f64 {
        (0..self.channels)
            .map(|c| {
                let d = f64::from(self.sample(a.0, a.1, c) - self.sample(b.0, b.1, c));
                d * d
            })
            .sum()
    }
}

/// Denoise an interleaved 8-bit buffer
#[must_use]
pub(crate) fn non_local_means(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    params: &NonLocalMeansParams,
) -> Vec<u8> {
    if width == 0 || height == 0 || channels == 0 {
        return src.to_vec();
    }

    let search_radius = (params.search_window / 2) as usize;
    let patch_radius = (params.template_window / 2) as usize;
    let pad = search_radius + patch_radius;
    let padded = PaddedImage::new(src, width, height, channels, pad);

    let h = f64::from(params.strength).max(1e-3);
    let patch_side = 2 * patch_radius + 1;
    let normalizer = (patch_side * patch_side * channels) as f64 * h * h;

    // Region whose patch sums we need: the image plus one patch radius per side
    let region_width = width + 2 * patch_radius;
    let region_height = height + 2 * patch_radius;
    let integral_stride = region_width + 1;
    let mut integral = vec![0.0f64; integral_stride * (region_height + 1)];

    let mut accum = vec![0.0f64; width * height * channels];
    let mut weight_sum = vec![0.0f64; width * height];

    let search = search_radius as i64;
    for dy in -search..=search {
        for dx in -search..=search {
            // Region coordinate (u, v) sits at padded (u + search, v + search)
            for v in 0..region_height {
                let mut row_sum = 0.0f64;
                for u in 0..region_width {
                    let a = (u + search_radius, v + search_radius);
                    let b = (
                        (a.0 as i64 + dx) as usize,
                        (a.1 as i64 + dy) as usize,
                    );
                    row_sum += padded.squared_distance(a, b);
                    let above = integral.get(v * integral_stride + u + 1).copied().unwrap_or(0.0);
                    if let Some(cell) = integral.get_mut((v + 1) * integral_stride + u + 1) {
                        *cell = above + row_sum;
                    }
                }
            }

            for y in 0..height {
                for x in 0..width {
                    let at = |ix: usize, iy: usize| {
                        integral.get(iy * integral_stride + ix).copied().unwrap_or(0.0)
                    };
                    let x1 = x + patch_side;
                    let y1 = y + patch_side;
                    let patch_sum = at(x1, y1) - at(x, y1) - at(x1, y) + at(x, y);

                    let weight = (-patch_sum.max(0.0) / normalizer).exp();
                    if weight < WEIGHT_THRESHOLD {
                        continue;
                    }

                    let nx = (x + pad) as i64 + dx;
                    let ny = (y + pad) as i64 + dy;
                    let pixel = y * width + x;
                    if let Some(total) = weight_sum.get_mut(pixel) {
                        *total += weight;
                    }
                    for c in 0..channels {
                        let sample = padded.sample(nx as usize, ny as usize, c);
                        if let Some(acc) = accum.get_mut(pixel * channels + c) {
                            *acc += weight * f64::from(sample);
                        }
                    }
                }
            }
        }
    }

    accum
        .chunks(channels)
        .zip(&weight_sum)
        .flat_map(|(pixel, &total)| {
            // The zero offset always contributes weight 1, so total >= 1
            pixel
                .iter()
                .map(move |&acc| saturate_u8((acc / total.max(f64::EPSILON)) as f32))
        })
        .collect()
}
