//! Edge-preserving bilateral smoothing

use super::kernels::{reflect_101, saturate_u8};
use crate::config::BilateralParams;

/// Apply a bilateral filter to an interleaved 8-bit buffer
///
/// The window is circular with radius `diameter / 2`. Color distance is the
/// sum of absolute channel differences, so all channels of a pixel share
/// one weight.
#[must_use]
pub(crate) fn bilateral_filter(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    params: &BilateralParams,
) -> Vec<u8> {
    if width == 0 || height == 0 || channels == 0 {
        return src.to_vec();
    }

    let radius = (params.diameter / 2).max(1) as i64;
    let sigma_space = f64::from(params.sigma_space).max(1e-3);
    let sigma_color = f64::from(params.sigma_color).max(1e-3);
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let color_coeff = -0.5 / (sigma_color * sigma_color);

    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = dx * dx + dy * dy;
            if r2 <= radius * radius {
                offsets.push((dx, dy, (r2 as f64 * space_coeff).exp()));
            }
        }
    }

    let color_weights: Vec<f64> = (0..=255 * channels)
        .map(|d| ((d * d) as f64 * color_coeff).exp())
        .collect();

    let mut out = vec![0u8; src.len()];
    let mut acc = vec![0.0f64; channels];

    for y in 0..height {
        for x in 0..width {
            let center = (y * width + x) * channels;
            let Some(center_px) = src.get(center..center + channels) else {
                continue;
            };

            acc.iter_mut().for_each(|v| *v = 0.0);
            let mut total = 0.0f64;

            for &(dx, dy, space_weight) in &offsets {
                let sx = reflect_101(x as i64 + dx, width);
                let sy = reflect_101(y as i64 + dy, height);
                let start = (sy * width + sx) * channels;
                let Some(neighbor) = src.get(start..start + channels) else {
                    continue;
                };

                let distance: usize = center_px
                    .iter()
                    .zip(neighbor)
                    .map(|(&a, &b)| a.abs_diff(b) as usize)
                    .sum();
                let weight =
                    space_weight * color_weights.get(distance).copied().unwrap_or(0.0);

                total += weight;
                for (slot, &sample) in acc.iter_mut().zip(neighbor) {
                    *slot += weight * f64::from(sample);
                }
            }

            // The centre pixel always contributes weight 1
            for (c, &sum) in acc.iter().enumerate() {
                if let Some(dst) = out.get_mut(center + c) {
                    *dst = saturate_u8((sum / total.max(f64::EPSILON)) as f32);
                }
            }
        }
    }

    out
}
