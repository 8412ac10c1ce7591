//! Foreground/background segmentation
//!
//! Produces a [`Mask`] where 1 marks foreground. Two refinement methods are
//! available: filled outer contours of a dilated Canny edge map, or an
//! opening/closing pass over the Otsu threshold map.

use crate::{
    config::{SegmentationConfig, SegmentationMethod},
    types::Mask,
};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::{
    contours::{find_contours, BorderType},
    contrast::otsu_level,
    distance_transform::Norm,
    drawing::draw_polygon_mut,
    edges::canny,
    morphology::{close, dilate, open},
    point::Point,
};
use tracing::{span, Level};

const FOREGROUND: Luma<u8> = Luma([255]);

/// Reduce an image to 8-bit intensity with Rec. 601 weights
#[must_use]
pub fn intensity(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            image.to_luma8()
        },
        _ => {
            let rgb = image.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                let luma = 0.114f32.mul_add(
                    f32::from(b),
                    0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
                );
                Luma([luma.round().clamp(0.0, 255.0) as u8])
            })
        },
    }
}

/// Binary map of pixels brighter than the Otsu level
#[must_use]
pub fn otsu_threshold(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    log::trace!("Otsu level {level}");
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > level {
            FOREGROUND
        } else {
            Luma([0])
        }
    })
}

/// Absolute polygon area by the shoelace formula
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice_area.abs() as f64 / 2.0
}

/// Drop consecutive duplicates and a closing point equal to the first
fn open_polygon(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &point in points {
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

/// Foreground segmenter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmenter {
    config: SegmentationConfig,
}

impl Segmenter {
    #[must_use]
    pub fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Compute the foreground mask of `image`
    ///
    /// Never fails. Empty or uniform images yield an all-zero mask.
    #[must_use]
    pub fn segment(&self, image: &DynamicImage) -> Mask {
        let (width, height) = (image.width(), image.height());
        let _span = span!(
            Level::DEBUG,
            "segmentation",
            method = %self.config.method,
            width,
            height
        )
        .entered();

        if width == 0 || height == 0 {
            return Mask::zeros(width, height);
        }

        let gray = intensity(image);
        let mut samples = gray.as_raw().iter();
        let first = samples.next().copied().unwrap_or(0);
        if samples.all(|&v| v == first) {
            log::debug!("Uniform image, nothing to segment");
            return Mask::zeros(width, height);
        }

        let map = match self.config.method {
            SegmentationMethod::EdgeContours => self.edge_contour_map(&gray),
            SegmentationMethod::Morphology => self.morphology_map(&gray),
        };
        let mask = Mask::from_gray(&map);

        let stats = mask.statistics();
        log::debug!(
            "Segmented {} of {} pixels as foreground",
            stats.foreground_pixels,
            stats.total_pixels
        );
        mask
    }

    /// Filled outer contours of the dilated edge map
    fn edge_contour_map(&self, gray: &GrayImage) -> GrayImage {
        let edges = canny(gray, self.config.canny_low, self.config.canny_high);
        let edges = if self.config.dilate_iterations > 0 {
            // Each iteration of a 3x3 square element grows the edges by one pixel
            dilate(&edges, Norm::LInf, self.config.dilate_iterations)
        } else {
            edges
        };

        let mut filled = GrayImage::new(gray.width(), gray.height());
        let mut kept = 0usize;
        for contour in find_contours::<i32>(&edges) {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            if polygon_area(&contour.points) <= self.config.min_contour_area {
                continue;
            }
            let polygon = open_polygon(&contour.points);
            if polygon.is_empty() {
                continue;
            }
            draw_polygon_mut(&mut filled, &polygon, FOREGROUND);
            kept += 1;
        }
        log::trace!("Filled {kept} contours");
        filled
    }

    /// Opening then closing of the Otsu threshold map
    fn morphology_map(&self, gray: &GrayImage) -> GrayImage {
        let thresholded = otsu_threshold(gray);
        let reach = self
            .config
            .morph_kernel_radius
            .saturating_mul(self.config.morph_iterations);
        if reach == 0 {
            return thresholded;
        }
        let opened = open(&thresholded, Norm::LInf, reach);
        close(&opened, Norm::LInf, reach)
    }
}
