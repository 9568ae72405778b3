// THEORY:
// The `Segmenter` is the engine of the auto-detect path. It turns a frame into a
// binary foreground mask and picks the one contour it believes is the egg.
//
// Algorithm steps:
// 1.  **Grayscale & Enhancement**: Rec. 601 grayscale, optional histogram
//     equalization to stretch contrast, optional gamma lookup to lift shadows.
// 2.  **Binarization**: a global Otsu threshold or a local adaptive threshold
//     (Gaussian-weighted neighborhood mean minus an offset).
// 3.  **Polarity**: the egg is always the brighter region against a darker
//     background. The mean gray level inside and outside the initial mask decides
//     which binary class is the egg; the mask is inverted when the white class
//     reads darker.
// 4.  **Morphological Cleanup**: closing fills pinholes and small gaps, opening
//     removes speckle, a final dilation recovers the boundary the opening ate.
//     The cleanup runs on either binary class. Adaptive thresholds mark flat
//     areas white on both sides of the egg and leave only a thin dark ring along
//     its edge, so on those masks the dark class is cleaned (the ring merges with
//     the speckled background) and the result is inverted back.
// 5.  **Candidate Pooling**: three independent extraction strategies (external
//     borders, the full border hierarchy, and the borders of the largest connected
//     component) are pooled into one candidate list.
// 6.  **Area Filtering & Selection**: a candidate survives only if its enclosed
//     area lies strictly between a lower and an upper fraction of the image area.
//     That rejects noise specks and degenerate masks that span the whole frame.
//     The largest survivor wins.
//
// The segmenter is stateless: every call looks at one image only. Failure to find
// an egg is reported as a `Detection::NoDetection` value, never as an error.

use crate::core_modules::contour::{Contour, ContourSource, MIN_ELLIPSE_POINTS};
use crate::core_modules::frame::Frame;
use crate::error::{Result, VisionError};
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate, open};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// How the enhanced grayscale image is binarized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Global threshold minimizing intra-class variance.
    Otsu,
    /// Local threshold: a pixel is foreground when it exceeds the Gaussian-weighted
    /// mean of its `block_size` x `block_size` neighborhood minus `offset`.
    Adaptive { block_size: u32, offset: f32 },
}

/// Structuring element and iteration counts for mask cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MorphologyConfig {
    /// Diameter of the elliptical structuring element in pixels.
    pub kernel_size: u32,
    pub close_iterations: u32,
    pub open_iterations: u32,
    pub dilate_iterations: u32,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            kernel_size: 7,
            close_iterations: 2,
            open_iterations: 2,
            dilate_iterations: 1,
        }
    }
}

/// Which binary class the morphological cleanup operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupClass {
    /// Clean the egg class directly.
    #[default]
    Bright,
    /// Invert, clean the darker class, invert back.
    Dark,
}

/// Accepts contours whose area lies strictly between two fractions of the image area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaFilter {
    pub min_fraction: f64,
    pub max_fraction: f64,
}

impl Default for AreaFilter {
    fn default() -> Self {
        Self {
            min_fraction: 0.01,
            max_fraction: 0.95,
        }
    }
}

impl AreaFilter {
    pub fn accepts(&self, area: f64, image_area: f64) -> bool {
        area > self.min_fraction * image_area && area < self.max_fraction * image_area
    }
}

/// Tunable parameters for the auto-detect segmentation path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Stretch contrast with histogram equalization before thresholding.
    pub equalize_histogram: bool,
    /// Gamma exponent; values above 1 brighten. `None` skips the lookup.
    pub gamma: Option<f64>,
    pub threshold: ThresholdMethod,
    pub morphology: MorphologyConfig,
    #[serde(default)]
    pub cleanup_class: CleanupClass,
    pub area_filter: AreaFilter,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::video()
    }
}

impl SegmenterConfig {
    /// Real-time classification preset: global Otsu on an equalized image.
    pub fn video() -> Self {
        Self {
            equalize_histogram: true,
            gamma: None,
            threshold: ThresholdMethod::Otsu,
            morphology: MorphologyConfig::default(),
            cleanup_class: CleanupClass::Bright,
            area_filter: AreaFilter::default(),
        }
    }

    /// Still-image size estimation preset: gamma-lifted adaptive thresholding.
    pub fn still() -> Self {
        Self {
            equalize_histogram: true,
            gamma: Some(3.0),
            threshold: ThresholdMethod::Adaptive {
                block_size: 11,
                offset: 2.0,
            },
            morphology: MorphologyConfig::default(),
            cleanup_class: CleanupClass::Dark,
            area_filter: AreaFilter::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(gamma) = self.gamma {
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(VisionError::invalid_config("segmentation.gamma", gamma));
            }
        }
        if let ThresholdMethod::Adaptive { block_size, .. } = self.threshold {
            if block_size < 3 || block_size % 2 == 0 {
                return Err(VisionError::invalid_config("segmentation.threshold.block_size", block_size));
            }
        }
        if self.morphology.kernel_size == 0 {
            return Err(VisionError::invalid_config("segmentation.morphology.kernel_size", 0));
        }
        let area = self.area_filter;
        if !(0.0..1.0).contains(&area.min_fraction) || area.max_fraction <= area.min_fraction || area.max_fraction > 1.0 {
            return Err(VisionError::invalid_config(
                "segmentation.area_filter",
                format!("{}..{}", area.min_fraction, area.max_fraction),
            ));
        }
        Ok(())
    }
}

/// Why the segmenter could not name an egg contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDetectionReason {
    /// The cleaned mask produced no contours at all.
    NoCandidates,
    /// Every candidate was too small or too large.
    AllFilteredByArea,
    /// The winning contour is too short to fit an ellipse.
    TooFewPoints { points: usize },
}

impl fmt::Display for NoDetectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoDetectionReason::NoCandidates => write!(f, "no contours in mask"),
            NoDetectionReason::AllFilteredByArea => write!(f, "no contour within area bounds"),
            NoDetectionReason::TooFewPoints { points } => {
                write!(f, "winning contour has {points} points, need {MIN_ELLIPSE_POINTS}")
            }
        }
    }
}

/// The segmenter's verdict for one image.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Egg(Contour),
    NoDetection(NoDetectionReason),
}

impl Detection {
    pub fn egg(&self) -> Option<&Contour> {
        match self {
            Detection::Egg(contour) => Some(contour),
            Detection::NoDetection(_) => None,
        }
    }
}

/// Full output of one segmentation pass.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// The cleaned binary mask; 255 marks the egg class.
    pub mask: GrayImage,
    /// Every candidate that passed the area filter, in pooled order.
    pub contours: Vec<Contour>,
    pub detection: Detection,
}

/// Stateless foreground segmenter for the auto-detect path.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Segments a color frame.
    pub fn segment(&self, frame: &Frame<'_>) -> Segmentation {
        self.segment_gray(&frame.to_gray())
    }

    /// Segments an already-grayscale image.
    pub fn segment_gray(&self, gray: &GrayImage) -> Segmentation {
        let mask = self.foreground_mask(gray);
        let (contours, detection) = self.select_contour(&mask);
        Segmentation { mask, contours, detection }
    }

    /// Steps 1-4: enhancement, binarization, polarity and cleanup.
    pub fn foreground_mask(&self, gray: &GrayImage) -> GrayImage {
        let enhanced = self.enhance(gray);
        let mut mask = self.binarize(&enhanced);
        orient_bright_foreground(&enhanced, &mut mask);
        match self.config.cleanup_class {
            CleanupClass::Bright => self.clean(&mask),
            CleanupClass::Dark => {
                image::imageops::invert(&mut mask);
                let mut cleaned = self.clean(&mask);
                image::imageops::invert(&mut cleaned);
                cleaned
            }
        }
    }

    /// Steps 5-6: candidate pooling, area filtering and selection.
    pub fn select_contour(&self, mask: &GrayImage) -> (Vec<Contour>, Detection) {
        let candidates = pooled_candidates(mask);
        if candidates.is_empty() {
            return (Vec::new(), Detection::NoDetection(NoDetectionReason::NoCandidates));
        }

        let image_area = mask.width() as f64 * mask.height() as f64;
        let total = candidates.len();
        let survivors: Vec<Contour> = candidates
            .into_iter()
            .filter(|c| self.config.area_filter.accepts(c.area(), image_area))
            .collect();
        debug!(candidates = total, survivors = survivors.len(), "contour area filter");

        let winner = survivors
            .iter()
            .fold(None::<&Contour>, |best, c| match best {
                Some(b) if b.area() >= c.area() => Some(b),
                _ => Some(c),
            })
            .cloned();

        let detection = match winner {
            None => Detection::NoDetection(NoDetectionReason::AllFilteredByArea),
            Some(c) if !c.supports_ellipse_fit() => {
                Detection::NoDetection(NoDetectionReason::TooFewPoints { points: c.len() })
            }
            Some(c) => Detection::Egg(c),
        };
        (survivors, detection)
    }

    fn enhance(&self, gray: &GrayImage) -> GrayImage {
        let mut enhanced = if self.config.equalize_histogram {
            equalize_histogram(gray)
        } else {
            gray.clone()
        };
        if let Some(gamma) = self.config.gamma {
            let table = gamma_table(gamma);
            for pixel in enhanced.pixels_mut() {
                pixel.0[0] = table[pixel.0[0] as usize];
            }
        }
        enhanced
    }

    fn binarize(&self, gray: &GrayImage) -> GrayImage {
        match self.config.threshold {
            ThresholdMethod::Otsu => {
                let level = otsu_level(gray);
                debug!(level, "otsu threshold");
                GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                    binary(gray.get_pixel(x, y).0[0] > level)
                })
            }
            ThresholdMethod::Adaptive { block_size, offset } => {
                let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
                let local_mean = gaussian_blur_f32(gray, sigma);
                GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                    let value = gray.get_pixel(x, y).0[0] as f32;
                    let mean = local_mean.get_pixel(x, y).0[0] as f32;
                    binary(value > mean - offset)
                })
            }
        }
    }

    fn clean(&self, mask: &GrayImage) -> GrayImage {
        let morphology = self.config.morphology;
        let radius = morphology.kernel_size / 2;
        let reach = |iterations: u32| (radius * iterations).min(u8::MAX as u32) as u8;

        let mut cleaned = mask.clone();
        if reach(morphology.close_iterations) > 0 {
            cleaned = close(&cleaned, Norm::L2, reach(morphology.close_iterations));
        }
        if reach(morphology.open_iterations) > 0 {
            cleaned = open(&cleaned, Norm::L2, reach(morphology.open_iterations));
        }
        if reach(morphology.dilate_iterations) > 0 {
            cleaned = dilate(&cleaned, Norm::L2, reach(morphology.dilate_iterations));
        }
        cleaned
    }
}

fn binary(foreground: bool) -> Luma<u8> {
    Luma([if foreground { FOREGROUND } else { BACKGROUND }])
}

/// 256-entry lookup for `255 * (i / 255) ^ (1 / gamma)`.
pub fn gamma_table(gamma: f64) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = ((i as f64 / 255.0).powf(1.0 / gamma) * 255.0) as u8;
    }
    table
}

/// Inverts `mask` when its white class is darker on average than its black class.
fn orient_bright_foreground(gray: &GrayImage, mask: &mut GrayImage) {
    let (mut fg_sum, mut fg_count, mut bg_sum, mut bg_count) = (0u64, 0u64, 0u64, 0u64);
    for (value, class) in gray.pixels().zip(mask.pixels()) {
        if class.0[0] == FOREGROUND {
            fg_sum += value.0[0] as u64;
            fg_count += 1;
        } else {
            bg_sum += value.0[0] as u64;
            bg_count += 1;
        }
    }
    if fg_count == 0 || bg_count == 0 {
        return;
    }
    let fg_mean = fg_sum as f64 / fg_count as f64;
    let bg_mean = bg_sum as f64 / bg_count as f64;
    if fg_mean < bg_mean {
        debug!(fg_mean, bg_mean, "inverting mask polarity");
        image::imageops::invert(mask);
    }
}

/// Runs the three extraction strategies and concatenates their results.
fn pooled_candidates(mask: &GrayImage) -> Vec<Contour> {
    let traced = find_contours::<i32>(mask);

    let external = traced
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Contour::new(c.points.clone(), ContourSource::External));

    let hierarchy = traced
        .iter()
        .map(|c| Contour::new(c.points.clone(), ContourSource::Hierarchy));

    let mut pooled: Vec<Contour> = external.chain(hierarchy).collect();

    if let Some(component) = largest_component(mask) {
        pooled.extend(
            find_contours::<i32>(&component)
                .into_iter()
                .map(|c| Contour::new(c.points, ContourSource::LargestComponent)),
        );
    }
    pooled
}

/// A mask holding only the largest 8-connected foreground component.
fn largest_component(mask: &GrayImage) -> Option<GrayImage> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([BACKGROUND]));
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    if max_label == 0 {
        return None;
    }

    let mut counts = vec![0u64; max_label as usize + 1];
    for label in labels.pixels() {
        counts[label.0[0] as usize] += 1;
    }
    let (largest, _) = counts
        .iter()
        .enumerate()
        .skip(1)
        .fold((0usize, 0u64), |best, (label, &count)| if count > best.1 { (label, count) } else { best });

    Some(GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        binary(labels.get_pixel(x, y).0[0] as usize == largest)
    }))
}
