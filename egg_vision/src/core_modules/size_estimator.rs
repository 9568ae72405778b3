// THEORY:
// The `SizeEstimator` is an independent still-image pipeline: segment, pick the
// egg contour, fit an ellipse, report axis lengths in pixels. It shares the
// `Segmenter` with the classification path but runs it with the still-image
// preset (gamma lift and adaptive threshold) by default.
//
// Every failure is a value of `SizeError` so a batch can report it per image and
// move on.

use crate::core_modules::ellipse::{fit_ellipse, EllipseFit};
use crate::core_modules::frame::Frame;
use crate::core_modules::region::Region;
use crate::core_modules::segmenter::{Detection, Segmenter, SegmenterConfig};
use crate::error::{SizeError, VisionError};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Size-estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimationConfig {
    pub segmentation: SegmenterConfig,
}

impl Default for SizeEstimationConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmenterConfig::still(),
        }
    }
}

/// Axis lengths and extent of one egg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub major_axis_px: f64,
    pub minor_axis_px: f64,
    pub bounding_box: Region,
    pub ellipse: EllipseFit,
}

#[derive(Debug, Clone)]
pub struct SizeEstimator {
    segmenter: Segmenter,
}

impl Default for SizeEstimator {
    fn default() -> Self {
        Self::new(SizeEstimationConfig::default())
    }
}

impl SizeEstimator {
    pub fn new(config: SizeEstimationConfig) -> Self {
        Self {
            segmenter: Segmenter::new(config.segmentation),
        }
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn estimate(&self, frame: &Frame<'_>) -> Result<SizeEstimate, SizeError> {
        // --- 1. Segment ---
        let segmentation = self.segmenter.segment(frame);
        let contour = match segmentation.detection {
            Detection::Egg(contour) => contour,
            Detection::NoDetection(reason) => return Err(SizeError::NoContour(reason.to_string())),
        };

        // --- 2. Fit ---
        let ellipse = fit_ellipse(&contour.points)?;

        // --- 3. Report ---
        let bounding_box = ellipse
            .bounding_box()
            .ok_or_else(|| SizeError::EllipseFitInfeasible("ellipse outline lies outside the image".into()))?;
        debug!(
            points = contour.len(),
            major = ellipse.major_axis(),
            minor = ellipse.minor_axis(),
            "ellipse fitted"
        );

        Ok(SizeEstimate {
            major_axis_px: ellipse.major_axis(),
            minor_axis_px: ellipse.minor_axis(),
            bounding_box,
            ellipse,
        })
    }

    pub fn estimate_image(&self, image: &RgbImage) -> Result<SizeEstimate, SizeError> {
        self.estimate(&Frame::from(image))
    }

    /// Loads and estimates one image file.
    pub fn estimate_path(&self, path: &Path) -> Result<SizeEstimate, SizeError> {
        let image = image::open(path)
            .map_err(|source| {
                SizeError::Unreadable(VisionError::ImageLoad {
                    path: path.to_path_buf(),
                    source,
                })
            })?
            .to_rgb8();
        self.estimate_image(&image)
    }
}
