// THEORY:
// Locating the egg is polymorphic over two strategies:
// 1.  **Fixed ROI**: no segmentation at all. The operator supplies a box (absolute
//     corners, or a size centered in the frame) and the egg is assumed to sit in it.
//     This is the real-time video path where speed matters.
// 2.  **Auto-detect**: the `Segmenter` finds the egg contour and its bounding box
//     becomes the region, with the cleaned mask attached so the color profiler can
//     skip background pixels inside the box.
//
// Both sit behind the `EggLocator` trait so the pipeline never branches on mode.

use crate::core_modules::frame::Frame;
use crate::core_modules::region::Region;
use crate::core_modules::segmenter::{Detection, NoDetectionReason, Segmenter, SegmenterConfig};
use crate::error::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// How the region of interest is chosen for each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RoiMode {
    /// Absolute corners; `x2`/`y2` exclusive. Must fit inside every frame.
    Fixed { x1: u32, y1: u32, x2: u32, y2: u32 },
    /// A box of the given size centered in the frame, clamped to the frame size.
    Centered { width: u32, height: u32 },
    /// Segment every frame and use the egg contour's bounding box.
    AutoDetect,
}

impl Default for RoiMode {
    fn default() -> Self {
        RoiMode::Centered { width: 400, height: 400 }
    }
}

/// Where the egg is believed to be in one frame.
#[derive(Debug, Clone)]
pub enum Localization {
    Found {
        region: Region,
        /// Foreground mask in frame coordinates, present in auto-detect mode.
        mask: Option<GrayImage>,
    },
    NoDetection(NoDetectionReason),
}

impl Localization {
    pub fn region(&self) -> Option<Region> {
        match self {
            Localization::Found { region, .. } => Some(*region),
            Localization::NoDetection(_) => None,
        }
    }
}

/// Produces the region of interest for a frame.
pub trait EggLocator {
    fn locate(&self, frame: &Frame<'_>) -> Result<Localization>;
}

/// The fixed-box strategy.
#[derive(Debug, Clone, Copy)]
pub struct FixedRoi {
    mode: RoiMode,
}

impl FixedRoi {
    pub fn fixed(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            mode: RoiMode::Fixed { x1, y1, x2, y2 },
        }
    }

    pub fn centered(width: u32, height: u32) -> Self {
        Self {
            mode: RoiMode::Centered { width, height },
        }
    }

    pub fn region_for(&self, frame_width: u32, frame_height: u32) -> Result<Region> {
        let region = match self.mode {
            RoiMode::Fixed { x1, y1, x2, y2 } => Region::from_corners(x1, y1, x2, y2),
            RoiMode::Centered { width, height } => Region::centered(frame_width, frame_height, width, height),
            RoiMode::AutoDetect => Region::new(0, 0, frame_width, frame_height),
        };
        region.validate(frame_width, frame_height)
    }
}

impl EggLocator for FixedRoi {
    fn locate(&self, frame: &Frame<'_>) -> Result<Localization> {
        let region = self.region_for(frame.width(), frame.height())?;
        Ok(Localization::Found { region, mask: None })
    }
}

impl EggLocator for Segmenter {
    fn locate(&self, frame: &Frame<'_>) -> Result<Localization> {
        let segmentation = self.segment(frame);
        let localization = match segmentation.detection {
            Detection::Egg(contour) => match contour.bounding_box() {
                Some(region) => Localization::Found {
                    region: region.validate(frame.width(), frame.height())?,
                    mask: Some(segmentation.mask),
                },
                None => Localization::NoDetection(NoDetectionReason::NoCandidates),
            },
            Detection::NoDetection(reason) => Localization::NoDetection(reason),
        };
        Ok(localization)
    }
}

/// Builds the locator for a configured ROI mode.
pub fn locator_for(mode: RoiMode, segmentation: &SegmenterConfig) -> Box<dyn EggLocator + Send + Sync> {
    match mode {
        RoiMode::AutoDetect => Box::new(Segmenter::new(segmentation.clone())),
        fixed => Box::new(FixedRoi { mode: fixed }),
    }
}
