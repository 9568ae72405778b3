// THEORY:
// A `Region` is the rectangular sub-view of a frame that the color profiler
// analyzes. It comes from one of two places: a fixed box chosen by the operator
// (real-time paths, egg assumed centered) or the bounding box of a segmented
// contour. Either way it must lie inside the frame and have a positive size.

use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel coordinates. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Builds a region from corner coordinates; `x2`/`y2` are exclusive.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self::new(x1, y1, x2.saturating_sub(x1), y2.saturating_sub(y1))
    }

    /// A `width` x `height` box centered in the frame, shrunk to fit when the
    /// frame is smaller than the requested box.
    pub fn centered(frame_width: u32, frame_height: u32, width: u32, height: u32) -> Self {
        let width = width.min(frame_width);
        let height = height.min(frame_height);
        Self::new((frame_width - width) / 2, (frame_height - height) / 2, width, height)
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Checks the region against the frame bounds.
    pub fn validate(self, frame_width: u32, frame_height: u32) -> Result<Self> {
        let fits = self.width > 0
            && self.height > 0
            && self.x.checked_add(self.width).is_some_and(|r| r <= frame_width)
            && self.y.checked_add(self.height).is_some_and(|b| b <= frame_height);
        if fits {
            Ok(self)
        } else {
            Err(VisionError::InvalidRegion {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                frame_width,
                frame_height,
            })
        }
    }
}
