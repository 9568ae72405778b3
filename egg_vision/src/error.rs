//! Error types for the egg_vision engine.
//!
//! Detection-empty outcomes (no valid pixels, no surviving contour) are not
//! errors. They travel as ordinary values (`ColorProfile::Empty`,
//! `Localization::NoDetection`) and end up as the "No Egg" label.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for egg_vision operations.
pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors raised while loading input, validating configuration or driving a session.
#[derive(Error, Debug)]
pub enum VisionError {
    /// An image file could not be opened or decoded.
    #[error("failed to load image {path}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An image could not be encoded or written.
    #[error("failed to save image {path}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A raw frame buffer does not match its declared dimensions.
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    FrameShape {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// A region of interest falls outside the frame or is empty.
    #[error("region {x},{y} {width}x{height} does not fit a {frame_width}x{frame_height} frame")]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {parameter} = {value}")]
    InvalidConfig { parameter: String, value: String },

    /// A configuration file could not be parsed or serialized.
    #[error("configuration format error")]
    ConfigFormat(#[from] serde_json::Error),

    /// Reading a frame from a source or writing to a sink failed.
    #[error("video backend error: {0}")]
    Video(String),

    /// A batch worker task panicked or was cancelled.
    #[error("batch worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VisionError {
    pub fn invalid_config(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidConfig {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Input-level failures a batch can skip past and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VisionError::ImageLoad { .. } | VisionError::FrameShape { .. } | VisionError::InvalidRegion { .. }
        )
    }
}

/// Reasons the Size Estimator could not report axes for an image.
#[derive(Error, Debug)]
pub enum SizeError {
    #[error("image could not be read")]
    Unreadable(#[source] VisionError),

    #[error("no egg contour survived segmentation ({0})")]
    NoContour(String),

    #[error("ellipse fit infeasible: {0}")]
    EllipseFitInfeasible(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_recoverable() {
        let err = VisionError::FrameShape { width: 2, height: 2, expected: 12, actual: 3 };
        assert!(err.is_recoverable());
        assert!(!VisionError::Video("writer closed".into()).is_recoverable());
    }

    #[test]
    fn invalid_config_formats_parameter() {
        let err = VisionError::invalid_config("stabilizer.consecutive_frames", 0);
        assert_eq!(err.to_string(), "invalid configuration: stabilizer.consecutive_frames = 0");
    }
}
