// THEORY:
// This file is the entry point for the `egg_vision` library crate. It defines the
// public API consumed by front ends such as the `egg_inspector` binary.
//
// Two independent pipelines are exported:
// 1.  **Classification**: `EggPipeline` turns a frame into a raw label and, fed a
//     stream in order, into a stabilized label. `VideoSession` drives it over a
//     `FrameSource`/`FrameSink` pair and `StillBatch` runs it over still images.
// 2.  **Size Estimation**: `SizeEstimator` segments a still image, fits an ellipse
//     to the egg outline and reports its axes in pixels.
//
// The building blocks (`core_modules`) stay public so they can be used and tested
// on their own, but the types re-exported here are the intended surface.

pub mod batch_pipeline;
pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod session;

pub use batch_pipeline::{BatchOptions, StillBatch, StillOutcome, StillReport};
pub use config::{ClassifierConfig, EggVisionConfig};
pub use core_modules::classifier::{Classifier, ClassifierThresholds, Label, ThresholdProfile};
pub use core_modules::color_profiler::{ColorProfile, ColorProfiler, DominantColor};
pub use core_modules::frame::{Frame, OwnedFrame};
pub use core_modules::locator::RoiMode;
pub use core_modules::pixel::pixel::ChannelOrder;
pub use core_modules::region::Region;
pub use core_modules::segmenter::{CleanupClass, Segmenter, SegmenterConfig};
pub use core_modules::size_estimator::{SizeEstimate, SizeEstimationConfig, SizeEstimator};
pub use core_modules::stabilizer::{LabelStabilizer, StabilizerConfig};
pub use error::{Result, SizeError, VisionError};
pub use pipeline::{EggPipeline, FrameAnalysis, FrameReport};
pub use session::{
    FrameSink, FrameSource, ImageSequenceSink, ImageSequenceSource, Overlay, SessionSummary, SnapshotLog, VideoSession,
};
