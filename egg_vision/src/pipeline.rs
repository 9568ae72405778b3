// THEORY:
// The `pipeline` module is the top-level API for classifying frames. It wires the
// components together in their fixed order:
//
//   frame -> locator (fixed box or segmenter) -> color profiler -> classifier
//         -> raw label -> stabilizer -> committed label
//
// `analyze` is the stateless half and can be called on any image in any order.
// `process_frame` adds the stabilizer and therefore expects the frames of one
// stream, in order. `reset` starts a new stream.

use crate::config::EggVisionConfig;
use crate::core_modules::classifier::{Classifier, Label};
use crate::core_modules::color_profiler::{ColorProfile, ColorProfiler};
use crate::core_modules::frame::Frame;
use crate::core_modules::locator::{locator_for, EggLocator, Localization};
use crate::core_modules::region::Region;
use crate::core_modules::segmenter::NoDetectionReason;
use crate::core_modules::stabilizer::{LabelStabilizer, StabilizerUpdate};
use crate::error::Result;
use tracing::debug;

/// Everything learned about one frame before stabilization.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    /// Where the egg was looked for; `None` when auto-detection found nothing.
    pub region: Option<Region>,
    pub color: ColorProfile,
    pub label: Label,
    /// Set when the segmenter found no egg contour.
    pub no_detection: Option<NoDetectionReason>,
}

/// The result of one stabilized frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub analysis: FrameAnalysis,
    pub update: StabilizerUpdate,
}

impl FrameReport {
    pub fn raw_label(&self) -> Label {
        self.update.raw
    }

    pub fn committed_label(&self) -> Label {
        self.update.committed
    }

    pub fn changed(&self) -> bool {
        self.update.changed
    }
}

pub struct EggPipeline {
    locator: Box<dyn EggLocator + Send + Sync>,
    profiler: ColorProfiler,
    classifier: Classifier,
    stabilizer: LabelStabilizer,
}

impl EggPipeline {
    /// Builds a pipeline from a validated configuration.
    pub fn new(config: &EggVisionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            locator: locator_for(config.roi, &config.segmentation),
            profiler: ColorProfiler::new(config.profiler),
            classifier: Classifier::new(config.classifier.resolved()),
            stabilizer: LabelStabilizer::new(config.stabilizer),
        })
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn stabilizer(&self) -> &LabelStabilizer {
        &self.stabilizer
    }

    /// Locates, profiles and classifies one frame. Does not touch the stabilizer.
    pub fn analyze(&self, frame: &Frame<'_>) -> Result<FrameAnalysis> {
        let analysis = match self.locator.locate(frame)? {
            Localization::NoDetection(reason) => FrameAnalysis {
                region: None,
                color: ColorProfile::Empty,
                label: Label::NoEgg,
                no_detection: Some(reason),
            },
            Localization::Found { region, mask } => {
                let color = match &mask {
                    Some(mask) => self.profiler.profile_masked(frame, region, mask)?,
                    None => self.profiler.profile(frame, region)?,
                };
                FrameAnalysis {
                    region: Some(region),
                    color,
                    label: self.classifier.classify_profile(&color),
                    no_detection: None,
                }
            }
        };
        debug!(label = %analysis.label, region = ?analysis.region, "frame analyzed");
        Ok(analysis)
    }

    /// Analyzes one frame of the current stream and feeds its label to the stabilizer.
    pub fn process_frame(&mut self, frame: &Frame<'_>) -> Result<FrameReport> {
        let analysis = self.analyze(frame)?;
        let update = self.stabilizer.observe(analysis.label);
        Ok(FrameReport { analysis, update })
    }

    /// Forgets the current stream.
    pub fn reset(&mut self) {
        self.stabilizer.reset();
    }
}
