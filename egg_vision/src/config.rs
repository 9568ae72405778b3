// THEORY:
// Every tunable of the engine lives in one `EggVisionConfig`. Each component owns
// the type of its own section; this module only groups them, validates them as a
// whole, and moves them to and from JSON. `Default` is the canonical setup, and
// every section is `#[serde(default)]` so a config file only needs the keys it
// changes.

use crate::core_modules::classifier::{ClassifierThresholds, ThresholdProfile};
use crate::core_modules::color_profiler::ProfilerConfig;
use crate::core_modules::locator::RoiMode;
use crate::core_modules::segmenter::SegmenterConfig;
use crate::core_modules::size_estimator::SizeEstimationConfig;
use crate::core_modules::stabilizer::StabilizerConfig;
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which thresholds the classifier runs with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub profile: ThresholdProfile,
    /// Replaces the profile's thresholds entirely when present.
    pub thresholds: Option<ClassifierThresholds>,
}

impl ClassifierConfig {
    pub fn resolved(&self) -> ClassifierThresholds {
        self.thresholds.unwrap_or_else(|| self.profile.thresholds())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EggVisionConfig {
    pub roi: RoiMode,
    /// Segmentation used by the auto-detect ROI mode.
    pub segmentation: SegmenterConfig,
    pub profiler: ProfilerConfig,
    pub classifier: ClassifierConfig,
    pub stabilizer: StabilizerConfig,
    pub size_estimation: SizeEstimationConfig,
}

impl EggVisionConfig {
    pub fn validate(&self) -> Result<()> {
        match self.roi {
            RoiMode::Fixed { x1, y1, x2, y2 } if x2 <= x1 || y2 <= y1 => {
                return Err(VisionError::invalid_config("roi", format!("({x1},{y1})-({x2},{y2})")));
            }
            RoiMode::Centered { width, height } if width == 0 || height == 0 => {
                return Err(VisionError::invalid_config("roi", format!("{width}x{height}")));
            }
            _ => {}
        }
        self.segmentation.validate()?;
        self.classifier.resolved().validate()?;
        self.stabilizer.validate()?;
        self.size_estimation.segmentation.validate()?;
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}
