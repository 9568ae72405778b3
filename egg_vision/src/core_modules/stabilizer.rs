// THEORY:
// Per-frame labels flicker: lighting noise, the egg rolling into place, a hand
// passing the camera. The `LabelStabilizer` sits between the classifier and
// everything downstream and only lets a label through once it has persisted.
//
// Key principles:
// 1.  **Run Counting**: the stabilizer remembers the last raw label and how many
//     consecutive frames it has been seen. A different raw label restarts the run
//     at 1, since the frame that introduces the label is its first occurrence.
// 2.  **Commit On Persistence**: when the run reaches the configured threshold the
//     label becomes the committed label. The run keeps counting past the threshold
//     so re-commits of the same label are silent.
// 3.  **Change Events Only**: `changed` is true only on the frame where the
//     committed label actually differs from the previous committed label. This is
//     what drives snapshots and logging downstream.
// 4.  **Clean Start**: before any frame is seen the committed label is "No Egg" and
//     the run is empty.

use crate::core_modules::classifier::Label;
use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONSECUTIVE_FRAMES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilizerConfig {
    /// How many consecutive identical raw labels are needed to commit.
    pub consecutive_frames: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            consecutive_frames: DEFAULT_CONSECUTIVE_FRAMES,
        }
    }
}

impl StabilizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.consecutive_frames == 0 {
            return Err(VisionError::invalid_config(
                "stabilizer.consecutive_frames",
                self.consecutive_frames,
            ));
        }
        Ok(())
    }
}

/// The outcome of feeding one raw label to the stabilizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizerUpdate {
    /// The label the classifier produced for this frame.
    pub raw: Label,
    /// The label currently considered stable.
    pub committed: Label,
    /// True only when `committed` differs from the previous committed label.
    pub changed: bool,
}

/// A read-only view of the stabilizer's memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizerState {
    pub last_raw: Option<Label>,
    pub run_length: u32,
    pub committed: Label,
}

#[derive(Debug, Clone)]
pub struct LabelStabilizer {
    threshold: u32,
    last_raw: Option<Label>,
    run_length: u32,
    committed: Label,
}

impl Default for LabelStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}

impl LabelStabilizer {
    /// A threshold of zero is treated as one.
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            threshold: config.consecutive_frames.max(1),
            last_raw: None,
            run_length: 0,
            committed: Label::NoEgg,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn committed(&self) -> Label {
        self.committed
    }

    pub fn state(&self) -> StabilizerState {
        StabilizerState {
            last_raw: self.last_raw,
            run_length: self.run_length,
            committed: self.committed,
        }
    }

    /// Feeds one raw label and returns the (possibly unchanged) committed label.
    pub fn observe(&mut self, raw: Label) -> StabilizerUpdate {
        // --- 1. Extend or restart the run ---
        if self.last_raw == Some(raw) {
            self.run_length = self.run_length.saturating_add(1);
        } else {
            self.last_raw = Some(raw);
            self.run_length = 1;
        }

        // --- 2. Commit once the run is long enough ---
        let mut changed = false;
        if self.run_length >= self.threshold && self.committed != raw {
            debug!(from = %self.committed, to = %raw, run = self.run_length, "Committed label changed");
            self.committed = raw;
            changed = true;
        }

        StabilizerUpdate {
            raw,
            committed: self.committed,
            changed,
        }
    }

    /// Returns to the initial state.
    pub fn reset(&mut self) {
        self.last_raw = None;
        self.run_length = 0;
        self.committed = Label::NoEgg;
    }
}
