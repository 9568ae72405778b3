// THEORY:
// The `Classifier` maps one dominant HSV color to a label with a strictly ordered
// list of range rules. The first rule that matches wins and nothing after it is
// consulted; the order is a deliberate priority.
//
// Canonical rule order:
//   1. value below the darkness floor            -> No Egg
//   2. inside the "good" HSV box                 -> Good Egg   (or 3, see priority)
//   3. inside the "bad" HSV box                  -> Bad Egg    (or 2, see priority)
//   4. pale and bright (loose fallback)          -> Good Egg
//   5. strongly saturated (loose fallback)       -> Bad Egg
//   6. anything else                             -> Uncertain
//
// Every bound is configuration. The numeric bands were tuned per lighting setup
// and differ between historical deployments, so they are grouped into named
// `ThresholdProfile`s and any of them can be overridden wholesale. The final
// catch-all makes the rule list total: every (h, s, v) gets exactly one label.

use crate::error::{Result, VisionError};
use crate::core_modules::color_profiler::ColorProfile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four possible verdicts for a frame or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "No Egg")]
    NoEgg,
    #[serde(rename = "Good Egg")]
    GoodEgg,
    #[serde(rename = "Bad Egg")]
    BadEgg,
    #[serde(rename = "Uncertain")]
    Uncertain,
}

impl Label {
    pub const ALL: [Label; 4] = [Label::NoEgg, Label::GoodEgg, Label::BadEgg, Label::Uncertain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::NoEgg => "No Egg",
            Label::GoodEgg => "Good Egg",
            Label::BadEgg => "Bad Egg",
            Label::Uncertain => "Uncertain",
        }
    }

    pub fn is_egg(&self) -> bool {
        !matches!(self, Label::NoEgg)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric range, inclusive at both ends unless marked otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
    /// `min` itself is outside the band.
    #[serde(default)]
    pub exclusive_min: bool,
    /// `max` itself is outside the band.
    #[serde(default)]
    pub exclusive_max: bool,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            exclusive_min: false,
            exclusive_max: false,
        }
    }

    pub const fn excluding_min(self) -> Self {
        Self {
            exclusive_min: true,
            ..self
        }
    }

    pub const fn excluding_max(self) -> Self {
        Self {
            exclusive_max: true,
            ..self
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = if self.exclusive_min { value > self.min } else { value >= self.min };
        let below = if self.exclusive_max { value < self.max } else { value <= self.max };
        above && below
    }

    /// True when no value can satisfy the band.
    pub fn is_empty(&self) -> bool {
        self.min > self.max || (self.min == self.max && (self.exclusive_min || self.exclusive_max))
    }
}

/// A box in HSV space: all three channels must fall in their band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HsvBox {
    pub hue: Band,
    pub saturation: Band,
    pub value: Band,
}

impl HsvBox {
    pub fn contains(&self, h: f64, s: f64, v: f64) -> bool {
        self.hue.contains(h) && self.saturation.contains(s) && self.value.contains(v)
    }
}

/// Which of the two HSV boxes is checked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePriority {
    GoodFirst,
    BadFirst,
}

/// Pale, bright shells: `s < saturation_max` and `v > value_min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LooseGood {
    pub saturation_max: f64,
    pub value_min: f64,
}

/// Every bound the rule list uses.
///
/// The canonical good box is open at its saturation ceiling and its value floor
/// (`s < 75`, `v > 120`), so a color on the shared `s = 75` edge falls through
/// to the bad box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// `v` strictly below this is "No Egg". Zero disables the rule.
    pub darkness_floor: f64,
    pub good: HsvBox,
    pub bad: HsvBox,
    pub priority: RulePriority,
    /// Fallback "Good Egg" rule; `None` disables it.
    pub loose_good: Option<LooseGood>,
    /// Fallback "Bad Egg" rule: `s` strictly above this. `None` disables it.
    pub bad_saturation_min: Option<f64>,
}

/// Named threshold sets for the lighting setups the classifier has been tuned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdProfile {
    /// Good-first ordering with both fallbacks; the default.
    #[default]
    Canonical,
    /// Warm lighting over a brown-shell line: bad box first, no fallbacks.
    BrownShell,
    /// Cool lighting with a green cast on stained shells: bad box first, no fallbacks.
    GreenCast,
}

impl ThresholdProfile {
    pub fn thresholds(&self) -> ClassifierThresholds {
        match self {
            ThresholdProfile::Canonical => ClassifierThresholds {
                darkness_floor: 50.0,
                good: HsvBox {
                    hue: Band::new(18.0, 35.0),
                    saturation: Band::new(0.0, 75.0).excluding_max(),
                    value: Band::new(120.0, 255.0).excluding_min(),
                },
                bad: HsvBox {
                    hue: Band::new(17.0, 23.0),
                    saturation: Band::new(75.0, 140.0),
                    value: Band::new(105.0, 210.0),
                },
                priority: RulePriority::GoodFirst,
                loose_good: Some(LooseGood {
                    saturation_max: 40.0,
                    value_min: 170.0,
                }),
                bad_saturation_min: Some(140.0),
            },
            ThresholdProfile::BrownShell => ClassifierThresholds {
                darkness_floor: 0.0,
                good: HsvBox {
                    hue: Band::new(18.0, 35.0),
                    saturation: Band::new(40.0, 90.0),
                    value: Band::new(120.0, 255.0),
                },
                bad: HsvBox {
                    hue: Band::new(17.0, 23.0),
                    saturation: Band::new(75.0, 140.0),
                    value: Band::new(105.0, 210.0),
                },
                priority: RulePriority::BadFirst,
                loose_good: None,
                bad_saturation_min: None,
            },
            ThresholdProfile::GreenCast => ClassifierThresholds {
                darkness_floor: 0.0,
                good: HsvBox {
                    hue: Band::new(44.0, 50.0),
                    saturation: Band::new(20.0, 28.0),
                    value: Band::new(140.0, 170.0),
                },
                bad: HsvBox {
                    hue: Band::new(50.0, 180.0).excluding_min(),
                    saturation: Band::new(20.0, 255.0),
                    value: Band::new(140.0, 255.0),
                },
                priority: RulePriority::BadFirst,
                loose_good: None,
                bad_saturation_min: None,
            },
        }
    }
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        ThresholdProfile::Canonical.thresholds()
    }
}

impl ClassifierThresholds {
    pub fn validate(&self) -> Result<()> {
        let bands = [
            ("good.hue", self.good.hue),
            ("good.saturation", self.good.saturation),
            ("good.value", self.good.value),
            ("bad.hue", self.bad.hue),
            ("bad.saturation", self.bad.saturation),
            ("bad.value", self.bad.value),
        ];
        for (name, band) in bands {
            if !(band.min.is_finite() && band.max.is_finite()) || band.is_empty() {
                return Err(VisionError::invalid_config(
                    format!("classifier.{name}"),
                    format!("{}..{}", band.min, band.max),
                ));
            }
        }
        if !self.darkness_floor.is_finite() || self.darkness_floor < 0.0 {
            return Err(VisionError::invalid_config("classifier.darkness_floor", self.darkness_floor));
        }
        Ok(())
    }
}

/// One entry of the ordered rule list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    TooDark { floor: f64 },
    InBox { bounds: HsvBox, label: Label },
    LooseGood(LooseGood),
    Saturated { min: f64 },
}

impl Rule {
    fn matches(&self, h: f64, s: f64, v: f64) -> Option<Label> {
        let hit = match self {
            Rule::TooDark { floor } => v < *floor,
            Rule::InBox { bounds, .. } => bounds.contains(h, s, v),
            Rule::LooseGood(loose) => s < loose.saturation_max && v > loose.value_min,
            Rule::Saturated { min } => s > *min,
        };
        hit.then_some(match self {
            Rule::TooDark { .. } => Label::NoEgg,
            Rule::InBox { label, .. } => *label,
            Rule::LooseGood(_) => Label::GoodEgg,
            Rule::Saturated { .. } => Label::BadEgg,
        })
    }
}

/// Maps a dominant HSV color to a label.
#[derive(Debug, Clone)]
pub struct Classifier {
    thresholds: ClassifierThresholds,
    rules: Vec<Rule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}

impl Classifier {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        let good = Rule::InBox {
            bounds: thresholds.good,
            label: Label::GoodEgg,
        };
        let bad = Rule::InBox {
            bounds: thresholds.bad,
            label: Label::BadEgg,
        };

        let mut rules = vec![Rule::TooDark {
            floor: thresholds.darkness_floor,
        }];
        match thresholds.priority {
            RulePriority::GoodFirst => rules.extend([good, bad]),
            RulePriority::BadFirst => rules.extend([bad, good]),
        }
        if let Some(loose) = thresholds.loose_good {
            rules.push(Rule::LooseGood(loose));
        }
        if let Some(min) = thresholds.bad_saturation_min {
            rules.push(Rule::Saturated { min });
        }

        Self { thresholds, rules }
    }

    pub fn from_profile(profile: ThresholdProfile) -> Self {
        Self::new(profile.thresholds())
    }

    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// The rules in evaluation order, excluding the final "Uncertain" catch-all.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Classifies an 8-bit HSV triple (hue on the halved-degree scale).
    pub fn classify(&self, h: f64, s: f64, v: f64) -> Label {
        self.rules
            .iter()
            .find_map(|rule| rule.matches(h, s, v))
            .unwrap_or(Label::Uncertain)
    }

    /// Classifies a profiler result; an empty profile is "No Egg".
    pub fn classify_profile(&self, profile: &ColorProfile) -> Label {
        match profile {
            ColorProfile::Dominant(color) => self.classify(color.hue, color.saturation, color.value),
            ColorProfile::Empty => Label::NoEgg,
        }
    }
}
