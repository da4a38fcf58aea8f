use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MineRagError, Result};

/// One labelled box as reported by the PPE detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(alias = "conf")]
    pub confidence: f32,
    pub box_xyxy: [f32; 4],
}

impl Detection {
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(MineRagError::InvalidDetection(format!(
                "{}: confidence {} is outside [0, 1]",
                self.label, self.confidence
            )));
        }
        if self.box_xyxy.iter().any(|c| !c.is_finite()) {
            return Err(MineRagError::InvalidDetection(format!(
                "{}: bounding box has non-finite coordinates",
                self.label
            )));
        }
        Ok(())
    }
}

/// PPE classes the detector is trained on. Variant order is the reporting
/// order: absences first, by priority, then presences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PpeClass {
    #[serde(rename = "no-helmet")]
    NoHelmet,
    #[serde(rename = "no-vest")]
    NoVest,
    #[serde(rename = "no-boots")]
    NoBoots,
    #[serde(rename = "helmet")]
    Helmet,
    #[serde(rename = "vest")]
    Vest,
    #[serde(rename = "boots")]
    Boots,
}

impl PpeClass {
    /// Classifies a detector label; labels outside the PPE set return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "no-helmet" => Some(Self::NoHelmet),
            "no-vest" => Some(Self::NoVest),
            "no-boots" => Some(Self::NoBoots),
            "helmet" => Some(Self::Helmet),
            "vest" => Some(Self::Vest),
            "boots" => Some(Self::Boots),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoHelmet => "no-helmet",
            Self::NoVest => "no-vest",
            Self::NoBoots => "no-boots",
            Self::Helmet => "helmet",
            Self::Vest => "vest",
            Self::Boots => "boots",
        }
    }

    /// The item a non-compliance class reports as missing.
    pub const fn missing_item(self) -> Option<&'static str> {
        match self {
            Self::NoHelmet => Some("helmet"),
            Self::NoVest => Some("vest"),
            Self::NoBoots => Some("boots"),
            Self::Helmet | Self::Vest | Self::Boots => None,
        }
    }
}

impl fmt::Display for PpeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk tiers, lowest first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Unknown,
    Low,
    Elevated,
    Critical,
}

impl RiskLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
        }
    }

    /// Priority table: helmet absence above vest/boots absence above
    /// presence-only classes.
    pub const fn for_class(class: PpeClass) -> Self {
        match class {
            PpeClass::NoHelmet => Self::Critical,
            PpeClass::NoVest | PpeClass::NoBoots => Self::Elevated,
            PpeClass::Helmet | PpeClass::Vest | PpeClass::Boots => Self::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardSummary {
    pub counts: BTreeMap<PpeClass, usize>,
    pub missing: Vec<String>,
    pub ignored: usize,
    pub below_confidence: usize,
    pub risk_level: RiskLevel,
    pub text: String,
}

impl HazardSummary {
    pub fn count(&self, class: PpeClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn has_detections(&self) -> bool {
        !self.counts.is_empty()
    }
}
