//! Turns PPE detector output into a hazard summary and a retrieval query.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::debug;

use crate::config::HazardConfig;
use crate::domain::{Detection, HazardSummary, PpeClass, RiskLevel};
use crate::error::{MineRagError, Result};

const QUERY_GUIDANCE: &str = "Include supervision, training, access control, and stop-work/escalation \
steps when critical PPE is missing, for mining operations. \
Treat 'helmet' as safety helmet, 'vest' as high-visibility vest, and 'boots' as safety boots.";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardBridge {
    min_confidence: f32,
}

impl Default for HazardBridge {
    fn default() -> Self {
        Self {
            min_confidence: 0.25,
        }
    }
}

impl HazardBridge {
    pub fn new(min_confidence: f32) -> Result<Self> {
        if !min_confidence.is_finite() || !(0.0..=1.0).contains(&min_confidence) {
            return Err(MineRagError::InvalidDetection(format!(
                "confidence threshold {min_confidence} is outside [0, 1]"
            )));
        }
        Ok(Self { min_confidence })
    }

    pub fn from_config(config: &HazardConfig) -> Result<Self> {
        Self::new(config.min_confidence)
    }

    pub const fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Same bridge with a per-request threshold; `None` keeps the configured one.
    pub fn with_override(self, min_confidence: Option<f32>) -> Result<Self> {
        min_confidence.map_or(Ok(self), Self::new)
    }

    /// Rejects malformed detections before anything is counted.
    pub fn validate(detections: &[Detection]) -> Result<()> {
        detections.iter().try_for_each(Detection::validate)
    }

    /// Counts PPE detections at or above the threshold and derives the risk
    /// level from the strongest class present. Deterministic for a given
    /// multiset of detections.
    pub fn summarize(&self, detections: &[Detection]) -> HazardSummary {
        let mut counts: BTreeMap<PpeClass, usize> = BTreeMap::new();
        let mut ignored = 0;
        let mut below_confidence = 0;

        for detection in detections {
            if detection.confidence < self.min_confidence {
                below_confidence += 1;
                continue;
            }
            match PpeClass::from_label(&detection.label) {
                Some(class) => *counts.entry(class).or_default() += 1,
                None => ignored += 1,
            }
        }

        let risk_level = counts
            .keys()
            .map(|class| RiskLevel::for_class(*class))
            .max()
            .unwrap_or_default();
        let missing: Vec<String> = counts
            .keys()
            .filter_map(|class| class.missing_item())
            .map(str::to_string)
            .collect();
        let text = summary_text(&counts, &missing, risk_level);

        debug!(
            kept = counts.values().sum::<usize>(),
            ignored,
            below_confidence,
            risk = %risk_level,
            "summarized detections"
        );
        HazardSummary {
            counts,
            missing,
            ignored,
            below_confidence,
            risk_level,
            text,
        }
    }

    /// Natural-language retrieval query for a summary. Never empty.
    pub fn to_query(summary: &HazardSummary) -> String {
        let lead = if !summary.missing.is_empty() {
            format!(
                "What controls are required when workers are missing: {}?",
                summary.missing.join(", ")
            )
        } else if summary.has_detections() {
            let present: Vec<&str> = summary.counts.keys().map(|c| c.as_str()).collect();
            format!(
                "How should compliance be maintained for workers observed wearing: {}?",
                present.join(", ")
            )
        } else {
            "What PPE controls are required for workers at a mining site?".to_string()
        };
        format!("{lead} Observation: {} {QUERY_GUIDANCE}", summary.text)
    }
}

fn summary_text(counts: &BTreeMap<PpeClass, usize>, missing: &[String], risk: RiskLevel) -> String {
    if counts.is_empty() {
        return format!("Detected: no PPE-relevant detections. risk_level={risk}.");
    }
    let detected: Vec<String> = counts
        .iter()
        .map(|(class, n)| format!("{class}={n}"))
        .collect();
    let mut text = format!("Detected: {}.", detected.join(", "));
    if !missing.is_empty() {
        let _ = write!(text, " Missing PPE: {}.", missing.join(", "));
    }
    let _ = write!(text, " risk_level={risk}.");
    text
}
