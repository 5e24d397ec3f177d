//! Distress indicators grouped by domain.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::clamp_unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum DistressType {
    /// Racing heart, shortness of breath
    Physiological,
    /// Catastrophizing, racing thoughts
    Cognitive,
    /// Avoidance, restlessness
    Behavioral,
    /// Overwhelm, emotional flooding
    Emotional,
}

/// A single distress indicator reported by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DistressIndicator {
    pub indicator_type: DistressType,
    /// Classifier label, never user text
    pub description: String,
    /// 0.0 - 1.0
    pub severity: f32,
}

impl DistressIndicator {
    pub fn new(indicator_type: DistressType, description: impl Into<String>, severity: f32) -> Self {
        Self {
            indicator_type,
            description: description.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DistressIndicators {
    #[serde(default)]
    pub physiological: Vec<DistressIndicator>,
    #[serde(default)]
    pub cognitive: Vec<DistressIndicator>,
    #[serde(default)]
    pub behavioral: Vec<DistressIndicator>,
    #[serde(default)]
    pub emotional: Vec<DistressIndicator>,
    /// Aggregate distress (0.0 - 1.0)
    #[serde(default)]
    pub overall_distress_level: f32,
}

impl DistressIndicators {
    pub fn with_level(overall_distress_level: f32) -> Self {
        Self {
            overall_distress_level,
            ..Default::default()
        }
    }

    /// Route an indicator into the bucket matching its type.
    pub fn push(&mut self, indicator: DistressIndicator) {
        match indicator.indicator_type {
            DistressType::Physiological => self.physiological.push(indicator),
            DistressType::Cognitive => self.cognitive.push(indicator),
            DistressType::Behavioral => self.behavioral.push(indicator),
            DistressType::Emotional => self.emotional.push(indicator),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DistressIndicator> {
        self.physiological
            .iter()
            .chain(self.cognitive.iter())
            .chain(self.behavioral.iter())
            .chain(self.emotional.iter())
    }

    pub fn indicator_count(&self) -> usize {
        self.physiological.len() + self.cognitive.len() + self.behavioral.len() + self.emotional.len()
    }

    /// Number of domains with at least one indicator.
    pub fn domain_count(&self) -> usize {
        [&self.physiological, &self.cognitive, &self.behavioral, &self.emotional]
            .iter()
            .filter(|bucket| !bucket.is_empty())
            .count()
    }

    pub fn highest_severity(&self) -> f32 {
        self.iter().map(|i| i.severity).fold(0.0, f32::max)
    }

    pub(crate) fn sanitize(&mut self) {
        for bucket in [
            &mut self.physiological,
            &mut self.cognitive,
            &mut self.behavioral,
            &mut self.emotional,
        ] {
            for indicator in bucket.iter_mut() {
                indicator.severity = clamp_unit(indicator.severity, 1.0);
            }
        }
        self.overall_distress_level = clamp_unit(self.overall_distress_level, 1.0);
    }
}
