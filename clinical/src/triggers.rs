//! Trigger analysis.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Known panic trigger categories.
///
/// Unrecognized labels from the classifier deserialize to [`PanicTrigger::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PanicTrigger {
    Unknown,
    Social,
    HealthAnxiety,
    WorkStress,
    Relationship,
    Financial,
    TraumaReminder,
    PhysicalSymptoms,
    Caffeine,
    SleepDeprivation,
    CrowdedSpace,
    #[serde(other)]
    Other,
}

impl PanicTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Social => "social",
            Self::HealthAnxiety => "health_anxiety",
            Self::WorkStress => "work_stress",
            Self::Relationship => "relationship",
            Self::Financial => "financial",
            Self::TraumaReminder => "trauma_reminder",
            Self::PhysicalSymptoms => "physical_symptoms",
            Self::Caffeine => "caffeine",
            Self::SleepDeprivation => "sleep_deprivation",
            Self::CrowdedSpace => "crowded_space",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct TriggerAnalysis {
    /// Triggers present in the current message
    #[serde(default)]
    pub immediate_triggers: Vec<PanicTrigger>,
    /// Triggers seen in earlier episodes
    #[serde(default)]
    pub historical_patterns: Vec<PanicTrigger>,
    /// Time-of-day or situational context label
    #[serde(default)]
    pub temporal_context: Option<String>,
    #[serde(default)]
    pub contextual_factors: Vec<String>,
}

impl TriggerAnalysis {
    pub fn immediate(triggers: Vec<PanicTrigger>) -> Self {
        Self {
            immediate_triggers: triggers,
            ..Default::default()
        }
    }

    pub fn has_immediate(&self, trigger: PanicTrigger) -> bool {
        self.immediate_triggers.contains(&trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_label_maps_to_other() {
        let trigger: PanicTrigger = serde_json::from_str("\"thunderstorm\"").unwrap();
        assert_eq!(trigger, PanicTrigger::Other);
        let trigger: PanicTrigger = serde_json::from_str("\"health_anxiety\"").unwrap();
        assert_eq!(trigger, PanicTrigger::HealthAnxiety);
    }

    #[test]
    fn test_has_immediate() {
        let analysis = TriggerAnalysis::immediate(vec![PanicTrigger::Caffeine]);
        assert!(analysis.has_immediate(PanicTrigger::Caffeine));
        assert!(!analysis.has_immediate(PanicTrigger::Social));
    }
}
