//! Support interventions the decision layer can select.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PanicIntervention {
    /// 5-4-3-2-1 sensory grounding
    GroundingTechnique,
    BreathingExercise,
    CognitiveReframe,
    ProgressiveRelaxation,
    Validation,
    Distraction,
    CrisisResources,
    ProfessionalReferral,
}

impl PanicIntervention {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GroundingTechnique => "grounding_technique",
            Self::BreathingExercise => "breathing_exercise",
            Self::CognitiveReframe => "cognitive_reframe",
            Self::ProgressiveRelaxation => "progressive_relaxation",
            Self::Validation => "validation",
            Self::Distraction => "distraction",
            Self::CrisisResources => "crisis_resources",
            Self::ProfessionalReferral => "professional_referral",
        }
    }
}
