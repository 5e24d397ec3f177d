//! Risk scoring.
//!
//! Turns a clinical assessment into a weighted multi-signal risk score and
//! level. See [`RiskScoringEngine`].

pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clinical::UncertaintyReason;

use crate::types::{distinct_categories, EscalationAction, RiskLevel, RiskSignal};

pub use engine::RiskScoringEngine;

/// Thresholds in force when an assessment was made, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedThresholds {
    pub critical: f32,
    pub high: f32,
    pub elevated: f32,
}

/// Output of the risk scoring engine for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// The clinical assessment this was derived from
    pub clinical_assessment_id: Uuid,
    pub session_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,

    pub risk_level: RiskLevel,
    /// 0.0 - 1.0
    pub risk_score: f32,
    pub confidence: f32,
    pub signals: Vec<RiskSignal>,

    pub has_uncertainty: bool,
    pub uncertainty_reasons: Vec<UncertaintyReason>,

    pub recommended_actions: Vec<EscalationAction>,
    pub requires_human_review: bool,
    /// Level was raised to HIGH because the clinical layer demanded the crisis protocol
    pub crisis_floor_applied: bool,
    pub thresholds_applied: AppliedThresholds,
}

impl RiskAssessment {
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    pub fn category_count(&self) -> usize {
        distinct_categories(&self.signals)
    }

    /// Raise the level to at least `level`. Never lowers.
    ///
    /// Returns true when the level changed.
    pub fn raise_to(&mut self, level: RiskLevel) -> bool {
        if level <= self.risk_level {
            return false;
        }
        self.risk_level = level;
        self.recommended_actions = EscalationAction::for_level(level);
        if level >= RiskLevel::Critical {
            self.requires_human_review = true;
        }
        true
    }

    pub fn flag_for_review(&mut self) {
        self.requires_human_review = true;
    }
}
