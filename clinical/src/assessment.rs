//! The normalized clinical assessment record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::distress::DistressIndicators;
use crate::emotion::EmotionProfile;
use crate::error::{ContractError, Result};
use crate::severity::{PanicSeverity, UrgencyLevel};
use crate::triggers::TriggerAnalysis;
use crate::clamp_unit;

/// Below this confidence a classification is considered uncertain.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Top-two severity probabilities closer than this are considered ambiguous.
pub const AMBIGUITY_MARGIN: f32 = 0.15;

const PROBABILITY_SUM_TOLERANCE: f32 = 0.05;

/// Why an assessment (or anything derived from it) is uncertain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyReason {
    /// Overall confidence below the floor
    LowConfidence,
    /// Severity prediction is close between two tiers or weakly held
    AmbiguousSeverity,
}

impl UncertaintyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowConfidence => "low_confidence",
            Self::AmbiguousSeverity => "ambiguous_severity",
        }
    }
}

/// Severity prediction with its probability distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SeverityClassification {
    pub predicted_severity: PanicSeverity,
    #[serde(default)]
    pub probabilities: BTreeMap<PanicSeverity, f32>,
    pub confidence: f32,
    #[serde(default)]
    pub uncertainty_flag: bool,
    #[serde(default)]
    pub model_version: String,
}

impl SeverityClassification {
    /// Build a classification, deriving the uncertainty flag.
    pub fn new(
        predicted_severity: PanicSeverity,
        probabilities: BTreeMap<PanicSeverity, f32>,
        confidence: f32,
    ) -> Self {
        let mut classification = Self {
            predicted_severity,
            probabilities,
            confidence,
            uncertainty_flag: false,
            model_version: String::new(),
        };
        classification.uncertainty_flag = classification.is_ambiguous();
        classification
    }

    /// Classification with `confidence` on the predicted tier and the rest
    /// spread evenly over the other tiers.
    pub fn point(predicted_severity: PanicSeverity, confidence: f32) -> Self {
        let others = (1.0 - confidence).max(0.0) / 4.0;
        let probabilities = PanicSeverity::all()
            .into_iter()
            .map(|s| (s, if s == predicted_severity { confidence } else { others }))
            .collect();
        Self::new(predicted_severity, probabilities, confidence)
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Gap between the two most likely tiers, if there are at least two.
    pub fn top_two_margin(&self) -> Option<f32> {
        let mut probs: Vec<f32> = self.probabilities.values().copied().collect();
        if probs.len() < 2 {
            return None;
        }
        probs.sort_by(|a, b| b.total_cmp(a));
        Some(probs[0] - probs[1])
    }

    fn is_ambiguous(&self) -> bool {
        self.confidence < LOW_CONFIDENCE_THRESHOLD
            || self.top_two_margin().is_some_and(|m| m < AMBIGUITY_MARGIN)
    }

    pub fn probability_sum(&self) -> f32 {
        self.probabilities.values().sum()
    }
}

/// Versions of the upstream models that produced an assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ModelVersions {
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub distress: Option<String>,
}

/// Complete clinical assessment of a single message.
///
/// Construct through [`ClinicalAssessment::builder`], or call
/// [`ClinicalAssessment::sanitized`] on a deserialized record, so that the
/// derived fields hold:
///
/// - `requires_crisis_protocol` is true whenever the predicted severity is CRITICAL
/// - `urgency` follows the severity tier
/// - `uncertainty_reasons` is non-empty whenever confidence < 0.6 or the
///   severity prediction is ambiguous, and ambiguity forces human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ClinicalAssessment {
    pub assessment_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub message_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,

    pub severity: SeverityClassification,
    #[serde(default)]
    pub emotion_profile: EmotionProfile,
    #[serde(default)]
    pub distress_indicators: DistressIndicators,
    #[serde(default)]
    pub trigger_analysis: TriggerAnalysis,

    #[serde(default)]
    pub urgency: UrgencyLevel,
    #[serde(default)]
    pub requires_crisis_protocol: bool,
    #[serde(default)]
    pub requires_human_review: bool,

    /// Overall confidence of the assessment (0.0 - 1.0)
    pub confidence_score: f32,
    #[serde(default)]
    pub uncertainty_reasons: Vec<UncertaintyReason>,

    /// SHA-256 of the source text; the text itself never travels with the assessment
    #[serde(default)]
    pub raw_text_hash: Option<String>,
    #[serde(default)]
    pub model_versions: ModelVersions,
}

impl ClinicalAssessment {
    pub fn builder(severity: SeverityClassification) -> AssessmentBuilder {
        AssessmentBuilder::new(severity)
    }

    /// Hex SHA-256 of message text, for `raw_text_hash`.
    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn predicted_severity(&self) -> PanicSeverity {
        self.severity.predicted_severity
    }

    pub fn has_uncertainty(&self) -> bool {
        !self.uncertainty_reasons.is_empty()
    }

    /// Clamp every score into range and re-derive the invariant fields.
    ///
    /// NaN scores resolve toward the cautious end: confidences become 0,
    /// intensities and distress become 1.
    pub fn sanitized(mut self) -> Self {
        self.severity.confidence = clamp_unit(self.severity.confidence, 0.0);
        for p in self.severity.probabilities.values_mut() {
            *p = clamp_unit(*p, 0.0);
        }
        self.confidence_score = clamp_unit(self.confidence_score, 0.0);
        self.emotion_profile.sanitize();
        self.distress_indicators.sanitize();

        if self.severity.is_ambiguous() {
            self.severity.uncertainty_flag = true;
        }
        if self.severity.predicted_severity >= PanicSeverity::Critical {
            self.requires_crisis_protocol = true;
        }
        self.urgency = UrgencyLevel::from_severity(self.severity.predicted_severity);

        if self.severity.uncertainty_flag {
            self.requires_human_review = true;
            self.add_reason(UncertaintyReason::AmbiguousSeverity);
        }
        if self.confidence_score < LOW_CONFIDENCE_THRESHOLD {
            self.add_reason(UncertaintyReason::LowConfidence);
        }
        self
    }

    fn add_reason(&mut self, reason: UncertaintyReason) {
        if !self.uncertainty_reasons.contains(&reason) {
            self.uncertainty_reasons.push(reason);
        }
    }

    /// Strict check of the contract, without modifying anything.
    pub fn validate(&self) -> Result<()> {
        let mut scores: Vec<(&'static str, f32)> = vec![
            ("confidence_score", self.confidence_score),
            ("severity.confidence", self.severity.confidence),
            ("emotional_volatility", self.emotion_profile.emotional_volatility),
            ("overall_distress_level", self.distress_indicators.overall_distress_level),
        ];
        scores.extend(self.severity.probabilities.values().map(|p| ("severity.probability", *p)));
        scores.extend(self.emotion_profile.emotions.iter().map(|e| ("emotion.confidence", e.confidence)));
        scores.extend(self.distress_indicators.iter().map(|i| ("indicator.severity", i.severity)));

        for (field, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(ContractError::OutOfRange { field, value });
            }
        }

        if !self.severity.probabilities.is_empty() {
            let sum = self.severity.probability_sum();
            if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
                return Err(ContractError::ProbabilitySum { sum });
            }
        }

        if self.severity.predicted_severity >= PanicSeverity::Critical && !self.requires_crisis_protocol {
            return Err(ContractError::CrisisFlagMissing);
        }

        let uncertain = self.confidence_score < LOW_CONFIDENCE_THRESHOLD || self.severity.is_ambiguous();
        if uncertain && self.uncertainty_reasons.is_empty() {
            return Err(ContractError::UncertaintyUnreported);
        }

        Ok(())
    }
}

/// Builder for [`ClinicalAssessment`].
pub struct AssessmentBuilder {
    assessment: ClinicalAssessment,
}

impl AssessmentBuilder {
    pub fn new(severity: SeverityClassification) -> Self {
        Self {
            assessment: ClinicalAssessment {
                assessment_id: Uuid::new_v4(),
                user_id: None,
                session_id: None,
                message_id: None,
                timestamp: Utc::now(),
                confidence_score: severity.confidence,
                severity,
                emotion_profile: EmotionProfile::empty(),
                distress_indicators: DistressIndicators::default(),
                trigger_analysis: TriggerAnalysis::default(),
                urgency: UrgencyLevel::Routine,
                requires_crisis_protocol: false,
                requires_human_review: false,
                uncertainty_reasons: Vec::new(),
                raw_text_hash: None,
                model_versions: ModelVersions::default(),
            },
        }
    }

    pub fn assessment_id(mut self, id: Uuid) -> Self {
        self.assessment.assessment_id = id;
        self
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.assessment.user_id = Some(user_id);
        self
    }

    pub fn session(mut self, session_id: Uuid) -> Self {
        self.assessment.session_id = Some(session_id);
        self
    }

    pub fn message(mut self, message_id: Uuid) -> Self {
        self.assessment.message_id = Some(message_id);
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.assessment.timestamp = timestamp;
        self
    }

    pub fn emotions(mut self, profile: EmotionProfile) -> Self {
        self.assessment.emotion_profile = profile;
        self
    }

    pub fn distress(mut self, indicators: DistressIndicators) -> Self {
        self.assessment.distress_indicators = indicators;
        self
    }

    pub fn triggers(mut self, analysis: TriggerAnalysis) -> Self {
        self.assessment.trigger_analysis = analysis;
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.assessment.confidence_score = confidence;
        self
    }

    pub fn crisis_protocol(mut self, required: bool) -> Self {
        self.assessment.requires_crisis_protocol = required;
        self
    }

    pub fn human_review(mut self, required: bool) -> Self {
        self.assessment.requires_human_review = required;
        self
    }

    pub fn raw_text(mut self, text: &str) -> Self {
        self.assessment.raw_text_hash = Some(ClinicalAssessment::hash_text(text));
        self
    }

    pub fn model_versions(mut self, versions: ModelVersions) -> Self {
        self.assessment.model_versions = versions;
        self
    }

    pub fn build(self) -> ClinicalAssessment {
        self.assessment.sanitized()
    }
}
