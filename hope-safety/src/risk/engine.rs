//! Weighted multi-signal risk scoring engine.
//!
//! Signals are extracted independently from the severity tier, high-risk
//! emotions, volatility, aggregate distress, the crisis-protocol flag and the
//! recent session history, then combined as
//! `score = min(1, Σ(weight·confidence) / Σ|weights|)`.
//!
//! The normalizer is the sum of the absolute weight table, not the maximum
//! achievable weighted sum, so the score rarely approaches 1.0. That behavior
//! is kept until the weight table is re-reviewed clinically.

use tracing::debug;

use clinical::{clamp_unit, ClinicalAssessment, EmotionCategory, PanicSeverity, UncertaintyReason};

use crate::config::RiskConfig;
use crate::risk::{AppliedThresholds, RiskAssessment};
use crate::types::{distinct_categories, EscalationAction, RiskLevel, RiskSignal, SignalCategory, SignalSource};

/// Pure risk scoring engine.
///
/// Holds only configuration; `assess` has no side effects and identical
/// inputs yield identical outputs.
#[derive(Debug, Clone)]
pub struct RiskScoringEngine {
    config: RiskConfig,
}

impl RiskScoringEngine {
    pub fn new() -> Self {
        Self::with_config(RiskConfig::default())
    }

    pub fn with_config(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Assess risk for one message.
    ///
    /// `history` holds the risk scores of earlier messages in the session,
    /// oldest first.
    pub fn assess(&self, assessment: &ClinicalAssessment, history: &[f32]) -> RiskAssessment {
        let signals = self.extract_signals(assessment, history);
        let (risk_score, confidence) = self.calculate_score(&signals, assessment.confidence_score);
        let mut risk_level = self.classify_level(risk_score, &signals);

        let mut uncertainty_reasons = Vec::new();
        if confidence < self.config.low_confidence_threshold || !assessment.confidence_score.is_finite() {
            uncertainty_reasons.push(UncertaintyReason::LowConfidence);
        }
        if assessment.severity.uncertainty_flag || !assessment.severity.confidence.is_finite() {
            uncertainty_reasons.push(UncertaintyReason::AmbiguousSeverity);
        }
        let has_uncertainty = !uncertainty_reasons.is_empty();

        // Uncertainty only ever pushes upward
        if has_uncertainty && risk_level < RiskLevel::High && risk_score > self.config.uncertainty_bump_score {
            risk_level = risk_level.max(RiskLevel::Elevated);
        }

        let mut crisis_floor_applied = false;
        let crisis_protocol =
            assessment.requires_crisis_protocol || assessment.predicted_severity() >= PanicSeverity::Critical;
        if crisis_protocol && risk_level < RiskLevel::High {
            risk_level = RiskLevel::High;
            crisis_floor_applied = true;
        }

        debug!(
            assessment_id = %assessment.assessment_id,
            score = risk_score,
            confidence = confidence,
            level = %risk_level,
            signals = signals.len(),
            "Risk assessed"
        );

        RiskAssessment {
            clinical_assessment_id: assessment.assessment_id,
            session_id: assessment.session_id,
            timestamp: assessment.timestamp,
            risk_level,
            risk_score,
            confidence,
            signals,
            has_uncertainty,
            uncertainty_reasons,
            recommended_actions: self.recommended_actions(risk_level),
            requires_human_review: risk_level >= RiskLevel::Critical,
            crisis_floor_applied,
            thresholds_applied: AppliedThresholds {
                critical: self.config.critical_threshold,
                high: self.config.high_threshold,
                elevated: self.config.elevated_threshold,
            },
        }
    }

    /// Extract every risk signal present in the assessment.
    pub fn extract_signals(&self, assessment: &ClinicalAssessment, history: &[f32]) -> Vec<RiskSignal> {
        let weights = &self.config.weights;
        let mut signals = Vec::new();

        let severity = &assessment.severity;
        let severity_signal = match severity.predicted_severity {
            PanicSeverity::Critical => Some(("severity_critical", weights.severity_critical)),
            PanicSeverity::Severe => Some(("severity_severe", weights.severity_severe)),
            PanicSeverity::Moderate => Some(("severity_moderate", weights.severity_moderate)),
            PanicSeverity::Mild | PanicSeverity::None => None,
        };
        if let Some((name, weight)) = severity_signal {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                name,
                format!("Severity classified as {}", severity.predicted_severity),
                weight,
                severity.confidence,
                SignalSource::SeverityClassifier,
            ));
        }

        let profile = &assessment.emotion_profile;
        for emotion in &profile.emotions {
            let Some(weight) = self.emotion_weight(emotion.category) else {
                continue;
            };
            if emotion.confidence > self.config.emotion_confidence_floor {
                signals.push(RiskSignal::new(
                    SignalCategory::Emotional,
                    format!("emotion_{}", emotion.category.as_str()),
                    format!("High-risk emotion detected: {}", emotion.category.as_str()),
                    weight,
                    emotion.confidence,
                    SignalSource::EmotionClassifier,
                ));
            }
        }

        if profile.emotional_volatility > self.config.volatility_threshold {
            signals.push(RiskSignal::new(
                SignalCategory::Emotional,
                "high_volatility",
                "Emotional state is swinging sharply",
                weights.high_volatility,
                profile.emotional_volatility,
                SignalSource::EmotionClassifier,
            ));
        }

        let distress = assessment.distress_indicators.overall_distress_level;
        if distress > self.config.distress_threshold {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                "high_distress",
                "Aggregate distress is high",
                weights.high_distress,
                distress,
                SignalSource::DistressIndicators,
            ));
        }

        if assessment.requires_crisis_protocol {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                "crisis_protocol_active",
                "Clinical assessment requires the crisis protocol",
                weights.crisis_protocol_active,
                1.0,
                SignalSource::ClinicalAssessment,
            ));
        }

        if let Some(signal) = self.sustained_risk_signal(history) {
            signals.push(signal);
        }

        signals
    }

    fn emotion_weight(&self, category: EmotionCategory) -> Option<f32> {
        let weights = &self.config.weights;
        match category {
            EmotionCategory::Dread => Some(weights.emotion_dread),
            EmotionCategory::Dissociation => Some(weights.emotion_dissociation),
            EmotionCategory::Helplessness => Some(weights.emotion_helplessness),
            EmotionCategory::LossOfControl => Some(weights.emotion_loss_of_control),
            EmotionCategory::Fear
            | EmotionCategory::Hypervigilance
            | EmotionCategory::Shame
            | EmotionCategory::Confusion => None,
        }
    }

    fn sustained_risk_signal(&self, history: &[f32]) -> Option<RiskSignal> {
        let rule = &self.config.history;
        if rule.window == 0 || history.len() < rule.window {
            return None;
        }
        let recent = &history[history.len() - rule.window..];
        if !recent.iter().all(|score| *score > rule.score_threshold) {
            return None;
        }
        Some(RiskSignal::new(
            SignalCategory::Historical,
            "sustained_risk",
            format!("Elevated risk across the last {} messages", rule.window),
            rule.weight,
            rule.confidence,
            SignalSource::SessionHistory,
        ))
    }

    /// Combine signals into `(score, confidence)`.
    pub fn calculate_score(&self, signals: &[RiskSignal], assessment_confidence: f32) -> (f32, f32) {
        let assessment_confidence = clamp_unit(assessment_confidence, 0.0);
        if signals.is_empty() {
            return (0.0, assessment_confidence);
        }

        let weighted: f32 = signals.iter().map(RiskSignal::contribution).sum();
        let normalizer = self.config.weights.total_absolute();
        let score = if normalizer > 0.0 {
            (weighted / normalizer).clamp(0.0, 1.0)
        } else {
            weighted.clamp(0.0, 1.0)
        };

        let avg_confidence = signals.iter().map(|s| s.confidence).sum::<f32>() / signals.len() as f32;
        let confidence = (avg_confidence + assessment_confidence) / 2.0;

        (score, confidence)
    }

    /// Map a score to a level, applying the multi-signal guard.
    pub fn classify_level(&self, score: f32, signals: &[RiskSignal]) -> RiskLevel {
        let count = signals.len();
        let categories = distinct_categories(signals);

        if score >= self.config.critical_threshold {
            if count >= self.config.min_signals_for_critical && categories >= self.config.min_categories_for_critical {
                RiskLevel::Critical
            } else {
                RiskLevel::High
            }
        } else if score >= self.config.high_threshold {
            if count >= self.config.min_signals_for_high {
                RiskLevel::High
            } else {
                RiskLevel::Elevated
            }
        } else if score >= self.config.elevated_threshold {
            RiskLevel::Elevated
        } else {
            RiskLevel::Low
        }
    }

    /// Actions the caller should take at `level`.
    pub fn recommended_actions(&self, level: RiskLevel) -> Vec<EscalationAction> {
        EscalationAction::for_level(level)
    }
}

impl Default for RiskScoringEngine {
    fn default() -> Self {
        Self::new()
    }
}
