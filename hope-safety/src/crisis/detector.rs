//! Assessment-based crisis signal detection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use clinical::{ClinicalAssessment, EmotionCategory, PanicSeverity};

use crate::config::CrisisConfig;
use crate::types::{distinct_categories, RiskSignal, SignalCategory, SignalSource};

const SEVERE_DREAD_WEIGHT: f32 = 0.25;
const DISSOCIATION_WEIGHT: f32 = 0.20;
const SEVERE_HELPLESSNESS_WEIGHT: f32 = 0.25;
const EMOTIONAL_SHUTDOWN_WEIGHT: f32 = 0.20;
const EMOTIONAL_SHUTDOWN_CONFIDENCE: f32 = 0.7;
const CRITICAL_SEVERITY_WEIGHT: f32 = 0.30;
const EXTREME_DISTRESS_WEIGHT: f32 = 0.25;
const MULTI_DOMAIN_WEIGHT: f32 = 0.15;
const MULTI_DOMAIN_CONFIDENCE: f32 = 0.8;
const CRISIS_FLAG_WEIGHT: f32 = 0.35;

/// Result of crisis detection for one assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisDetectionResult {
    pub signals: Vec<RiskSignal>,
    /// `min(1, Σ weight·confidence)`
    pub combined_score: f32,
    /// At least the configured minimum number of signals
    pub has_crisis_signals: bool,
    /// Signals span at least the configured number of distinct categories
    pub meets_multi_signal_requirement: bool,
}

impl CrisisDetectionResult {
    fn from_signals(signals: Vec<RiskSignal>, config: &CrisisConfig) -> Self {
        let combined_score = signals.iter().map(RiskSignal::contribution).sum::<f32>().min(1.0);
        let has_crisis_signals = signals.len() >= config.min_signals;
        let meets_multi_signal_requirement = distinct_categories(&signals) >= config.min_categories;
        Self {
            signals,
            combined_score,
            has_crisis_signals,
            meets_multi_signal_requirement,
        }
    }

    pub fn empty() -> Self {
        Self {
            signals: Vec::new(),
            combined_score: 0.0,
            has_crisis_signals: false,
            meets_multi_signal_requirement: false,
        }
    }

    /// Enough signals across enough categories to act on.
    pub fn is_actionable(&self) -> bool {
        self.has_crisis_signals && self.meets_multi_signal_requirement
    }

    /// Signals in the form merged into a risk assessment.
    pub fn to_risk_signals(&self) -> Vec<RiskSignal> {
        self.signals
            .iter()
            .cloned()
            .map(|mut signal| {
                signal.source = SignalSource::CrisisDetector;
                signal
            })
            .collect()
    }
}

/// Detects crisis signals in a clinical assessment.
///
/// Never reads raw text.
#[derive(Debug, Clone, Default)]
pub struct CrisisDetector {
    config: CrisisConfig,
}

impl CrisisDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CrisisConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, assessment: &ClinicalAssessment) -> CrisisDetectionResult {
        let mut signals = self.emotional_signals(assessment);
        signals.extend(self.behavioral_signals(assessment));

        let result = CrisisDetectionResult::from_signals(signals, &self.config);
        debug!(
            assessment_id = %assessment.assessment_id,
            signals = result.signals.len(),
            combined = result.combined_score,
            multi_signal = result.meets_multi_signal_requirement,
            "Crisis detection complete"
        );
        result
    }

    fn emotional_signals(&self, assessment: &ClinicalAssessment) -> Vec<RiskSignal> {
        let profile = &assessment.emotion_profile;
        let mut signals = Vec::new();

        let thresholds = [
            (EmotionCategory::Dread, self.config.dread_threshold, "severe_dread", SEVERE_DREAD_WEIGHT),
            (
                EmotionCategory::Dissociation,
                self.config.dissociation_threshold,
                "dissociation",
                DISSOCIATION_WEIGHT,
            ),
            (
                EmotionCategory::Helplessness,
                self.config.helplessness_threshold,
                "severe_helplessness",
                SEVERE_HELPLESSNESS_WEIGHT,
            ),
        ];

        for (category, threshold, name, weight) in thresholds {
            let confidence = profile.confidence_for(category);
            if confidence > threshold {
                signals.push(RiskSignal::new(
                    SignalCategory::Emotional,
                    name,
                    format!("{} above {}", category.as_str(), threshold),
                    weight,
                    confidence,
                    SignalSource::CrisisDetector,
                ));
            }
        }

        // Severe distress with no readable emotion
        if assessment.predicted_severity() >= PanicSeverity::Severe && profile.is_empty() {
            signals.push(RiskSignal::new(
                SignalCategory::Emotional,
                "emotional_shutdown",
                "Severe presentation with no detectable emotion",
                EMOTIONAL_SHUTDOWN_WEIGHT,
                EMOTIONAL_SHUTDOWN_CONFIDENCE,
                SignalSource::CrisisDetector,
            ));
        }

        signals
    }

    fn behavioral_signals(&self, assessment: &ClinicalAssessment) -> Vec<RiskSignal> {
        let mut signals = Vec::new();

        if assessment.predicted_severity() >= PanicSeverity::Critical {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                "critical_severity",
                "Severity classified as CRITICAL",
                CRITICAL_SEVERITY_WEIGHT,
                assessment.severity.confidence,
                SignalSource::CrisisDetector,
            ));
        }

        let distress = &assessment.distress_indicators;
        if distress.overall_distress_level > self.config.extreme_distress_threshold {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                "extreme_distress",
                "Aggregate distress is extreme",
                EXTREME_DISTRESS_WEIGHT,
                distress.overall_distress_level,
                SignalSource::CrisisDetector,
            ));
        }

        if distress.indicator_count() >= self.config.multi_domain_indicator_count {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                "multi_domain_distress",
                format!("{} distress indicators present", distress.indicator_count()),
                MULTI_DOMAIN_WEIGHT,
                MULTI_DOMAIN_CONFIDENCE,
                SignalSource::CrisisDetector,
            ));
        }

        if assessment.requires_crisis_protocol {
            signals.push(RiskSignal::new(
                SignalCategory::Behavioral,
                "crisis_protocol_flag",
                "Clinical assessment requires the crisis protocol",
                CRISIS_FLAG_WEIGHT,
                1.0,
                SignalSource::CrisisDetector,
            ));
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinical::{
        DistressIndicator, DistressIndicators, DistressType, EmotionProfile, EmotionScore, SeverityClassification,
    };

    fn assessment(severity: PanicSeverity) -> clinical::AssessmentBuilder {
        ClinicalAssessment::builder(SeverityClassification::point(severity, 0.9)).confidence(0.9)
    }

    #[test]
    fn test_calm_assessment_has_no_signals() {
        let result = CrisisDetector::new().detect(&assessment(PanicSeverity::Mild).build());
        assert!(result.signals.is_empty());
        assert_eq!(result.combined_score, 0.0);
        assert!(!result.is_actionable());
    }

    #[test]
    fn test_single_category_never_meets_requirement() {
        let detector = CrisisDetector::new();
        let result = detector.detect(&assessment(PanicSeverity::Moderate).crisis_protocol(true).build());

        assert_eq!(result.signals.len(), 1);
        assert_eq!(result.signals[0].name, "crisis_protocol_flag");
        assert!(!result.meets_multi_signal_requirement);
        assert!(!result.has_crisis_signals);

        // Several behavioral signals with a high combined score are still one category
        let mut indicators = DistressIndicators::with_level(0.95);
        for _ in 0..4 {
            indicators.push(DistressIndicator::new(DistressType::Physiological, "racing_heart", 0.9));
        }
        let result = detector.detect(
            &assessment(PanicSeverity::Moderate)
                .crisis_protocol(true)
                .distress(indicators)
                .build(),
        );
        assert_eq!(result.signals.len(), 3);
        assert!(result.combined_score > 0.6);
        assert!(result.has_crisis_signals);
        assert!(!result.meets_multi_signal_requirement);
        assert!(!result.is_actionable());
    }

    #[test]
    fn test_emotional_and_behavioral_signals_are_actionable() {
        let result = CrisisDetector::new().detect(
            &assessment(PanicSeverity::Severe)
                .emotions(EmotionProfile::new(
                    vec![
                        EmotionScore::new(EmotionCategory::Dread, 0.8),
                        EmotionScore::new(EmotionCategory::Helplessness, 0.75),
                    ],
                    0.3,
                ))
                .distress(DistressIndicators::with_level(0.9))
                .build(),
        );

        let names: Vec<&str> = result.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["severe_dread", "severe_helplessness", "extreme_distress"]);
        assert!(result.meets_multi_signal_requirement);
        assert!(result.is_actionable());
    }

    #[test]
    fn test_severe_without_emotions_is_shutdown() {
        let result = CrisisDetector::new().detect(&assessment(PanicSeverity::Severe).build());
        assert_eq!(result.signals.len(), 1);
        assert_eq!(result.signals[0].name, "emotional_shutdown");
        assert_eq!(result.signals[0].category, SignalCategory::Emotional);
    }

    #[test]
    fn test_critical_severity_signals() {
        let result = CrisisDetector::new().detect(&assessment(PanicSeverity::Critical).build());
        let names: Vec<&str> = result.signals.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"critical_severity"));
        assert!(names.contains(&"crisis_protocol_flag"));
        assert!(result.is_actionable());
    }

    #[test]
    fn test_combined_score_is_capped() {
        let mut indicators = DistressIndicators::with_level(1.0);
        for _ in 0..5 {
            indicators.push(DistressIndicator::new(DistressType::Cognitive, "catastrophizing", 1.0));
        }
        let result = CrisisDetector::new().detect(
            &ClinicalAssessment::builder(SeverityClassification::point(PanicSeverity::Critical, 1.0))
                .confidence(1.0)
                .emotions(EmotionProfile::new(
                    vec![
                        EmotionScore::new(EmotionCategory::Dread, 1.0),
                        EmotionScore::new(EmotionCategory::Dissociation, 1.0),
                        EmotionScore::new(EmotionCategory::Helplessness, 1.0),
                    ],
                    0.0,
                ))
                .distress(indicators)
                .build(),
        );
        assert_eq!(result.combined_score, 1.0);
    }

    #[test]
    fn test_to_risk_signals_marks_source() {
        let result = CrisisDetector::new().detect(&assessment(PanicSeverity::Critical).build());
        assert!(result
            .to_risk_signals()
            .iter()
            .all(|s| s.source == SignalSource::CrisisDetector));
    }
}
