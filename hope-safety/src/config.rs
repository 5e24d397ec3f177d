//! Configuration for the safety core.
//!
//! Every threshold here is a clinical parameter awaiting expert sign-off;
//! the defaults reproduce the reviewed baseline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub crisis: CrisisConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl SafetyConfig {
    /// Load config from YAML text.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Load config from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&text)?)
    }
}

/// Risk scoring configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub critical_threshold: f32,
    pub high_threshold: f32,
    pub elevated_threshold: f32,
    /// Signals needed before a CRITICAL score is honored
    pub min_signals_for_critical: usize,
    /// Distinct categories needed before a CRITICAL score is honored
    pub min_categories_for_critical: usize,
    pub min_signals_for_high: usize,
    /// Below this combined confidence the assessment is flagged uncertain
    pub low_confidence_threshold: f32,
    /// Uncertain LOW results above this raw score are raised to ELEVATED
    pub uncertainty_bump_score: f32,
    /// Emotion confidence needed to emit an emotion signal
    pub emotion_confidence_floor: f32,
    pub volatility_threshold: f32,
    pub distress_threshold: f32,
    pub weights: SignalWeights,
    pub history: HistoryConfig,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            critical_threshold: 0.85,
            high_threshold: 0.65,
            elevated_threshold: 0.40,
            min_signals_for_critical: 3,
            min_categories_for_critical: 2,
            min_signals_for_high: 2,
            low_confidence_threshold: 0.5,
            uncertainty_bump_score: 0.3,
            emotion_confidence_floor: 0.5,
            volatility_threshold: 0.7,
            distress_threshold: 0.7,
            weights: SignalWeights::default(),
            history: HistoryConfig::default(),
        }
    }
}

/// Weight table for risk signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub severity_critical: f32,
    pub severity_severe: f32,
    pub severity_moderate: f32,
    pub emotion_dread: f32,
    pub emotion_dissociation: f32,
    pub emotion_helplessness: f32,
    pub emotion_loss_of_control: f32,
    pub high_distress: f32,
    pub crisis_protocol_active: f32,
    pub high_volatility: f32,
    pub uncertainty: f32,
}

impl SignalWeights {
    /// Sum of absolute weights in the table; the score normalizer.
    pub fn total_absolute(&self) -> f32 {
        [
            self.severity_critical,
            self.severity_severe,
            self.severity_moderate,
            self.emotion_dread,
            self.emotion_dissociation,
            self.emotion_helplessness,
            self.emotion_loss_of_control,
            self.high_distress,
            self.crisis_protocol_active,
            self.high_volatility,
            self.uncertainty,
        ]
        .iter()
        .map(|w| w.abs())
        .sum()
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            severity_critical: 0.35,
            severity_severe: 0.25,
            severity_moderate: 0.15,
            emotion_dread: 0.20,
            emotion_dissociation: 0.25,
            emotion_helplessness: 0.15,
            emotion_loss_of_control: 0.20,
            high_distress: 0.20,
            crisis_protocol_active: 0.40,
            high_volatility: 0.15,
            uncertainty: -0.05,
        }
    }
}

/// Sustained-risk detection over session history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Consecutive recent messages that must all exceed `score_threshold`
    pub window: usize,
    pub score_threshold: f32,
    pub weight: f32,
    pub confidence: f32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: 3,
            score_threshold: 0.4,
            weight: 0.15,
            confidence: 0.8,
        }
    }
}

/// Crisis detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrisisConfig {
    pub dread_threshold: f32,
    pub dissociation_threshold: f32,
    pub helplessness_threshold: f32,
    pub extreme_distress_threshold: f32,
    /// Indicator count that counts as multi-domain distress
    pub multi_domain_indicator_count: usize,
    pub min_signals: usize,
    pub min_categories: usize,
}

impl Default for CrisisConfig {
    fn default() -> Self {
        Self {
            dread_threshold: 0.7,
            dissociation_threshold: 0.6,
            helplessness_threshold: 0.7,
            extreme_distress_threshold: 0.8,
            multi_domain_indicator_count: 4,
            min_signals: 2,
            min_categories: 2,
        }
    }
}

/// Escalation and resource configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Jurisdiction used when the caller does not supply one
    pub default_country: String,
    /// JSON file with jurisdiction resources, merged over the built-in table
    pub resources_path: Option<String>,
    /// Resources listed in a crisis message
    pub max_resources_in_message: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            default_country: "US".to_string(),
            resources_path: None,
            max_resources_in_message: 3,
        }
    }
}

/// Response validator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Soft-filter matches block like hard constraints
    pub strict_mode: bool,
}

/// Stability state machine thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Episodes younger than this are always ACTIVE
    pub min_active_seconds: i64,
    /// Minimum episode age for RECOVERED
    pub recovery_seconds: i64,
    pub min_breathing_cycles: u32,
    pub min_grounding_steps: u32,
    /// Intensity drop from the first sample required for RECOVERED
    pub recovery_intensity_drop: f32,
    /// Samples used for trend calculation
    pub trend_window: usize,
    /// Samples retained per history
    pub max_history: usize,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            min_active_seconds: 60,
            recovery_seconds: 180,
            min_breathing_cycles: 3,
            min_grounding_steps: 3,
            recovery_intensity_drop: 0.2,
            trend_window: 3,
            max_history: 20,
        }
    }
}

/// Activation gate and generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Initial kill-switch position (false = disabled)
    pub enabled: bool,
    /// Per-session failures before the breaker opens
    pub error_threshold: u32,
    /// Hard timeout for the generative call (ms)
    pub generation_timeout_ms: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            error_threshold: 3,
            generation_timeout_ms: 2000,
        }
    }
}

/// Human review queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub max_pending: usize,
    /// Pending tickets older than this expire (seconds)
    pub timeout_secs: u64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_pending: 500,
            timeout_secs: 86_400, // 24 hours
        }
    }
}

/// Session memory configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Risk scores remembered per session for trend detection
    pub risk_history_len: usize,
    /// Escalation events kept per session, oldest dropped first
    pub max_events: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            risk_history_len: 10,
            max_events: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weight_total() {
        let total = SignalWeights::default().total_absolute();
        assert!((total - 2.35).abs() < 1e-4);
    }

    #[test]
    fn test_yaml_round_trip_preserves_thresholds() {
        let config = SafetyConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = SafetyConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.risk.critical_threshold, 0.85);
        assert_eq!(parsed.activation.error_threshold, 3);
        assert_eq!(parsed.escalation.default_country, "US");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
risk:
  critical_threshold: 0.9
activation:
  enabled: false
"#;
        let config = SafetyConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.risk.critical_threshold, 0.9);
        assert_eq!(config.risk.high_threshold, 0.65);
        assert!(!config.activation.enabled);
        assert_eq!(config.activation.generation_timeout_ms, 2000);
        assert_eq!(config.stability.min_active_seconds, 60);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safety.yaml");
        std::fs::write(&path, "escalation:\n  default_country: GB\n").unwrap();
        let config = SafetyConfig::from_file(&path).unwrap();
        assert_eq!(config.escalation.default_country, "GB");
        assert!(SafetyConfig::from_file(dir.path().join("missing.yaml")).is_err());
    }
}
