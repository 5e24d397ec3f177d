//! Core types shared across the safety core.

use serde::{Deserialize, Serialize};
use std::fmt;

use clinical::clamp_unit;

/// Ordered risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Normal support
    Low = 1,
    /// Monitor closely
    Elevated = 2,
    /// Present resources
    High = 3,
    /// Crisis resources immediately
    Critical = 4,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Elevated => "ELEVATED",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn all() -> [Self; 4] {
        [Self::Low, Self::Elevated, Self::High, Self::Critical]
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of evidence a signal comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Linguistic,
    Emotional,
    Behavioral,
    Historical,
    Contextual,
}

impl SignalCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linguistic => "linguistic",
            Self::Emotional => "emotional",
            Self::Behavioral => "behavioral",
            Self::Historical => "historical",
            Self::Contextual => "contextual",
        }
    }
}

/// Component that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    SeverityClassifier,
    EmotionClassifier,
    DistressIndicators,
    ClinicalAssessment,
    SessionHistory,
    CrisisDetector,
    LinguisticAnalyzer,
}

/// A single weighted, categorized piece of risk evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub category: SignalCategory,
    pub name: String,
    pub description: String,
    pub weight: f32,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub source: SignalSource,
}

impl RiskSignal {
    pub fn new(
        category: SignalCategory,
        name: impl Into<String>,
        description: impl Into<String>,
        weight: f32,
        confidence: f32,
        source: SignalSource,
    ) -> Self {
        Self {
            category,
            name: name.into(),
            description: description.into(),
            weight,
            confidence: clamp_unit(confidence, 1.0),
            source,
        }
    }

    /// `weight * confidence`
    pub fn contribution(&self) -> f32 {
        self.weight * self.confidence
    }
}

/// Number of distinct categories present in `signals`.
pub fn distinct_categories(signals: &[RiskSignal]) -> usize {
    let mut categories: Vec<SignalCategory> = signals.iter().map(|s| s.category).collect();
    categories.sort();
    categories.dedup();
    categories.len()
}

/// Escalation actions tied to a risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    ContinueSupport,
    EncourageHelp,
    PresentResources,
    LogForReview,
}

impl EscalationAction {
    /// Fixed action set for a level.
    pub fn for_level(level: RiskLevel) -> Vec<Self> {
        match level {
            RiskLevel::Low => vec![Self::ContinueSupport],
            RiskLevel::Elevated => vec![Self::ContinueSupport, Self::LogForReview],
            RiskLevel::High => vec![Self::EncourageHelp, Self::PresentResources, Self::LogForReview],
            RiskLevel::Critical => vec![Self::PresentResources, Self::EncourageHelp, Self::LogForReview],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContinueSupport => "continue_support",
            Self::EncourageHelp => "encourage_help",
            Self::PresentResources => "present_resources",
            Self::LogForReview => "log_for_review",
        }
    }
}

/// Tone for a generated or composed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseTone {
    /// Friendly, supportive
    Warm,
    /// Steady, grounding
    Calm,
    /// Clear, action-oriented
    Direct,
}

impl ResponseTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warm => "warm",
            Self::Calm => "calm",
            Self::Direct => "direct",
        }
    }
}

/// Error types for the safety core.
///
/// Policy violations and collaborator failures are never errors; they are
/// expressed in result types. These cover configuration and lookups only.
#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Assessment contract violated: {0}")]
    Contract(#[from] clinical::ContractError),

    #[error("Review ticket {0} not found")]
    ReviewNotFound(String),
}

pub type Result<T> = std::result::Result<T, SafetyError>;
