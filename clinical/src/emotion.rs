//! Emotion profile produced by the multi-label emotion classifier.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::clamp_unit;

/// Emotion categories relevant to panic episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EmotionCategory {
    Fear,
    /// Sense of impending doom
    Dread,
    LossOfControl,
    /// Depersonalization or derealization
    Dissociation,
    Helplessness,
    Hypervigilance,
    Shame,
    Confusion,
}

impl EmotionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fear => "fear",
            Self::Dread => "dread",
            Self::LossOfControl => "loss_of_control",
            Self::Dissociation => "dissociation",
            Self::Helplessness => "helplessness",
            Self::Hypervigilance => "hypervigilance",
            Self::Shame => "shame",
            Self::Confusion => "confusion",
        }
    }
}

/// Score for a single emotion category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EmotionScore {
    pub category: EmotionCategory,
    /// Classifier confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Expressed intensity (0.0 - 1.0)
    pub intensity: f32,
    #[serde(default)]
    pub is_primary: bool,
}

impl EmotionScore {
    pub fn new(category: EmotionCategory, confidence: f32) -> Self {
        Self {
            category,
            confidence,
            intensity: confidence,
            is_primary: false,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Complete emotion profile for a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EmotionProfile {
    pub emotions: Vec<EmotionScore>,
    /// Highest-confidence emotion; derived when the producer leaves it unset
    #[serde(default)]
    pub dominant_emotion: Option<EmotionCategory>,
    /// How much the emotional state is swinging between messages (0.0 - 1.0)
    #[serde(default)]
    pub emotional_volatility: f32,
}

impl EmotionProfile {
    /// Build a profile, deriving the dominant emotion from the scores.
    pub fn new(emotions: Vec<EmotionScore>, emotional_volatility: f32) -> Self {
        let mut profile = Self {
            emotions,
            dominant_emotion: None,
            emotional_volatility,
        };
        profile.dominant_emotion = profile.derive_dominant();
        profile
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0)
    }

    /// Highest confidence recorded for `category`, if present.
    pub fn score_for(&self, category: EmotionCategory) -> Option<&EmotionScore> {
        self.emotions
            .iter()
            .filter(|e| e.category == category)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Confidence for `category`, zero when absent.
    pub fn confidence_for(&self, category: EmotionCategory) -> f32 {
        self.score_for(category).map(|e| e.confidence).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.emotions.is_empty()
    }

    fn derive_dominant(&self) -> Option<EmotionCategory> {
        let mut best: Option<&EmotionScore> = None;
        for score in &self.emotions {
            if best.map_or(true, |b| score.confidence > b.confidence) {
                best = Some(score);
            }
        }
        best.map(|s| s.category)
    }

    /// Clamp scores and fill in a missing dominant emotion.
    pub(crate) fn sanitize(&mut self) {
        for score in &mut self.emotions {
            score.confidence = clamp_unit(score.confidence, 1.0);
            score.intensity = clamp_unit(score.intensity, 1.0);
        }
        self.emotional_volatility = clamp_unit(self.emotional_volatility, 1.0);
        if self.dominant_emotion.is_none() {
            self.dominant_emotion = self.derive_dominant();
        }
    }
}

impl Default for EmotionProfile {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dominant_is_highest_confidence() {
        let profile = EmotionProfile::new(
            vec![
                EmotionScore::new(EmotionCategory::Fear, 0.6),
                EmotionScore::new(EmotionCategory::Dread, 0.8),
                EmotionScore::new(EmotionCategory::Shame, 0.3),
            ],
            0.2,
        );
        assert_eq!(profile.dominant_emotion, Some(EmotionCategory::Dread));
    }

    #[test]
    fn test_empty_profile_has_no_dominant() {
        assert_eq!(EmotionProfile::empty().dominant_emotion, None);
    }

    #[test]
    fn test_confidence_for_missing_category() {
        let profile = EmotionProfile::new(vec![EmotionScore::new(EmotionCategory::Fear, 0.6)], 0.0);
        assert_eq!(profile.confidence_for(EmotionCategory::Dissociation), 0.0);
        assert_eq!(profile.confidence_for(EmotionCategory::Fear), 0.6);
    }

    #[test]
    fn test_sanitize_clamps_and_derives() {
        let mut profile = EmotionProfile {
            emotions: vec![EmotionScore::new(EmotionCategory::Helplessness, 1.4)],
            dominant_emotion: None,
            emotional_volatility: f32::NAN,
        };
        profile.sanitize();
        assert_eq!(profile.emotions[0].confidence, 1.0);
        assert_eq!(profile.emotional_volatility, 1.0);
        assert_eq!(profile.dominant_emotion, Some(EmotionCategory::Helplessness));
    }
}
