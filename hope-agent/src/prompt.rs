//! Recovery prompts for the post-panic generative feature.
//!
//! Prompts are fixed per [`RecoveryPromptType`] and always wrapped in
//! [`SAFETY_ENVELOPE`]. Each type has a static fallback used whenever
//! generation is denied, times out, fails, or produces unsafe output.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::backend::traits::CompletionRequest;

pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Output constraints attached to every recovery request.
pub const RECOVERY_CONSTRAINTS: [&str; 3] = ["Maximum 2 sentences", "No questions", "No advice"];

/// System text prepended to every recovery prompt.
pub const SAFETY_ENVELOPE: &str = "\
CONTEXT: The person you are with has just been through a panic attack.
They are early in recovery and may feel fragile.
Offer a gentle, steady presence.

RULES (no exceptions):
1. At most 2 sentences
2. Warm and supportive tone only
3. No clinical claims or diagnoses
4. No advice or suggestions
5. No questions
6. No absolute statements such as \"you will be fine\" or \"it's over\"
7. No urgency language
8. No predictions about the future
9. Validate what they went through
10. Acknowledge their effort

NEVER INCLUDE:
- Medical terminology
- Therapeutic techniques
- Exploration of trauma
- Deep emotional analysis
- Philosophy or storytelling
- Long explanations

Speak as a calm companion who is simply present.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPromptType {
    PostBreathing,
    PostGrounding,
    RecoveryEncouragement,
    SessionClosing,
}

impl RecoveryPromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostBreathing => "post_breathing",
            Self::PostGrounding => "post_grounding",
            Self::RecoveryEncouragement => "recovery_encouragement",
            Self::SessionClosing => "session_closing",
        }
    }

    pub fn all() -> [Self; 4] {
        [
            Self::PostBreathing,
            Self::PostGrounding,
            Self::RecoveryEncouragement,
            Self::SessionClosing,
        ]
    }

    /// Static text used instead of generated output.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            Self::PostBreathing => "Your breathing helped bring calm. You did good work.",
            Self::PostGrounding => "Connecting with your senses helped ground you. Well done.",
            Self::RecoveryEncouragement => "You're moving through this. That takes real strength.",
            Self::SessionClosing => "Thank you for letting me be here with you.",
        }
    }

    fn situation(&self) -> &'static str {
        match self {
            Self::PostBreathing => {
                "The user just finished slow, intentional breathing during panic recovery.\n\
                 Write a brief (1-2 sentence) acknowledgment of that effort.\n\
                 Focus on: their breathing, being present, their body settling."
            }
            Self::PostGrounding => {
                "The user just finished a grounding exercise and reconnected with their surroundings.\n\
                 Write a brief (1-2 sentence) acknowledgment of that effort.\n\
                 Focus on: their grounding work, being present, feeling connected."
            }
            Self::RecoveryEncouragement => {
                "The user is stabilizing after a panic episode and their intensity has eased.\n\
                 Write a brief (1-2 sentence) normalizing statement about recovery.\n\
                 Focus on: validating the experience, noticing progress."
            }
            Self::SessionClosing => {
                "The user is ending a panic support session after a difficult moment.\n\
                 Write a brief (1-2 sentence) gentle closing.\n\
                 Focus on: acknowledging their work, warm presence, no pressure."
            }
        }
    }
}

/// A fully bounded recovery prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPrompt {
    pub prompt_type: RecoveryPromptType,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl RecoveryPrompt {
    pub fn new(prompt_type: RecoveryPromptType) -> Self {
        Self {
            prompt_type,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Lower the token cap. Values above the default are ignored.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.min(DEFAULT_MAX_TOKENS);
        self
    }

    pub fn system_prompt(&self) -> &'static str {
        SAFETY_ENVELOPE
    }

    pub fn user_context(&self) -> &'static str {
        self.prompt_type.situation()
    }

    pub fn fallback_text(&self) -> &'static str {
        self.prompt_type.fallback_text()
    }

    /// The request handed to a backend.
    pub fn to_request(&self) -> CompletionRequest {
        RECOVERY_CONSTRAINTS.iter().fold(
            CompletionRequest::user(self.user_context())
                .with_system(self.system_prompt())
                .with_max_tokens(self.max_tokens)
                .with_temperature(self.temperature),
            |request, constraint| request.with_constraint(*constraint),
        )
    }
}
