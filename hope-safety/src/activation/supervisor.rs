//! Supervised recovery-message generation.
//!
//! Every path ends in a deliverable message: generation is attempted only
//! when the [`ActivationGate`] allows it, runs under a hard timeout, and is
//! shaped and validated before use. Anything else returns the prompt type's
//! static fallback.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use hope_agent::{RecoveryPrompt, RecoveryPromptType, TextBackend};

use crate::activation::gate::{ActivationGate, DenialReason};
use crate::audit::session_ref;
use crate::config::ActivationConfig;
use crate::stability::StabilityContext;
use crate::validator::SafetyValidator;

const MAX_SENTENCES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    Generated,
    Fallback,
}

/// How a generation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationOutcome {
    Generated,
    Denied(DenialReason),
    Unavailable,
    PromptRejected,
    TimedOut,
    Failed(String),
    /// Output was empty after shaping
    Empty,
    /// Output failed response validation
    Blocked,
}

impl GenerationOutcome {
    /// Outcomes counted against the session's circuit breaker.
    pub fn counts_as_error(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Failed(_) | Self::Blocked)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMessage {
    pub text: String,
    pub source: MessageSource,
    pub latency_ms: u64,
    pub prompt_type: RecoveryPromptType,
    pub outcome: GenerationOutcome,
}

/// Runs the generative backend behind the activation gate.
pub struct RecoverySupervisor {
    backend: Option<Arc<dyn TextBackend>>,
    gate: Arc<ActivationGate>,
    validator: SafetyValidator,
    timeout: Duration,
}

impl RecoverySupervisor {
    pub fn new(backend: Option<Arc<dyn TextBackend>>, gate: Arc<ActivationGate>) -> Self {
        Self {
            backend,
            gate,
            validator: SafetyValidator::new(),
            timeout: Duration::from_millis(ActivationConfig::default().generation_timeout_ms),
        }
    }

    pub fn with_config(mut self, config: &ActivationConfig) -> Self {
        self.timeout = Duration::from_millis(config.generation_timeout_ms);
        self
    }

    pub fn with_validator(mut self, validator: SafetyValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    /// Produce a recovery message for the session. Never fails.
    pub async fn generate(&self, prompt_type: RecoveryPromptType, context: &StabilityContext) -> RecoveryMessage {
        let started = Instant::now();
        let session = session_ref(&context.session_id);

        let decision = self.gate.check(context, None);
        if let Some(reason) = decision.denial_reason {
            debug!(session = %session, reason = %reason, "Recovery generation denied");
            return self.fallback(prompt_type, started, GenerationOutcome::Denied(reason));
        }

        let Some(backend) = self.backend.as_ref() else {
            return self.fallback(prompt_type, started, GenerationOutcome::Unavailable);
        };
        if !backend.is_available().await {
            warn!(backend = backend.id(), "Text backend unavailable, using fallback");
            return self.fallback(prompt_type, started, GenerationOutcome::Unavailable);
        }

        let request = RecoveryPrompt::new(prompt_type).to_request();
        if !request.outbound_text().all(|text| self.validator.validate_prompt(text)) {
            return self.fallback(prompt_type, started, GenerationOutcome::PromptRejected);
        }

        let outcome = match timeout(self.timeout, backend.complete(request)).await {
            Err(_) => {
                warn!(
                    session = %session,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Recovery generation timed out, using fallback"
                );
                GenerationOutcome::TimedOut
            }
            Ok(Err(e)) => {
                warn!(session = %session, error = %e, "Recovery generation failed, using fallback");
                GenerationOutcome::Failed(e.to_string())
            }
            Ok(Ok(response)) => match shape_output(&response.content) {
                None => GenerationOutcome::Empty,
                Some(shaped) => {
                    let result = self.validator.validate(&shaped, false);
                    if result.blocked {
                        GenerationOutcome::Blocked
                    } else {
                        let latency_ms = started.elapsed().as_millis() as u64;
                        info!(
                            prompt_type = prompt_type.as_str(),
                            latency_ms,
                            "Recovery message generated"
                        );
                        return RecoveryMessage {
                            text: result.filtered_response,
                            source: MessageSource::Generated,
                            latency_ms,
                            prompt_type,
                            outcome: GenerationOutcome::Generated,
                        };
                    }
                }
            },
        };

        if outcome.counts_as_error() {
            self.gate.record_error(context.session_id);
        }
        self.fallback(prompt_type, started, outcome)
    }

    fn fallback(&self, prompt_type: RecoveryPromptType, started: Instant, outcome: GenerationOutcome) -> RecoveryMessage {
        RecoveryMessage {
            text: prompt_type.fallback_text().to_string(),
            source: MessageSource::Fallback,
            latency_ms: started.elapsed().as_millis() as u64,
            prompt_type,
            outcome,
        }
    }
}

/// At most two sentences, questions turned into statements.
fn shape_output(text: &str) -> Option<String> {
    let text = text.trim().replace('?', ".");
    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!') {
            let sentence = current.trim();
            if sentence.chars().any(char::is_alphanumeric) {
                sentences.push(sentence.to_string());
            }
            current.clear();
            if sentences.len() == MAX_SENTENCES {
                break;
            }
        }
    }

    let rest = current.trim();
    if sentences.len() < MAX_SENTENCES && rest.chars().any(char::is_alphanumeric) {
        sentences.push(format!("{}.", rest));
    }

    if sentences.is_empty() {
        None
    } else {
        Some(sentences.join(" "))
    }
}
