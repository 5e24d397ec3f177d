//! Activation gate for the generative recovery feature.
//!
//! Fail-closed: every check must pass, the first failure wins and is
//! reported. Checks run in this order:
//!
//! 1. kill-switch
//! 2. per-session circuit breaker
//! 3. crisis / self-harm signals
//! 4. minimum elapsed time
//! 5. regulation exercise completed
//! 6. stability state at least `PANIC_STABILIZING`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{session_ref, ActivationAudit};
use crate::config::{ActivationConfig, StabilityConfig};
use crate::session::SessionStore;
use crate::stability::{StabilityContext, StabilityEvaluation, StabilityGate, StabilityState};

/// Lowest stability state at which generation may run.
pub const MIN_STABILITY_STATE: StabilityState = StabilityState::PanicStabilizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    FeatureDisabled,
    ErrorThresholdExceeded,
    CrisisSignals,
    TimeThresholdNotMet,
    NoExerciseCompleted,
    StabilityTooLow,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeatureDisabled => "FEATURE_DISABLED",
            Self::ErrorThresholdExceeded => "ERROR_THRESHOLD_EXCEEDED",
            Self::CrisisSignals => "CRISIS_SIGNALS",
            Self::TimeThresholdNotMet => "TIME_THRESHOLD_NOT_MET",
            Self::NoExerciseCompleted => "NO_EXERCISE_COMPLETED",
            Self::StabilityTooLow => "STABILITY_TOO_LOW",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationDecision {
    pub allowed: bool,
    pub reason: String,
    pub denial_reason: Option<DenialReason>,
    pub stability_state: Option<StabilityState>,
    pub timestamp: DateTime<Utc>,
}

impl ActivationDecision {
    fn allow(state: StabilityState, timestamp: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            reason: format!("All conditions met (state: {})", state),
            denial_reason: None,
            stability_state: Some(state),
            timestamp,
        }
    }

    fn deny(
        denial_reason: DenialReason,
        reason: impl Into<String>,
        stability_state: Option<StabilityState>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            denial_reason: Some(denial_reason),
            stability_state,
            timestamp,
        }
    }

    /// Audit record with no identifying fields.
    pub fn to_audit_log(&self) -> ActivationAudit {
        ActivationAudit {
            session_ref: None,
            allowed: self.allowed,
            reason: self.reason.clone(),
            denial_reason: self.denial_reason,
            stability_state: self.stability_state,
            timestamp: self.timestamp,
        }
    }
}

/// Final yes/no gate for the generative recovery feature.
#[derive(Debug)]
pub struct ActivationGate {
    enabled: AtomicBool,
    error_threshold: u32,
    errors: SessionStore<u32>,
    stability: StabilityGate,
}

impl ActivationGate {
    pub fn new() -> Self {
        Self::with_config(&ActivationConfig::default(), StabilityConfig::default())
    }

    pub fn with_config(config: &ActivationConfig, stability: StabilityConfig) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            error_threshold: config.error_threshold,
            errors: SessionStore::new(),
            stability: StabilityGate::with_config(stability),
        }
    }

    pub fn stability_gate(&self) -> &StabilityGate {
        &self.stability
    }

    pub fn check(&self, context: &StabilityContext, evaluation: Option<&StabilityEvaluation>) -> ActivationDecision {
        self.check_at(context, evaluation, Utc::now())
    }

    pub fn check_at(
        &self,
        context: &StabilityContext,
        evaluation: Option<&StabilityEvaluation>,
        now: DateTime<Utc>,
    ) -> ActivationDecision {
        if !self.is_enabled() {
            return ActivationDecision::deny(
                DenialReason::FeatureDisabled,
                "Recovery generation disabled via kill-switch",
                None,
                now,
            );
        }

        let errors = self.error_count(&context.session_id);
        if errors >= self.error_threshold {
            return ActivationDecision::deny(
                DenialReason::ErrorThresholdExceeded,
                format!("Error threshold ({}) exceeded for session", self.error_threshold),
                None,
                now,
            );
        }

        if context.has_any_crisis_signal() {
            return ActivationDecision::deny(
                DenialReason::CrisisSignals,
                "Crisis or self-harm signals detected",
                None,
                now,
            );
        }

        let elapsed = context.elapsed_seconds(now);
        let min_seconds = self.stability.config().min_active_seconds as f64;
        if elapsed < min_seconds {
            return ActivationDecision::deny(
                DenialReason::TimeThresholdNotMet,
                format!("Time threshold not met ({:.0}s < {:.0}s)", elapsed, min_seconds),
                None,
                now,
            );
        }

        if !context.exercise_completed(self.stability.config()) {
            return ActivationDecision::deny(
                DenialReason::NoExerciseCompleted,
                "No regulation exercise completed",
                None,
                now,
            );
        }

        let state = match evaluation {
            Some(evaluation) => evaluation.state,
            None => self.stability.evaluate_at(context, now).state,
        };

        if state < MIN_STABILITY_STATE {
            return ActivationDecision::deny(
                DenialReason::StabilityTooLow,
                format!("Stability state {} < required {}", state, MIN_STABILITY_STATE),
                Some(state),
                now,
            );
        }

        info!(
            session = %session_ref(&context.session_id),
            stability_state = %state,
            elapsed_seconds = elapsed,
            "Recovery generation allowed"
        );

        ActivationDecision::allow(state, now)
    }

    /// Count a generation failure against the session's breaker.
    pub fn record_error(&self, session_id: Uuid) -> u32 {
        let count = self.errors.update(session_id, |count| {
            *count = count.saturating_add(1);
            *count
        });
        warn!(session = %session_ref(&session_id), count, "Recovery generation error recorded");
        if count == self.error_threshold {
            warn!(session = %session_ref(&session_id), "Circuit breaker open for session");
        }
        count
    }

    pub fn error_count(&self, session_id: &Uuid) -> u32 {
        self.errors.get(session_id).unwrap_or(0)
    }

    /// Reset the breaker at session end.
    pub fn clear_session(&self, session_id: &Uuid) {
        self.errors.close(session_id);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        warn!("Recovery generation DISABLED via kill-switch");
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        warn!("Recovery generation RE-ENABLED via kill-switch");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use clinical::PanicSeverity;

    fn ready_context(now: DateTime<Utc>, elapsed: i64) -> StabilityContext {
        let mut context = StabilityContext::new(
            Uuid::new_v4(),
            now - Duration::seconds(elapsed),
            PanicSeverity::Moderate,
            0.6,
        );
        context.record_sample(PanicSeverity::Mild, 0.4);
        context
    }

    #[test]
    fn test_elapsed_threshold() {
        let gate = ActivationGate::new();
        let now = Utc::now();

        let mut early = ready_context(now, 30);
        early.record_breathing_cycles(3);
        let decision = gate.check_at(&early, None, now);
        assert!(!decision.allowed);
        assert_eq!(decision.denial_reason, Some(DenialReason::TimeThresholdNotMet));

        let mut later = ready_context(now, 120);
        later.record_breathing_cycles(3);
        let decision = gate.check_at(&later, None, now);
        assert!(decision.allowed);
        assert!(decision.denial_reason.is_none());
        assert_eq!(decision.stability_state, Some(StabilityState::PanicStabilizing));
    }

    #[test]
    fn test_kill_switch_wins() {
        let gate = ActivationGate::new();
        let now = Utc::now();
        let mut context = ready_context(now, 120);
        context.flag_crisis();

        gate.disable();
        assert_eq!(
            gate.check_at(&context, None, now).denial_reason,
            Some(DenialReason::FeatureDisabled)
        );
        gate.enable();
        assert_eq!(
            gate.check_at(&context, None, now).denial_reason,
            Some(DenialReason::CrisisSignals)
        );
    }

    #[test]
    fn test_circuit_breaker() {
        let gate = ActivationGate::new();
        let now = Utc::now();
        let mut context = ready_context(now, 120);
        context.record_breathing_cycles(3);

        gate.record_error(context.session_id);
        gate.record_error(context.session_id);
        assert!(gate.check_at(&context, None, now).allowed);

        assert_eq!(gate.record_error(context.session_id), 3);
        assert_eq!(
            gate.check_at(&context, None, now).denial_reason,
            Some(DenialReason::ErrorThresholdExceeded)
        );

        // Other sessions are unaffected
        let mut other = ready_context(now, 120);
        other.record_breathing_cycles(3);
        assert!(gate.check_at(&other, None, now).allowed);

        gate.clear_session(&context.session_id);
        assert_eq!(gate.error_count(&context.session_id), 0);
        assert!(gate.check_at(&context, None, now).allowed);
    }

    #[test]
    fn test_no_exercise() {
        let gate = ActivationGate::new();
        let now = Utc::now();
        let context = ready_context(now, 120);
        assert_eq!(
            gate.check_at(&context, None, now).denial_reason,
            Some(DenialReason::NoExerciseCompleted)
        );
    }

    #[test]
    fn test_precomputed_low_stability_denies() {
        let gate = ActivationGate::new();
        let now = Utc::now();
        let mut context = ready_context(now, 120);
        context.record_grounding_steps(3);

        let mut evaluation = gate.stability_gate().evaluate_at(&context, now);
        evaluation.state = StabilityState::PanicActive;

        let decision = gate.check_at(&context, Some(&evaluation), now);
        assert_eq!(decision.denial_reason, Some(DenialReason::StabilityTooLow));
        assert_eq!(decision.stability_state, Some(StabilityState::PanicActive));
    }

    #[test]
    fn test_severe_without_improvement_is_too_unstable() {
        let gate = ActivationGate::new();
        let now = Utc::now();
        let mut context = StabilityContext::new(Uuid::new_v4(), now - Duration::seconds(300), PanicSeverity::Severe, 0.9);
        context.record_breathing_cycles(3);
        assert_eq!(
            gate.check_at(&context, None, now).denial_reason,
            Some(DenialReason::StabilityTooLow)
        );
    }

    #[test]
    fn test_disabled_by_config() {
        let config = ActivationConfig {
            enabled: false,
            ..ActivationConfig::default()
        };
        let gate = ActivationGate::with_config(&config, StabilityConfig::default());
        assert!(!gate.is_enabled());
    }

    #[test]
    fn test_audit_log_round_trips() {
        let gate = ActivationGate::new();
        let now = Utc::now();
        let context = ready_context(now, 10);
        let audit = gate.check_at(&context, None, now).to_audit_log();
        assert!(audit.session_ref.is_none());
        let json = serde_json::to_value(&audit).unwrap();
        assert_eq!(json["denial_reason"], "TIME_THRESHOLD_NOT_MET");
        assert!(json.get("session_id").is_none());
    }
}
