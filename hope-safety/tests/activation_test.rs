//! Stability state machine and activation gate integration tests

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use clinical::PanicSeverity;
use hope_agent::{GenerationError, MockBackend, RecoveryPromptType, TextBackend};
use hope_safety::activation::{GenerationOutcome, MessageSource};
use hope_safety::audit::{AuditRecord, AuditSink, CountingAuditSink};
use hope_safety::config::{ActivationConfig, StabilityConfig};
use hope_safety::{
    ActivationGate, DenialReason, RecoverySupervisor, StabilityContext, StabilityGate, StabilityState,
};
use uuid::Uuid;

fn context(now: DateTime<Utc>, elapsed_seconds: i64, severity: PanicSeverity, intensity: f32) -> StabilityContext {
    StabilityContext::new(
        Uuid::new_v4(),
        now - Duration::seconds(elapsed_seconds),
        severity,
        intensity,
    )
}

#[test]
fn test_time_threshold_property() {
    let gate = ActivationGate::new();
    let now = Utc::now();

    let mut early = context(now, 30, PanicSeverity::Moderate, 0.6);
    early.record_sample(PanicSeverity::Mild, 0.4);
    early.record_breathing_cycles(3);
    let decision = gate.check_at(&early, None, now);
    assert!(!decision.allowed);
    assert_eq!(decision.denial_reason, Some(DenialReason::TimeThresholdNotMet));

    let mut later = context(now, 120, PanicSeverity::Moderate, 0.6);
    later.record_sample(PanicSeverity::Mild, 0.4);
    later.record_breathing_cycles(3);
    assert!(gate.check_at(&later, None, now).allowed);
}

#[test]
fn test_crisis_overrides_mild_severity() {
    let now = Utc::now();
    let mut ctx = context(now, 600, PanicSeverity::Mild, 0.1);
    ctx.record_breathing_cycles(10);
    ctx.flag_crisis();

    let evaluation = StabilityGate::new().evaluate_at(&ctx, now);
    assert_eq!(evaluation.state, StabilityState::PanicCritical);
}

#[test]
fn test_episode_can_move_backward() {
    let gate = StabilityGate::new();
    let now = Utc::now();
    let mut ctx = context(now, 120, PanicSeverity::Moderate, 0.7);
    ctx.record_sample(PanicSeverity::Mild, 0.5);
    ctx.record_grounding_steps(3);
    assert_eq!(gate.evaluate_at(&ctx, now).state, StabilityState::PanicStabilizing);

    ctx.flag_self_harm();
    assert_eq!(gate.evaluate_at(&ctx, now).state, StabilityState::PanicCritical);
}

#[test]
fn test_full_recovery() {
    let gate = StabilityGate::new();
    let now = Utc::now();
    let mut ctx = context(now, 240, PanicSeverity::Severe, 0.9);
    ctx.record_sample(PanicSeverity::Moderate, 0.6);
    ctx.record_sample(PanicSeverity::Mild, 0.3);
    ctx.record_breathing_cycles(4);

    let evaluation = gate.evaluate_at(&ctx, now);
    assert_eq!(evaluation.state, StabilityState::PanicRecovered);
    assert!(evaluation.severity_trend < 0.0);

    let audit = evaluation.to_audit_log();
    assert_eq!(audit["state"], "PANIC_RECOVERED");
    assert!(audit.get("session_id").is_none());
}

#[test]
fn test_gate_check_order() {
    let gate = ActivationGate::new();
    let now = Utc::now();

    // Everything wrong at once: the kill-switch is reported
    let mut ctx = context(now, 5, PanicSeverity::Critical, 1.0);
    ctx.flag_crisis();
    for _ in 0..3 {
        gate.record_error(ctx.session_id);
    }

    gate.disable();
    assert_eq!(gate.check_at(&ctx, None, now).denial_reason, Some(DenialReason::FeatureDisabled));
    gate.enable();
    assert_eq!(
        gate.check_at(&ctx, None, now).denial_reason,
        Some(DenialReason::ErrorThresholdExceeded)
    );
    gate.clear_session(&ctx.session_id);
    assert_eq!(gate.check_at(&ctx, None, now).denial_reason, Some(DenialReason::CrisisSignals));
}

#[test]
fn test_custom_thresholds() {
    let stability = StabilityConfig {
        min_active_seconds: 10,
        ..StabilityConfig::default()
    };
    let activation = ActivationConfig {
        error_threshold: 1,
        ..ActivationConfig::default()
    };
    let gate = ActivationGate::with_config(&activation, stability);
    let now = Utc::now();

    let mut ctx = context(now, 30, PanicSeverity::Moderate, 0.6);
    ctx.record_sample(PanicSeverity::Mild, 0.4);
    ctx.record_breathing_cycles(3);
    assert!(gate.check_at(&ctx, None, now).allowed);

    gate.record_error(ctx.session_id);
    assert_eq!(
        gate.check_at(&ctx, None, now).denial_reason,
        Some(DenialReason::ErrorThresholdExceeded)
    );
}

#[test]
fn test_activation_audit_counts() {
    let gate = ActivationGate::new();
    let sink = CountingAuditSink::new();
    let now = Utc::now();

    let early = context(now, 10, PanicSeverity::Moderate, 0.6);
    let mut ready = context(now, 120, PanicSeverity::Moderate, 0.6);
    ready.record_sample(PanicSeverity::Mild, 0.4);
    ready.record_breathing_cycles(3);

    for ctx in [&early, &ready] {
        let audit = gate.check_at(ctx, None, now).to_audit_log().for_session(&ctx.session_id);
        assert_eq!(audit.session_ref.as_deref().map(str::len), Some(16));
        sink.emit(AuditRecord::Activation(audit));
    }

    assert_eq!(sink.denial_count(DenialReason::TimeThresholdNotMet), 1);
    assert_eq!(sink.activations_allowed(), 1);
}

fn ready_context() -> StabilityContext {
    let mut ctx = context(Utc::now(), 120, PanicSeverity::Moderate, 0.6);
    ctx.record_sample(PanicSeverity::Mild, 0.4);
    ctx.record_breathing_cycles(3);
    ctx
}

#[test]
fn test_supervisor_generates_when_allowed() {
    let backend: Arc<dyn TextBackend> =
        Arc::new(MockBackend::default().with_response("You gave your body a real pause. That mattered?"));
    let supervisor = RecoverySupervisor::new(Some(backend), Arc::new(ActivationGate::new()));

    let message = tokio_test::block_on(supervisor.generate(RecoveryPromptType::PostBreathing, &ready_context()));
    assert_eq!(message.source, MessageSource::Generated);
    assert_eq!(message.text, "You gave your body a real pause. That mattered.");
}

#[test]
fn test_supervisor_kill_switch_uses_fallback() {
    let mock = Arc::new(MockBackend::default());
    let backend: Arc<dyn TextBackend> = mock.clone();
    let gate = Arc::new(ActivationGate::new());
    let supervisor = RecoverySupervisor::new(Some(backend), gate.clone());

    gate.disable();
    let message = tokio_test::block_on(supervisor.generate(RecoveryPromptType::SessionClosing, &ready_context()));
    assert_eq!(message.outcome, GenerationOutcome::Denied(DenialReason::FeatureDisabled));
    assert_eq!(message.text, RecoveryPromptType::SessionClosing.fallback_text());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_supervisor_timeout_trips_breaker() {
    let backend: Arc<dyn TextBackend> =
        Arc::new(MockBackend::default().with_delay(std::time::Duration::from_secs(30)));
    let gate = Arc::new(ActivationGate::new());
    let supervisor = RecoverySupervisor::new(Some(backend), gate.clone());
    let ctx = ready_context();

    for _ in 0..3 {
        let message = supervisor.generate(RecoveryPromptType::PostGrounding, &ctx).await;
        assert_eq!(message.outcome, GenerationOutcome::TimedOut);
        assert_eq!(message.text, RecoveryPromptType::PostGrounding.fallback_text());
    }
    assert_eq!(gate.error_count(&ctx.session_id), 3);

    let message = supervisor.generate(RecoveryPromptType::PostGrounding, &ctx).await;
    assert_eq!(
        message.outcome,
        GenerationOutcome::Denied(DenialReason::ErrorThresholdExceeded)
    );
}

#[tokio::test]
async fn test_supervisor_failures_are_isolated_per_session() {
    let backend: Arc<dyn TextBackend> = Arc::new(
        MockBackend::default().with_failure(GenerationError::RequestFailed("unreachable".to_string())),
    );
    let gate = Arc::new(ActivationGate::new());
    let supervisor = RecoverySupervisor::new(Some(backend), gate.clone());

    let failing = ready_context();
    let other = ready_context();
    for _ in 0..3 {
        supervisor.generate(RecoveryPromptType::PostBreathing, &failing).await;
    }

    assert_eq!(gate.error_count(&failing.session_id), 3);
    assert_eq!(gate.error_count(&other.session_id), 0);
    assert!(gate.check(&other, None).allowed);
}
