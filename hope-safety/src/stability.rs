//! Panic stability state machine.
//!
//! The state is derived fresh from a [`StabilityContext`] on every message;
//! only the raw context accumulates. There is no terminal state: a session
//! that was stabilizing drops straight back to critical when crisis signals
//! appear.
//!
//! ```text
//! crisis / self-harm / CRITICAL severity ──────────────► PANIC_CRITICAL
//! elapsed < 60s ───────────────────────────────────────► PANIC_ACTIVE
//! severity ≥ SEVERE and trend not improving ───────────► PANIC_ACTIVE
//! no exercise completed ───────────────────────────────► PANIC_ACTIVE
//! exercise + ≥180s + ≤MILD + intensity drop + improving ► PANIC_RECOVERED
//! exercise otherwise ──────────────────────────────────► PANIC_STABILIZING
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use clinical::{clamp_unit, PanicSeverity};

use crate::config::StabilityConfig;

/// Ordered stability states. Higher is more stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StabilityState {
    PanicCritical = 1,
    PanicActive = 2,
    PanicStabilizing = 3,
    PanicRecovered = 4,
}

impl StabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PanicCritical => "PANIC_CRITICAL",
            Self::PanicActive => "PANIC_ACTIVE",
            Self::PanicStabilizing => "PANIC_STABILIZING",
            Self::PanicRecovered => "PANIC_RECOVERED",
        }
    }
}

impl fmt::Display for StabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_max_history() -> usize {
    StabilityConfig::default().max_history
}

/// Raw telemetry for one panic episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityContext {
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,

    pub current_severity: PanicSeverity,
    /// 0.0 - 1.0
    pub current_intensity: f32,
    /// Intensity at episode start; survives history pruning
    pub initial_intensity: f32,

    pub severity_history: VecDeque<PanicSeverity>,
    pub intensity_history: VecDeque<f32>,

    pub breathing_cycles_completed: u32,
    pub grounding_steps_completed: u32,

    pub has_crisis_signals: bool,
    pub has_self_harm_signals: bool,

    #[serde(default = "default_max_history")]
    max_history: usize,
}

impl StabilityContext {
    /// Start an episode with its first sample.
    pub fn new(session_id: Uuid, started_at: DateTime<Utc>, severity: PanicSeverity, intensity: f32) -> Self {
        let intensity = clamp_unit(intensity, 1.0);
        Self {
            session_id,
            user_id: None,
            started_at,
            current_severity: severity,
            current_intensity: intensity,
            initial_intensity: intensity,
            severity_history: VecDeque::from([severity]),
            intensity_history: VecDeque::from([intensity]),
            breathing_cycles_completed: 0,
            grounding_steps_completed: 0,
            has_crisis_signals: false,
            has_self_harm_signals: false,
            max_history: default_max_history(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(2);
        self.trim_history();
        self
    }

    /// Record a new severity/intensity sample and make it current.
    pub fn record_sample(&mut self, severity: PanicSeverity, intensity: f32) {
        let intensity = clamp_unit(intensity, 1.0);
        self.current_severity = severity;
        self.current_intensity = intensity;
        self.severity_history.push_back(severity);
        self.intensity_history.push_back(intensity);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.severity_history.len() > self.max_history {
            self.severity_history.pop_front();
        }
        while self.intensity_history.len() > self.max_history {
            self.intensity_history.pop_front();
        }
    }

    pub fn record_breathing_cycles(&mut self, cycles: u32) {
        self.breathing_cycles_completed = self.breathing_cycles_completed.saturating_add(cycles);
    }

    pub fn record_grounding_steps(&mut self, steps: u32) {
        self.grounding_steps_completed = self.grounding_steps_completed.saturating_add(steps);
    }

    pub fn flag_crisis(&mut self) {
        self.has_crisis_signals = true;
    }

    pub fn flag_self_harm(&mut self) {
        self.has_self_harm_signals = true;
    }

    pub fn has_any_crisis_signal(&self) -> bool {
        self.has_crisis_signals || self.has_self_harm_signals
    }

    /// Seconds since the episode started. Clock skew reads as zero.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.started_at).num_milliseconds().max(0)) as f64 / 1000.0
    }

    /// At least one regulation exercise has been completed.
    pub fn exercise_completed(&self, config: &StabilityConfig) -> bool {
        self.breathing_cycles_completed >= config.min_breathing_cycles
            || self.grounding_steps_completed >= config.min_grounding_steps
    }

    /// Last minus first severity level over the recent `window` samples.
    ///
    /// Negative is improving, positive worsening, zero with fewer than two samples.
    pub fn severity_trend(&self, window: usize) -> f32 {
        let levels: Vec<f32> = self.severity_history.iter().map(|s| s.level() as f32).collect();
        trend(&levels, window)
    }

    /// Last minus first intensity over the recent `window` samples.
    pub fn intensity_trend(&self, window: usize) -> f32 {
        let values: Vec<f32> = self.intensity_history.iter().copied().collect();
        trend(&values, window)
    }
}

fn trend(values: &[f32], window: usize) -> f32 {
    let recent = &values[values.len().saturating_sub(window)..];
    match (recent.first(), recent.last()) {
        (Some(first), Some(last)) if recent.len() >= 2 => last - first,
        _ => 0.0,
    }
}

/// Derived stability state plus the numbers behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityEvaluation {
    pub state: StabilityState,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub severity_trend: f32,
    pub intensity_trend: f32,
    pub exercise_completed: bool,
}

impl StabilityEvaluation {
    /// Audit entry without identifying fields.
    pub fn to_audit_log(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state.as_str(),
            "reason": self.reason,
            "timestamp": self.timestamp.to_rfc3339(),
            "elapsed_seconds": (self.elapsed_seconds * 10.0).round() / 10.0,
            "severity_trend": round3(self.severity_trend),
            "intensity_trend": round3(self.intensity_trend),
            "exercise_completed": self.exercise_completed,
        })
    }
}

fn round3(value: f32) -> f64 {
    (value as f64 * 1000.0).round() / 1000.0
}

/// Evaluates a [`StabilityContext`] into a [`StabilityEvaluation`].
#[derive(Debug, Clone, Default)]
pub struct StabilityGate {
    config: StabilityConfig,
}

impl StabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: StabilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn evaluate(&self, context: &StabilityContext) -> StabilityEvaluation {
        self.evaluate_at(context, Utc::now())
    }

    pub fn evaluate_at(&self, context: &StabilityContext, now: DateTime<Utc>) -> StabilityEvaluation {
        let elapsed = context.elapsed_seconds(now);
        let severity_trend = context.severity_trend(self.config.trend_window);
        let intensity_trend = context.intensity_trend(self.config.trend_window);
        let exercise_completed = context.exercise_completed(&self.config);

        let (state, reason) = self.derive_state(context, elapsed, severity_trend, exercise_completed);

        debug!(
            state = %state,
            elapsed_seconds = elapsed,
            severity_trend,
            exercise_completed,
            "Stability evaluated"
        );

        StabilityEvaluation {
            state,
            reason,
            timestamp: now,
            elapsed_seconds: elapsed,
            severity_trend,
            intensity_trend,
            exercise_completed,
        }
    }

    fn derive_state(
        &self,
        context: &StabilityContext,
        elapsed: f64,
        severity_trend: f32,
        exercise_completed: bool,
    ) -> (StabilityState, String) {
        if context.has_any_crisis_signal() {
            return (
                StabilityState::PanicCritical,
                "Crisis or self-harm signals detected".to_string(),
            );
        }

        if context.current_severity >= PanicSeverity::Critical {
            return (
                StabilityState::PanicCritical,
                format!("Severity at {}", context.current_severity),
            );
        }

        let min_active = self.config.min_active_seconds as f64;
        if elapsed < min_active {
            return (
                StabilityState::PanicActive,
                format!("Elapsed time {:.0}s < {:.0}s threshold", elapsed, min_active),
            );
        }

        if context.current_severity >= PanicSeverity::Severe && severity_trend >= 0.0 {
            return (
                StabilityState::PanicActive,
                "Severe panic without improvement trend".to_string(),
            );
        }

        if !exercise_completed {
            return (
                StabilityState::PanicActive,
                "No regulation exercise completed".to_string(),
            );
        }

        let intensity_improved = context.intensity_history.len() >= 2
            && context.initial_intensity - context.current_intensity >= self.config.recovery_intensity_drop;

        if elapsed >= self.config.recovery_seconds as f64
            && context.current_severity <= PanicSeverity::Mild
            && intensity_improved
            && severity_trend < 0.0
        {
            return (
                StabilityState::PanicRecovered,
                "Sustained improvement with exercise completion".to_string(),
            );
        }

        (
            StabilityState::PanicStabilizing,
            "Improvement with exercise completion".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn context_started(seconds_ago: i64, now: DateTime<Utc>, severity: PanicSeverity) -> StabilityContext {
        StabilityContext::new(Uuid::new_v4(), now - Duration::seconds(seconds_ago), severity, 0.8)
    }

    #[test]
    fn test_crisis_overrides_mild_severity() {
        let now = Utc::now();
        let mut context = context_started(600, now, PanicSeverity::Mild);
        context.record_breathing_cycles(5);
        context.flag_crisis();

        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicCritical);
    }

    #[test]
    fn test_critical_severity() {
        let now = Utc::now();
        let context = context_started(600, now, PanicSeverity::Critical);
        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicCritical);
        assert_eq!(evaluation.reason, "Severity at CRITICAL");
    }

    #[test]
    fn test_too_early_is_active() {
        let now = Utc::now();
        let mut context = context_started(30, now, PanicSeverity::Mild);
        context.record_breathing_cycles(3);
        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicActive);
    }

    #[test]
    fn test_severe_without_improvement_is_active() {
        let now = Utc::now();
        let mut context = context_started(120, now, PanicSeverity::Moderate);
        context.record_sample(PanicSeverity::Severe, 0.9);
        context.record_breathing_cycles(3);
        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicActive);
        assert_eq!(evaluation.severity_trend, 1.0);
    }

    #[test]
    fn test_no_exercise_is_active() {
        let now = Utc::now();
        let context = context_started(120, now, PanicSeverity::Mild);
        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicActive);
        assert_eq!(evaluation.reason, "No regulation exercise completed");
    }

    #[test]
    fn test_stabilizing_after_exercise() {
        let now = Utc::now();
        let mut context = context_started(120, now, PanicSeverity::Moderate);
        context.record_grounding_steps(3);
        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicStabilizing);
        assert!(evaluation.exercise_completed);
    }

    #[test]
    fn test_recovered() {
        let now = Utc::now();
        let mut context = context_started(240, now, PanicSeverity::Severe);
        context.record_sample(PanicSeverity::Moderate, 0.6);
        context.record_sample(PanicSeverity::Mild, 0.4);
        context.record_breathing_cycles(4);

        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicRecovered);
        assert_eq!(evaluation.severity_trend, -2.0);
    }

    #[test]
    fn test_recovery_needs_intensity_drop() {
        let now = Utc::now();
        let mut context = context_started(240, now, PanicSeverity::Moderate);
        context.record_sample(PanicSeverity::Mild, 0.75);
        context.record_breathing_cycles(4);

        let evaluation = StabilityGate::new().evaluate_at(&context, now);
        assert_eq!(evaluation.state, StabilityState::PanicStabilizing);
    }

    #[test]
    fn test_state_can_move_backward() {
        let now = Utc::now();
        let gate = StabilityGate::new();
        let mut context = context_started(120, now, PanicSeverity::Moderate);
        context.record_breathing_cycles(3);
        assert_eq!(gate.evaluate_at(&context, now).state, StabilityState::PanicStabilizing);

        context.flag_self_harm();
        assert_eq!(gate.evaluate_at(&context, now).state, StabilityState::PanicCritical);
    }

    #[test]
    fn test_history_is_bounded_but_initial_intensity_kept() {
        let now = Utc::now();
        let mut context = context_started(10, now, PanicSeverity::Severe).with_max_history(3);
        for _ in 0..10 {
            context.record_sample(PanicSeverity::Moderate, 0.5);
        }
        assert_eq!(context.severity_history.len(), 3);
        assert_eq!(context.intensity_history.len(), 3);
        assert_eq!(context.initial_intensity, 0.8);
    }

    #[test]
    fn test_trend_window() {
        let now = Utc::now();
        let mut context = context_started(10, now, PanicSeverity::Critical);
        context.record_sample(PanicSeverity::Severe, 0.7);
        context.record_sample(PanicSeverity::Severe, 0.6);
        context.record_sample(PanicSeverity::Severe, 0.5);
        // Only the last three samples count
        assert_eq!(context.severity_trend(3), 0.0);
        assert!((context.intensity_trend(3) + 0.2).abs() < 1e-6);
        assert_eq!(context.severity_trend(10), -1.0);
    }

    #[test]
    fn test_audit_log_has_no_identifiers() {
        let now = Utc::now();
        let context = context_started(75, now, PanicSeverity::Mild);
        let log = StabilityGate::new().evaluate_at(&context, now).to_audit_log();
        assert_eq!(log["state"], "PANIC_ACTIVE");
        assert_eq!(log["elapsed_seconds"], 75.0);
        assert!(log.get("session_id").is_none());
        assert!(log.get("user_id").is_none());
    }
}
