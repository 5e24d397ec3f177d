//! Per-message safety orchestration.
//!
//! One call to [`SafetyPipeline::evaluate`] runs a message turn end to end:
//!
//! 1. risk scoring (with the session's recent scores)
//! 2. crisis detection, merged into the risk assessment when actionable
//! 3. previous-level lookup and update for the session
//! 4. escalation against that previous level
//! 5. optional linguistic pre-screen of the raw text
//! 6. response validation, crisis context at HIGH and above
//! 7. prefix/suffix composition, also over a blocked-and-replaced response
//!
//! Nothing here fails: every path yields a deliverable response.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use clinical::ClinicalAssessment;

use crate::audit::{session_ref, AuditRecord, AuditSink, EscalationAudit, EvaluationAudit, TracingAuditSink};
use crate::config::SafetyConfig;
use crate::crisis::{CrisisDetectionResult, CrisisDetector, LinguisticCrisisAnalyzer};
use crate::escalation::{
    EmergencyResourceResolver, EscalationDecision, EscalationEvent, EscalationManager, ReviewPriority, ReviewQueue,
};
use crate::risk::{RiskAssessment, RiskScoringEngine};
use crate::session::SessionStore;
use crate::types::{Result, RiskLevel, RiskSignal};
use crate::validator::{SafetyResult, SafetyValidator};

/// Linguistic matches needed to flag an otherwise quiet turn for review.
const LINGUISTIC_REVIEW_MATCHES: usize = 2;

/// Risk memory kept per session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRiskState {
    pub previous_level: Option<RiskLevel>,
    pub recent_scores: VecDeque<f32>,
    pub events: VecDeque<EscalationEvent>,
    pub message_count: u32,
}

/// One message turn to evaluate.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub assessment: ClinicalAssessment,
    pub candidate_response: String,
    /// Falls back to the configured default jurisdiction
    pub country_code: Option<String>,
    /// The user's own words, for the linguistic pre-screen only
    pub raw_text: Option<String>,
}

impl EvaluationRequest {
    pub fn new(assessment: ClinicalAssessment, candidate_response: impl Into<String>) -> Self {
        Self {
            assessment,
            candidate_response: candidate_response.into(),
            country_code: None,
            raw_text: None,
        }
    }

    pub fn with_country(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into());
        self
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }
}

/// Everything decided for one message turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvaluation {
    pub final_response: String,
    pub risk_assessment: RiskAssessment,
    pub crisis_result: CrisisDetectionResult,
    pub escalation: EscalationDecision,
    pub safety_result: SafetyResult,
    pub linguistic_signals: Vec<RiskSignal>,
    pub is_crisis: bool,
    pub requires_human_review: bool,
    pub review_ticket: Option<String>,
    pub audit: EvaluationAudit,
}

impl SafetyEvaluation {
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_assessment.risk_level
    }
}

/// Orchestrates risk, crisis, escalation and validation for each message.
pub struct SafetyPipeline {
    engine: RiskScoringEngine,
    detector: CrisisDetector,
    linguistic: LinguisticCrisisAnalyzer,
    manager: EscalationManager,
    validator: SafetyValidator,
    review: ReviewQueue,
    audit: Arc<dyn AuditSink>,
    sessions: SessionStore<SessionRiskState>,
    default_country: String,
    history_len: usize,
    max_events: usize,
}

impl SafetyPipeline {
    pub fn new() -> Self {
        Self::with_resolver(&SafetyConfig::default(), EmergencyResourceResolver::builtin())
    }

    /// Build from configuration, loading the resources file when one is set.
    pub fn from_config(config: &SafetyConfig) -> Result<Self> {
        let resolver = match &config.escalation.resources_path {
            Some(path) => EmergencyResourceResolver::from_file(path)?,
            None => EmergencyResourceResolver::builtin(),
        };
        Ok(Self::with_resolver(config, resolver))
    }

    fn with_resolver(config: &SafetyConfig, resolver: EmergencyResourceResolver) -> Self {
        let resolver = resolver.with_max_listed(config.escalation.max_resources_in_message);
        Self {
            engine: RiskScoringEngine::with_config(config.risk.clone()),
            detector: CrisisDetector::with_config(config.crisis.clone()),
            linguistic: LinguisticCrisisAnalyzer::new(),
            manager: EscalationManager::new(Arc::new(resolver)),
            validator: SafetyValidator::with_config(&config.validator),
            review: ReviewQueue::with_config(&config.review),
            audit: Arc::new(TracingAuditSink),
            sessions: SessionStore::new(),
            default_country: config.escalation.default_country.clone(),
            history_len: config.session.risk_history_len.max(1),
            max_events: config.session.max_events.max(1),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn review_queue(&self) -> &ReviewQueue {
        &self.review
    }

    pub fn escalation_manager(&self) -> &EscalationManager {
        &self.manager
    }

    /// Start tracking a session with empty risk memory.
    pub fn start_session(&self, session_id: Uuid) {
        self.sessions.open(session_id);
        debug!(session = %session_ref(&session_id), "Session risk tracking started");
    }

    /// Stop tracking a session and hand back its final risk memory.
    pub fn end_session(&self, session_id: &Uuid) -> Option<SessionRiskState> {
        let state = self.sessions.close(session_id);
        debug!(
            session = %session_ref(session_id),
            messages = state.as_ref().map(|s| s.message_count).unwrap_or(0),
            "Session risk tracking ended"
        );
        state
    }

    /// Escalation events recorded for a session so far.
    pub fn escalation_events(&self, session_id: &Uuid) -> Vec<EscalationEvent> {
        self.sessions
            .read(session_id, |state| state.events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Validation alone, for text produced outside the message flow.
    pub fn validate_response_only(&self, response: &str, crisis_context: bool) -> SafetyResult {
        self.validator.validate(response, crisis_context)
    }

    pub fn evaluate(&self, request: &EvaluationRequest) -> SafetyEvaluation {
        // Producers are not trusted to have normalized the record
        let sanitized = request.assessment.clone().sanitized();
        let assessment = &sanitized;
        let session_id = assessment.session_id;
        let country = request
            .country_code
            .as_deref()
            .unwrap_or(&self.default_country);

        let history: Vec<f32> = session_id
            .and_then(|id| self.sessions.read(&id, |state| state.recent_scores.iter().copied().collect()))
            .unwrap_or_default();

        let mut risk = self.engine.assess(assessment, &history);

        let crisis = self.detector.detect(assessment);
        let crisis_merged = crisis.is_actionable();
        if crisis_merged {
            risk.signals.extend(crisis.to_risk_signals());
            risk.raise_to(RiskLevel::High);
            warn!(
                signals = crisis.signals.len(),
                level = %risk.risk_level,
                "Crisis signals merged into risk assessment"
            );
        }

        let previous_level = session_id.and_then(|id| self.remember(id, &risk));

        let escalation = self.manager.evaluate(&risk, country, previous_level);

        let linguistic_signals = request
            .raw_text
            .as_deref()
            .map(|text| self.linguistic.analyze(text))
            .unwrap_or_default();
        if linguistic_signals.len() >= LINGUISTIC_REVIEW_MATCHES && escalation.event.is_none() {
            risk.flag_for_review();
            warn!(
                matches = linguistic_signals.len(),
                "Linguistic pre-screen flagged message for review"
            );
        }

        let level = risk.risk_level;
        let safety = self.validator.validate_with_appendix(
            &request.candidate_response,
            level >= RiskLevel::High,
            escalation.resources_to_include.as_deref(),
        );

        // A resource block the validator already appended is not repeated
        let final_response = if safety.crisis_elements_appended {
            EscalationManager::compose(&safety.filtered_response, level, None)
        } else {
            self.manager.modify_response(&safety.filtered_response, &escalation)
        };

        let review_ticket = escalation.event.as_ref().map(|event| {
            if let Some(id) = session_id {
                let max_events = self.max_events;
                self.sessions.update(id, |state| {
                    state.events.push_back(event.clone());
                    while state.events.len() > max_events {
                        state.events.pop_front();
                    }
                });
            }
            self.audit.emit(AuditRecord::Escalation(EscalationAudit::from(event)));
            self.review.enqueue(event.clone(), ReviewPriority::for_level(level))
        });

        let is_crisis =
            level >= RiskLevel::Critical || assessment.requires_crisis_protocol || crisis.meets_multi_signal_requirement;
        let requires_human_review =
            risk.requires_human_review || escalation.event.is_some() || assessment.requires_human_review;

        let audit = EvaluationAudit {
            evaluation_id: Uuid::new_v4(),
            session_ref: session_id.as_ref().map(session_ref),
            timestamp: Utc::now(),
            risk_level: level,
            risk_score: risk.risk_score,
            risk_signal_count: risk.signal_count(),
            risk_category_count: risk.category_count(),
            crisis_signal_count: crisis.signals.len(),
            crisis_multi_signal_met: crisis.meets_multi_signal_requirement,
            crisis_signals_merged: crisis_merged,
            linguistic_match_count: linguistic_signals.len(),
            escalated: escalation.should_escalate,
            escalation_event_id: escalation.event.as_ref().map(|e| e.event_id),
            response_blocked: safety.blocked,
            response_modified: safety.was_modified || final_response != request.candidate_response.trim(),
            violations: safety.rule_ids(),
            is_crisis,
            requires_human_review,
            review_ticket: review_ticket.clone(),
        };
        self.audit.emit(AuditRecord::Evaluation(audit.clone()));

        info!(
            session = ?audit.session_ref,
            level = %level,
            score = risk.risk_score,
            is_crisis,
            review = requires_human_review,
            blocked = safety.blocked,
            "Message evaluated"
        );

        SafetyEvaluation {
            final_response,
            risk_assessment: risk,
            crisis_result: crisis,
            escalation,
            safety_result: safety,
            linguistic_signals,
            is_crisis,
            requires_human_review,
            review_ticket,
            audit,
        }
    }

    /// Swap in the new level and score, returning the level it replaced.
    fn remember(&self, session_id: Uuid, risk: &RiskAssessment) -> Option<RiskLevel> {
        let history_len = self.history_len;
        self.sessions.update(session_id, |state| {
            let previous = state.previous_level.replace(risk.risk_level);
            state.recent_scores.push_back(risk.risk_score);
            while state.recent_scores.len() > history_len {
                state.recent_scores.pop_front();
            }
            state.message_count = state.message_count.saturating_add(1);
            previous
        })
    }
}

impl Default for SafetyPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::CountingAuditSink;
    use clinical::{PanicSeverity, SeverityClassification};

    fn assessment(severity: PanicSeverity, session_id: Uuid) -> ClinicalAssessment {
        ClinicalAssessment::builder(SeverityClassification::point(severity, 0.9))
            .confidence(0.9)
            .session(session_id)
            .build()
    }

    #[test]
    fn test_low_risk_passes_through() {
        let pipeline = SafetyPipeline::new();
        let text = "That sounds like a lot. Let's take a slow breath together.";
        let request = EvaluationRequest::new(assessment(PanicSeverity::Mild, Uuid::new_v4()), text);

        let evaluation = pipeline.evaluate(&request);
        assert_eq!(evaluation.risk_level(), RiskLevel::Low);
        assert_eq!(evaluation.final_response, text);
        assert!(!evaluation.is_crisis);
        assert!(evaluation.review_ticket.is_none());
        assert!(evaluation.escalation.event.is_none());
    }

    #[test]
    fn test_crisis_protocol_attaches_resources() {
        let pipeline = SafetyPipeline::new();
        let request = EvaluationRequest::new(
            assessment(PanicSeverity::Critical, Uuid::new_v4()),
            "I'm here with you right now.",
        )
        .with_country("US");

        let evaluation = pipeline.evaluate(&request);
        assert!(evaluation.risk_level() >= RiskLevel::High);
        assert!(evaluation.is_crisis);
        assert!(evaluation.requires_human_review);
        assert!(evaluation.final_response.contains("I'm here with you right now."));
        assert!(evaluation.final_response.contains("988"));
        assert_eq!(evaluation.final_response.matches("988 Suicide & Crisis Lifeline").count(), 1);
        assert!(evaluation.review_ticket.is_some());
        assert_eq!(pipeline.review_queue().len(), 1);
    }

    #[test]
    fn test_blocked_response_still_gets_resources() {
        let pipeline = SafetyPipeline::new();
        let request = EvaluationRequest::new(
            assessment(PanicSeverity::Critical, Uuid::new_v4()),
            "You should take 0.5mg of Xanax",
        )
        .with_country("US");

        let evaluation = pipeline.evaluate(&request);
        assert!(evaluation.safety_result.blocked);
        assert!(!evaluation.final_response.contains("Xanax"));
        assert!(!evaluation.final_response.contains("mg"));
        assert!(evaluation.final_response.contains("988"));
        assert!(evaluation.audit.response_blocked);
    }

    #[test]
    fn test_session_transitions() {
        let pipeline = SafetyPipeline::new();
        let session = Uuid::new_v4();
        pipeline.start_session(session);

        let calm = pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Mild, session), "Okay."));
        assert!(calm.escalation.previous_level.is_none());
        assert!(pipeline.escalation_events(&session).is_empty());

        let rising =
            pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, session), "I'm here."));
        assert!(rising.escalation.should_escalate);
        assert_eq!(rising.escalation.previous_level, Some(RiskLevel::Low));

        let sustained =
            pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, session), "I'm here."));
        assert!(!sustained.escalation.should_escalate);
        assert!(sustained.escalation.event.is_some());
        assert_eq!(pipeline.escalation_events(&session).len(), 2);

        let state = pipeline.end_session(&session).unwrap();
        assert_eq!(state.message_count, 3);
        assert_eq!(state.events.len(), 2);
        assert!(pipeline.escalation_events(&session).is_empty());
    }

    #[test]
    fn test_session_events_are_bounded() {
        let mut config = SafetyConfig::default();
        config.session.max_events = 3;
        let pipeline = SafetyPipeline::from_config(&config).unwrap();
        let session = Uuid::new_v4();

        let mut event_ids = Vec::new();
        for _ in 0..5 {
            let evaluation =
                pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, session), "I'm here."));
            event_ids.push(evaluation.escalation.event.unwrap().event_id);
        }

        let kept: Vec<Uuid> = pipeline.escalation_events(&session).iter().map(|e| e.event_id).collect();
        assert_eq!(kept, event_ids[2..].to_vec());
        assert_eq!(pipeline.end_session(&session).unwrap().message_count, 5);
    }

    #[test]
    fn test_unnormalized_assessment_is_sanitized() {
        let pipeline = SafetyPipeline::new();
        let mut raw = assessment(PanicSeverity::Critical, Uuid::new_v4());
        raw.requires_crisis_protocol = false;
        raw.confidence_score = f32::NAN;
        raw.severity.confidence = f32::NAN;

        let evaluation = pipeline.evaluate(&EvaluationRequest::new(raw, "I'm here.").with_country("US"));
        assert!(evaluation.is_crisis);
        assert!(evaluation.risk_level() >= RiskLevel::High);
        assert!(evaluation.risk_assessment.has_uncertainty);
        assert!(evaluation.risk_assessment.confidence.is_finite());
        assert!(evaluation.final_response.contains("988"));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let pipeline = SafetyPipeline::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, a), "I'm here."));
        let other = pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Mild, b), "Okay."));
        assert!(other.escalation.previous_level.is_none());
        assert!(pipeline.escalation_events(&b).is_empty());
    }

    #[test]
    fn test_linguistic_prescreen_flags_review_only() {
        let pipeline = SafetyPipeline::new();
        let request = EvaluationRequest::new(assessment(PanicSeverity::Mild, Uuid::new_v4()), "I'm listening.")
            .with_raw_text("I want to be dead. Everyone would be better off without me.");

        let evaluation = pipeline.evaluate(&request);
        assert!(evaluation.linguistic_signals.len() >= 2);
        assert_eq!(evaluation.risk_level(), RiskLevel::Low);
        assert!(evaluation.risk_assessment.requires_human_review);
        assert!(evaluation.requires_human_review);
        assert!(evaluation.escalation.event.is_none());
        assert!(evaluation
            .linguistic_signals
            .iter()
            .all(|s| !s.description.contains("without me")));
    }

    #[test]
    fn test_audit_records_emitted() {
        let counting = Arc::new(CountingAuditSink::new());
        let pipeline = SafetyPipeline::new().with_audit_sink(counting.clone());

        pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Mild, Uuid::new_v4()), "Okay."));
        let evaluation =
            pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, Uuid::new_v4()), "Okay."));

        assert_eq!(counting.risk_level_count(RiskLevel::Low), 1);
        assert_eq!(counting.risk_level_count(evaluation.risk_level()), 1);
        assert_eq!(counting.escalation_count(), 1);
    }

    #[test]
    fn test_audit_has_no_text() {
        let pipeline = SafetyPipeline::new();
        let request = EvaluationRequest::new(
            assessment(PanicSeverity::Critical, Uuid::new_v4()),
            "A very particular candidate sentence.",
        )
        .with_raw_text("I can't take this anymore and I want to give up");

        let evaluation = pipeline.evaluate(&request);
        let json = serde_json::to_string(&evaluation.audit).unwrap();
        assert!(!json.contains("particular"));
        assert!(!json.contains("anymore"));
        assert!(!json.contains(&request.assessment.session_id.unwrap().to_string()));
    }

    #[test]
    fn test_unknown_country_uses_international() {
        let pipeline = SafetyPipeline::new();
        let request = EvaluationRequest::new(assessment(PanicSeverity::Critical, Uuid::new_v4()), "I'm here.")
            .with_country("ZZ");
        let evaluation = pipeline.evaluate(&request);
        assert!(evaluation.escalation.resources_to_include.is_some());
        assert!(evaluation.final_response.contains("I'm here."));
    }
}
