//! End-to-end message turn tests

use std::sync::Arc;

use clinical::{
    ClinicalAssessment, DistressIndicators, EmotionCategory, EmotionProfile, EmotionScore, PanicSeverity,
    SeverityClassification,
};
use hope_safety::audit::{ChannelAuditSink, CountingAuditSink};
use hope_safety::escalation::ReviewPriority;
use hope_safety::{
    DecisionContext, DecisionEngine, EscalationManager, EvaluationRequest, ResponseStrategy, RiskLevel,
    RiskScoringEngine, SafetyConfig, SafetyPipeline, SafetyValidator,
};
use uuid::Uuid;

fn assessment(severity: PanicSeverity, confidence: f32) -> ClinicalAssessment {
    ClinicalAssessment::builder(SeverityClassification::point(severity, confidence))
        .confidence(confidence)
        .session(Uuid::new_v4())
        .build()
}

/// Severe episode with dread and dissociation: crisis signals in two categories.
fn crisis_assessment() -> ClinicalAssessment {
    ClinicalAssessment::builder(SeverityClassification::point(PanicSeverity::Critical, 0.9))
        .confidence(0.9)
        .session(Uuid::new_v4())
        .emotions(EmotionProfile::new(
            vec![
                EmotionScore::new(EmotionCategory::Dread, 0.9),
                EmotionScore::new(EmotionCategory::Dissociation, 0.85),
                EmotionScore::new(EmotionCategory::Helplessness, 0.8),
            ],
            0.8,
        ))
        .distress(DistressIndicators::with_level(0.95))
        .build()
}

#[test]
fn test_final_response_revalidates_clean() {
    let pipeline = SafetyPipeline::new();
    let validator = SafetyValidator::new();

    let candidates = [
        "Let's breathe in for four counts together.",
        "You should take 0.5mg of Xanax",
        "Just relax, it's all in your head.",
        "You'll definitely feel better. At least it's not worse.",
        "",
    ];
    let assessments = [
        assessment(PanicSeverity::Mild, 0.9),
        assessment(PanicSeverity::Severe, 0.8),
        assessment(PanicSeverity::Critical, 0.9),
        crisis_assessment(),
    ];

    for assessment in &assessments {
        for candidate in candidates {
            for country in ["US", "GB", "EG", "ZZ"] {
                let request = EvaluationRequest::new(assessment.clone(), candidate).with_country(country);
                let evaluation = pipeline.evaluate(&request);
                assert!(!evaluation.final_response.trim().is_empty());

                for crisis_context in [false, true] {
                    let again = validator.validate(&evaluation.final_response, crisis_context);
                    assert!(
                        !again.blocked,
                        "final response re-blocked for {:?} / {}: {:?}",
                        candidate,
                        country,
                        again.rule_ids()
                    );
                }
            }
        }
    }
}

#[test]
fn test_high_us_resources() {
    let pipeline = SafetyPipeline::new();
    let evaluation = pipeline.evaluate(
        &EvaluationRequest::new(assessment(PanicSeverity::Critical, 0.9), "I'm right here with you.").with_country("US"),
    );

    assert_eq!(evaluation.risk_level(), RiskLevel::High);
    let resources = evaluation.escalation.resources_to_include.as_deref().unwrap();
    assert!(resources.contains("988"));
    assert!(!resources.contains("911"));
    assert!(evaluation.final_response.contains("988"));
}

#[test]
fn test_lone_critical_severity_is_high() {
    let engine = RiskScoringEngine::new();
    let risk = engine.assess(&assessment(PanicSeverity::Critical, 0.9), &[]);
    assert_eq!(risk.risk_level, RiskLevel::High);
    assert!(risk.crisis_floor_applied);
}

#[test]
fn test_actionable_crisis_merges_and_escalates() {
    let pipeline = SafetyPipeline::new();
    let evaluation =
        pipeline.evaluate(&EvaluationRequest::new(crisis_assessment(), "I'm right here with you.").with_country("US"));

    assert!(evaluation.crisis_result.meets_multi_signal_requirement);
    assert!(evaluation.audit.crisis_signals_merged);
    assert!(evaluation.is_crisis);
    assert!(evaluation.risk_level() >= RiskLevel::High);
    assert!(evaluation.risk_assessment.signal_count() > evaluation.crisis_result.signals.len());
    assert!(evaluation.requires_human_review);

    let ticket = evaluation.review_ticket.as_deref().unwrap();
    let queued = pipeline.review_queue().get(ticket).unwrap();
    assert_eq!(queued.priority, ReviewPriority::for_level(evaluation.risk_level()));
}

#[test]
fn test_critical_adds_emergency_number() {
    let mut config = SafetyConfig::default();
    config.risk.critical_threshold = 0.3;
    let pipeline = SafetyPipeline::from_config(&config).unwrap();

    let evaluation =
        pipeline.evaluate(&EvaluationRequest::new(crisis_assessment(), "I'm right here with you.").with_country("US"));

    assert_eq!(evaluation.risk_level(), RiskLevel::Critical);
    assert!(evaluation.escalation.modifications.crisis_mode);
    assert!(evaluation.final_response.contains("911"));
    assert_eq!(
        pipeline.review_queue().pending()[0].priority,
        ReviewPriority::Urgent
    );
}

#[test]
fn test_decision_and_pipeline_agree_on_crisis() {
    let assessment = assessment(PanicSeverity::Critical, 0.4);
    let decision = DecisionEngine::new().decide(&DecisionContext::new(&assessment));
    let evaluation = SafetyPipeline::new().evaluate(&EvaluationRequest::new(assessment, "I'm here."));

    assert_eq!(decision.strategy, ResponseStrategy::Crisis);
    assert!(evaluation.is_crisis);
}

#[test]
fn test_response_composition_keeps_body() {
    let pipeline = SafetyPipeline::new();
    let body = "Notice five things you can see around you.";
    let evaluation = pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, 0.9), body));

    let prefix = EscalationManager::response_prefix(evaluation.risk_level());
    assert!(evaluation.final_response.starts_with(prefix.trim()));
    assert!(evaluation.final_response.contains(body));
}

#[test]
fn test_rising_risk_is_audited() {
    let counting = Arc::new(CountingAuditSink::new());
    let pipeline = SafetyPipeline::new().with_audit_sink(counting.clone());
    let session = Uuid::new_v4();
    pipeline.start_session(session);

    let calm = ClinicalAssessment::builder(SeverityClassification::point(PanicSeverity::Mild, 0.9))
        .confidence(0.9)
        .session(session)
        .build();
    let critical = ClinicalAssessment::builder(SeverityClassification::point(PanicSeverity::Critical, 0.9))
        .confidence(0.9)
        .session(session)
        .build();

    pipeline.evaluate(&EvaluationRequest::new(calm, "Okay."));
    let rising = pipeline.evaluate(&EvaluationRequest::new(critical, "I'm here."));

    assert!(rising.escalation.should_escalate);
    assert!(rising.audit.escalated);
    assert_eq!(counting.escalation_count(), 1);
    assert_eq!(pipeline.escalation_events(&session).len(), 1);

    let state = pipeline.end_session(&session).unwrap();
    assert_eq!(state.previous_level, Some(rising.risk_level()));
    assert_eq!(state.recent_scores.len(), 2);
}

#[test]
fn test_channel_audit_stream() {
    let (sink, mut rx) = ChannelAuditSink::new();
    let pipeline = SafetyPipeline::new().with_audit_sink(Arc::new(sink));

    pipeline.evaluate(&EvaluationRequest::new(assessment(PanicSeverity::Critical, 0.9), "I'm here."));

    let mut kinds = Vec::new();
    while let Ok(record) = rx.try_recv() {
        kinds.push(record.kind());
    }
    assert_eq!(kinds, vec!["escalation", "evaluation"]);
}

#[test]
fn test_validate_response_only() {
    let pipeline = SafetyPipeline::new();
    let result = pipeline.validate_response_only("You should take 0.5mg of Xanax", false);
    assert!(result.blocked);
    assert!(!result.filtered_response.contains("Xanax"));
    assert!(!result.filtered_response.contains("mg"));

    let empty = pipeline.validate_response_only("", false);
    assert!(empty.blocked);
    assert!(!empty.filtered_response.is_empty());
}
