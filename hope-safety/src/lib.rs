//! Hope Safety - the safety and decision core of Hope panic support
//!
//! Everything between a [`clinical::ClinicalAssessment`] and the text a user
//! sees passes through here:
//!
//! - **Risk scoring**: weighted multi-signal score with a multi-signal guard on CRITICAL
//! - **Crisis detection**: assessment-based detector plus a raw-text linguistic pre-screen
//! - **Escalation**: level actions, jurisdiction resources, review queue
//! - **Validation**: hard constraints, soft filters, crisis elements, prompt injection
//! - **Decisions**: strategy, tone and interventions per message
//! - **Activation**: stability state machine, kill-switch and per-session circuit breaker
//!
//! # Architecture
//!
//! ```text
//!                    ClinicalAssessment
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐
//!  │ RiskScoring  │◄─│ Crisis       │  │ DecisionEngine │──► Decision
//!  │ Engine       │  │ Detector     │  └────────────────┘
//!  └──────┬───────┘  └──────────────┘
//!         ▼
//!  ┌──────────────┐  ┌──────────────┐
//!  │ Escalation   │─►│ Safety       │──► SafetyEvaluation
//!  │ Manager      │  │ Validator    │
//!  └──────────────┘  └──────────────┘
//!
//!  session telemetry ─► StabilityGate ─► ActivationGate ─► RecoverySupervisor
//! ```
//!
//! # Example
//!
//! ```
//! use clinical::{ClinicalAssessment, PanicSeverity, SeverityClassification};
//! use hope_safety::{EvaluationRequest, RiskLevel, SafetyPipeline};
//!
//! let assessment = ClinicalAssessment::builder(SeverityClassification::point(PanicSeverity::Critical, 0.9))
//!     .confidence(0.9)
//!     .build();
//!
//! let pipeline = SafetyPipeline::new();
//! let evaluation = pipeline.evaluate(&EvaluationRequest::new(assessment, "I'm here with you.").with_country("US"));
//!
//! assert!(evaluation.is_crisis);
//! assert!(evaluation.risk_assessment.risk_level >= RiskLevel::High);
//! assert!(evaluation.final_response.contains("988"));
//! ```

pub mod activation;
pub mod audit;
pub mod config;
pub mod crisis;
pub mod decision;
pub mod escalation;
pub mod pipeline;
pub mod risk;
pub mod session;
pub mod stability;
pub mod types;
pub mod validator;

// Re-export main types
pub use activation::{ActivationDecision, ActivationGate, DenialReason, RecoveryMessage, RecoverySupervisor};
pub use audit::{AuditRecord, AuditSink};
pub use config::SafetyConfig;
pub use crisis::{CrisisDetectionResult, CrisisDetector, LinguisticCrisisAnalyzer};
pub use decision::{Decision, DecisionContext, DecisionEngine, ResponseStrategy};
pub use escalation::{EmergencyResourceResolver, EscalationDecision, EscalationManager, ReviewQueue};
pub use pipeline::{EvaluationRequest, SafetyEvaluation, SafetyPipeline};
pub use risk::{RiskAssessment, RiskScoringEngine};
pub use stability::{StabilityContext, StabilityEvaluation, StabilityGate, StabilityState};
pub use types::*;
pub use validator::{SafetyResult, SafetyValidator};
