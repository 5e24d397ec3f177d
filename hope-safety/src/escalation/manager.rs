//! Escalation decisions and response composition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::escalation::resources::EmergencyResourceResolver;
use crate::risk::RiskAssessment;
use crate::types::{EscalationAction, ResponseTone, RiskLevel};

const ELEVATED_PREFIX: &str = "I hear you, and I want you to know that what you're feeling is valid. ";
const HIGH_PREFIX: &str = "I'm really glad you're sharing this with me. What you're going through sounds \
incredibly difficult, and I want to make sure you have the support you need. ";
const CRITICAL_PREFIX: &str = "I hear you, and I'm concerned about what you're sharing. Your safety matters deeply. ";
const PROFESSIONAL_HELP_SUFFIX: &str = "\n\nPlease consider reaching out to a mental health professional or \
someone you trust. You don't have to go through this alone.";

/// How the outgoing response must be shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseModifications {
    pub tone: ResponseTone,
    pub include_resources: bool,
    pub encourage_professional_help: bool,
    pub keep_brief: bool,
    pub crisis_mode: bool,
    pub acknowledge_uncertainty: bool,
}

impl ResponseModifications {
    pub fn for_level(level: RiskLevel) -> Self {
        let (tone, include_resources, encourage_professional_help, keep_brief, crisis_mode) = match level {
            RiskLevel::Low => (ResponseTone::Warm, false, false, false, false),
            RiskLevel::Elevated => (ResponseTone::Calm, false, true, false, false),
            RiskLevel::High => (ResponseTone::Calm, true, true, true, false),
            RiskLevel::Critical => (ResponseTone::Direct, true, true, true, true),
        };
        Self {
            tone,
            include_resources,
            encourage_professional_help,
            keep_brief,
            crisis_mode,
            acknowledge_uncertainty: false,
        }
    }
}

/// Audit record of a risk increase or sustained high risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub event_id: Uuid,
    pub session_id: Option<Uuid>,
    pub risk_assessment_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub previous_level: RiskLevel,
    pub new_level: RiskLevel,
    pub actions_taken: Vec<EscalationAction>,
    /// Names of the resources shown to the user
    pub resources_provided: Vec<String>,
    pub response_was_modified: bool,
}

/// Output of [`EscalationManager::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationDecision {
    /// Level rose relative to the session's previous level
    pub should_escalate: bool,
    pub current_level: RiskLevel,
    pub previous_level: Option<RiskLevel>,
    pub actions: Vec<EscalationAction>,
    pub modifications: ResponseModifications,
    pub resources_to_include: Option<String>,
    pub event: Option<EscalationEvent>,
}

/// Turns risk assessments into response modifications and escalation events.
#[derive(Debug, Clone)]
pub struct EscalationManager {
    resolver: Arc<EmergencyResourceResolver>,
}

impl EscalationManager {
    pub fn new(resolver: Arc<EmergencyResourceResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &EmergencyResourceResolver {
        &self.resolver
    }

    /// A rise relative to a known previous level.
    pub fn should_escalate(current: RiskLevel, previous: Option<RiskLevel>) -> bool {
        previous.is_some_and(|previous| current > previous)
    }

    pub fn evaluate(
        &self,
        risk: &RiskAssessment,
        country_code: &str,
        previous_level: Option<RiskLevel>,
    ) -> EscalationDecision {
        let level = risk.risk_level;
        let should_escalate = Self::should_escalate(level, previous_level);
        let actions = EscalationAction::for_level(level);

        let mut modifications = ResponseModifications::for_level(level);
        modifications.acknowledge_uncertainty = risk.has_uncertainty;

        let resources_to_include = (level >= RiskLevel::High).then(|| {
            self.resolver
                .format_crisis_message(country_code, level >= RiskLevel::Critical)
        });

        // Sustained high risk is recorded even without a transition
        let event = (should_escalate || level >= RiskLevel::High).then(|| {
            let event = EscalationEvent {
                event_id: Uuid::new_v4(),
                session_id: risk.session_id,
                risk_assessment_id: risk.clinical_assessment_id,
                timestamp: Utc::now(),
                previous_level: previous_level.unwrap_or(RiskLevel::Low),
                new_level: level,
                actions_taken: actions.clone(),
                resources_provided: if resources_to_include.is_some() {
                    self.resolver.listed_resource_names(country_code)
                } else {
                    Vec::new()
                },
                response_was_modified: level > RiskLevel::Low,
            };
            warn!(
                event_id = %event.event_id,
                from = %event.previous_level,
                to = %event.new_level,
                transition = should_escalate,
                "Escalation event recorded"
            );
            event
        });

        debug!(level = %level, escalate = should_escalate, "Escalation evaluated");

        EscalationDecision {
            should_escalate,
            current_level: level,
            previous_level,
            actions,
            modifications,
            resources_to_include,
            event,
        }
    }

    pub fn response_prefix(level: RiskLevel) -> &'static str {
        match level {
            RiskLevel::Low => "",
            RiskLevel::Elevated => ELEVATED_PREFIX,
            RiskLevel::High => HIGH_PREFIX,
            RiskLevel::Critical => CRITICAL_PREFIX,
        }
    }

    /// Level-specific suffix, with the resource block appended when given.
    pub fn response_suffix(level: RiskLevel, resources: Option<&str>) -> String {
        match level {
            RiskLevel::Low | RiskLevel::Elevated => String::new(),
            RiskLevel::High | RiskLevel::Critical => {
                let mut suffix = PROFESSIONAL_HELP_SUFFIX.to_string();
                if let Some(resources) = resources {
                    suffix.push_str("\n\n");
                    suffix.push_str(resources);
                }
                suffix
            }
        }
    }

    /// `prefix + body + suffix`. The body is always kept.
    pub fn modify_response(&self, body: &str, decision: &EscalationDecision) -> String {
        Self::compose(body, decision.current_level, decision.resources_to_include.as_deref())
    }

    pub(crate) fn compose(body: &str, level: RiskLevel, resources: Option<&str>) -> String {
        let prefix = Self::response_prefix(level);
        let suffix = Self::response_suffix(level, resources);
        format!("{}{}{}", prefix, body.trim(), suffix).trim().to_string()
    }
}

impl Default for EscalationManager {
    fn default() -> Self {
        Self::new(Arc::new(EmergencyResourceResolver::builtin()))
    }
}
