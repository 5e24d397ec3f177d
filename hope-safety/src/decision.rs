//! Response strategy selection.
//!
//! Runs alongside the risk path on the same clinical assessment. Severity
//! drives strategy, tone, interventions and constraints through exhaustive
//! tables; emotion and trigger context then adjust them. A crisis-protocol
//! assessment always takes the fixed crisis path.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use clinical::{ClinicalAssessment, EmotionCategory, PanicIntervention, PanicSeverity, PanicTrigger};

use crate::types::ResponseTone;

/// Constraints applied to every response.
pub const UNIVERSAL_CONSTRAINTS: [&str; 6] = [
    "NEVER provide medical diagnosis",
    "NEVER prescribe medication or dosages",
    "NEVER claim to be a replacement for professional help",
    "NEVER minimize user's experience",
    "ALWAYS validate user's feelings",
    "ALWAYS use trauma-informed language",
];

const MODERATE_CONSTRAINTS: [&str; 2] = [
    "Keep response focused and concise",
    "Avoid lengthy explanations during crisis",
];

const SEVERE_CONSTRAINTS: [&str; 2] = [
    "Include option for professional help",
    "Use simple, clear language",
];

const CRISIS_CONSTRAINTS: [&str; 3] = [
    "MUST provide crisis hotline number",
    "MUST recommend immediate professional help",
    "Response MUST be clear and actionable",
];

const VOLATILITY_CALM_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStrategy {
    /// Light touch, open the door
    CheckIn,
    /// Validate and offer a tool
    Acknowledge,
    /// Lead a grounding exercise
    Ground,
    /// Structured intervention with a referral option
    Intervene,
    /// Crisis resources first
    Crisis,
}

impl ResponseStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIn => "CHECK_IN",
            Self::Acknowledge => "ACKNOWLEDGE",
            Self::Ground => "GROUND",
            Self::Intervene => "INTERVENE",
            Self::Crisis => "CRISIS",
        }
    }

    pub fn for_severity(severity: PanicSeverity) -> Self {
        match severity {
            PanicSeverity::None => Self::CheckIn,
            PanicSeverity::Mild => Self::Acknowledge,
            PanicSeverity::Moderate => Self::Ground,
            PanicSeverity::Severe => Self::Intervene,
            PanicSeverity::Critical => Self::Crisis,
        }
    }
}

/// Default tone for a severity tier.
pub fn tone_for_severity(severity: PanicSeverity) -> ResponseTone {
    match severity {
        PanicSeverity::None | PanicSeverity::Mild => ResponseTone::Warm,
        PanicSeverity::Moderate | PanicSeverity::Severe => ResponseTone::Calm,
        PanicSeverity::Critical => ResponseTone::Direct,
    }
}

/// Default intervention order for a severity tier, most preferred first.
pub fn interventions_for_severity(severity: PanicSeverity) -> Vec<PanicIntervention> {
    use PanicIntervention::*;
    match severity {
        PanicSeverity::None => vec![],
        PanicSeverity::Mild => vec![Validation, BreathingExercise],
        PanicSeverity::Moderate => vec![BreathingExercise, GroundingTechnique, Validation],
        PanicSeverity::Severe => vec![
            GroundingTechnique,
            BreathingExercise,
            ProgressiveRelaxation,
            ProfessionalReferral,
        ],
        PanicSeverity::Critical => vec![CrisisResources, GroundingTechnique, ProfessionalReferral],
    }
}

/// Accumulated constraints for a severity tier.
pub fn constraints_for_severity(severity: PanicSeverity) -> Vec<String> {
    let (moderate, severe) = match severity {
        PanicSeverity::None | PanicSeverity::Mild => (false, false),
        PanicSeverity::Moderate => (true, false),
        PanicSeverity::Severe | PanicSeverity::Critical => (true, true),
    };

    let mut constraints: Vec<String> = UNIVERSAL_CONSTRAINTS.iter().map(|c| c.to_string()).collect();
    if moderate {
        constraints.extend(MODERATE_CONSTRAINTS.iter().map(|c| c.to_string()));
    }
    if severe {
        constraints.extend(SEVERE_CONSTRAINTS.iter().map(|c| c.to_string()));
    }
    constraints
}

/// Session context the engine decides against.
#[derive(Debug, Clone)]
pub struct DecisionContext<'a> {
    pub assessment: &'a ClinicalAssessment,
    pub user_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub session_message_count: u32,
    pub previous_panic_count: u32,
    /// Intervention this user last reported as helpful
    pub last_successful_intervention: Option<PanicIntervention>,
}

impl<'a> DecisionContext<'a> {
    /// Context carrying the assessment's own identifiers.
    pub fn new(assessment: &'a ClinicalAssessment) -> Self {
        Self {
            assessment,
            user_id: assessment.user_id,
            session_id: assessment.session_id,
            session_message_count: 0,
            previous_panic_count: 0,
            last_successful_intervention: None,
        }
    }

    pub fn with_message_count(mut self, count: u32) -> Self {
        self.session_message_count = count;
        self
    }

    pub fn with_previous_panics(mut self, count: u32) -> Self {
        self.previous_panic_count = count;
        self
    }

    pub fn with_last_successful(mut self, intervention: PanicIntervention) -> Self {
        self.last_successful_intervention = Some(intervention);
        self
    }
}

/// Inputs for response generation. Every field is explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptModifiers {
    pub severity_level: PanicSeverity,
    pub confidence_score: f32,
    pub session_message_count: u32,
    pub is_recurring: bool,
    pub dominant_emotion: Option<EmotionCategory>,
    pub triggers: Vec<PanicTrigger>,
    pub distress_level: f32,
    pub has_uncertainty: bool,
    #[serde(default)]
    pub include_crisis_hotline: bool,
    #[serde(default)]
    pub include_emergency_grounding: bool,
}

impl PromptModifiers {
    fn from_context(context: &DecisionContext<'_>) -> Self {
        let assessment = context.assessment;
        Self {
            severity_level: assessment.predicted_severity(),
            confidence_score: assessment.confidence_score,
            session_message_count: context.session_message_count,
            is_recurring: context.previous_panic_count > 0,
            dominant_emotion: assessment.emotion_profile.dominant_emotion,
            triggers: assessment.trigger_analysis.immediate_triggers.clone(),
            distress_level: assessment.distress_indicators.overall_distress_level,
            has_uncertainty: assessment.has_uncertainty(),
            include_crisis_hotline: false,
            include_emergency_grounding: false,
        }
    }
}

/// How to respond to one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub strategy: ResponseStrategy,
    pub tone: ResponseTone,
    pub primary_intervention: Option<PanicIntervention>,
    pub secondary_interventions: Vec<PanicIntervention>,
    pub response_constraints: Vec<String>,
    pub prompt_modifiers: PromptModifiers,
    /// Crisis resources or a professional referral belong in the response
    pub escalate_to_crisis: bool,
    pub requires_human_review: bool,
}

impl Decision {
    /// All selected interventions in priority order.
    pub fn interventions(&self) -> impl Iterator<Item = PanicIntervention> + '_ {
        self.primary_intervention
            .into_iter()
            .chain(self.secondary_interventions.iter().copied())
    }
}

/// Chooses strategy, tone and interventions from a clinical assessment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, context: &DecisionContext<'_>) -> Decision {
        // Out-of-range scores resolve toward the cautious end first
        let sanitized = context.assessment.clone().sanitized();
        let context = &DecisionContext {
            assessment: &sanitized,
            ..context.clone()
        };
        let assessment = context.assessment;
        if assessment.requires_crisis_protocol || assessment.predicted_severity() >= PanicSeverity::Critical {
            return self.crisis_decision(context);
        }

        let severity = assessment.predicted_severity();
        let strategy = ResponseStrategy::for_severity(severity);
        let tone = self.select_tone(assessment);

        let mut interventions = interventions_for_severity(severity);
        self.reprioritize(&mut interventions, context);
        let mut interventions = interventions.into_iter();

        let decision = Decision {
            strategy,
            tone,
            primary_intervention: interventions.next(),
            secondary_interventions: interventions.collect(),
            response_constraints: constraints_for_severity(severity),
            prompt_modifiers: PromptModifiers::from_context(context),
            escalate_to_crisis: severity >= PanicSeverity::Severe,
            requires_human_review: assessment.requires_human_review,
        };

        debug!(
            strategy = decision.strategy.as_str(),
            tone = decision.tone.as_str(),
            primary = decision.primary_intervention.map(|i| i.as_str()),
            severity = %severity,
            "Decision made"
        );
        decision
    }

    fn crisis_decision(&self, context: &DecisionContext<'_>) -> Decision {
        warn!(
            assessment_id = %context.assessment.assessment_id,
            severity = %context.assessment.predicted_severity(),
            "Crisis protocol decision"
        );

        let mut constraints: Vec<String> = UNIVERSAL_CONSTRAINTS.iter().map(|c| c.to_string()).collect();
        constraints.extend(CRISIS_CONSTRAINTS.iter().map(|c| c.to_string()));

        let mut modifiers = PromptModifiers::from_context(context);
        modifiers.include_crisis_hotline = true;
        modifiers.include_emergency_grounding = true;

        Decision {
            strategy: ResponseStrategy::Crisis,
            tone: ResponseTone::Direct,
            primary_intervention: Some(PanicIntervention::CrisisResources),
            secondary_interventions: vec![
                PanicIntervention::GroundingTechnique,
                PanicIntervention::ProfessionalReferral,
            ],
            response_constraints: constraints,
            prompt_modifiers: modifiers,
            escalate_to_crisis: true,
            requires_human_review: true,
        }
    }

    fn select_tone(&self, assessment: &ClinicalAssessment) -> ResponseTone {
        let base = tone_for_severity(assessment.predicted_severity());
        let profile = &assessment.emotion_profile;

        match profile.dominant_emotion {
            Some(EmotionCategory::Dissociation) => ResponseTone::Direct,
            Some(EmotionCategory::LossOfControl) => ResponseTone::Calm,
            _ if profile.emotional_volatility > VOLATILITY_CALM_THRESHOLD => ResponseTone::Calm,
            _ => base,
        }
    }

    fn reprioritize(&self, interventions: &mut Vec<PanicIntervention>, context: &DecisionContext<'_>) {
        if let Some(helped) = context.last_successful_intervention {
            if let Some(pos) = interventions.iter().position(|i| *i == helped) {
                let item = interventions.remove(pos);
                interventions.insert(0, item);
            }
        }

        // Breathing focus can heighten symptom awareness in health anxiety
        if context
            .assessment
            .trigger_analysis
            .has_immediate(PanicTrigger::HealthAnxiety)
        {
            let grounding = interventions
                .iter()
                .position(|i| *i == PanicIntervention::GroundingTechnique);
            let breathing = interventions
                .iter()
                .position(|i| *i == PanicIntervention::BreathingExercise);
            if let (Some(g), Some(b)) = (grounding, breathing) {
                if g > b {
                    let item = interventions.remove(g);
                    interventions.insert(b, item);
                }
            }
        }
    }
}
