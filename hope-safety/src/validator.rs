//! Response safety validator.
//!
//! Last gate before any text reaches a user. Two pattern tiers:
//!
//! - **Hard constraints** (diagnosis claims, medication and dosage, steering
//!   away from professional help, cure promises, dismissive language). Any
//!   match blocks the response and substitutes [`FALLBACK_RESPONSE`].
//! - **Soft filters** (excessive certainty, comparative minimizing). Matches
//!   are stripped in place.
//!
//! Crisis-context responses missing a hotline or professional-help reference
//! get a resource appendix. Output is never empty and never carries a hard
//! constraint match. Matched substrings are never stored or logged.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::ValidatorConfig;

/// Substituted for any blocked response.
pub const FALLBACK_RESPONSE: &str = "I hear you, and I want to make sure you get the best support possible. \
What you're experiencing is real and valid. \
If you're in crisis, please reach out to the 988 Suicide & Crisis Lifeline by calling or texting 988. \
A trained counselor can provide immediate support. \
I'm here to listen whenever you need.";

/// Appended to crisis responses lacking required elements when no
/// jurisdiction-specific text is supplied.
pub const DEFAULT_CRISIS_APPENDIX: &str = "---\n\
**If you're in crisis or having thoughts of self-harm:**\n\
• **988 Suicide & Crisis Lifeline**: Call or text 988 (US)\n\
• **Crisis Text Line**: Text HOME to 741741\n\
• **Emergency**: Call 911 or go to your nearest emergency room\n\
You don't have to face this alone. Professional support is available 24/7.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    EmptyResponse,
    MedicalDiagnosis,
    MedicationAdvice,
    MedicationRecommendation,
    ReplaceTherapy,
    GuaranteeCure,
    Dismissive,
    ExcessiveCertainty,
    ComparativeMinimizing,
    MissingCrisisElements,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::MedicalDiagnosis => "MEDICAL_DIAGNOSIS",
            Self::MedicationAdvice => "MEDICATION_ADVICE",
            Self::MedicationRecommendation => "MEDICATION_RECOMMENDATION",
            Self::ReplaceTherapy => "REPLACE_THERAPY",
            Self::GuaranteeCure => "GUARANTEE_CURE",
            Self::Dismissive => "DISMISSIVE",
            Self::ExcessiveCertainty => "EXCESSIVE_CERTAINTY",
            Self::ComparativeMinimizing => "COMPARATIVE_MINIMIZING",
            Self::MissingCrisisElements => "MISSING_CRISIS_ELEMENTS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Response was modified and delivered
    Warning,
    /// Response was replaced with the fallback
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyViolation {
    pub rule_id: RuleId,
    pub description: String,
    pub severity: ViolationSeverity,
}

impl SafetyViolation {
    fn new(rule_id: RuleId, description: impl Into<String>, severity: ViolationSeverity) -> Self {
        Self {
            rule_id,
            description: description.into(),
            severity,
        }
    }
}

/// Outcome of validating one candidate response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyResult {
    /// No blocking violation was found
    pub is_safe: bool,
    pub original_response: String,
    /// Text to deliver. Never empty.
    pub filtered_response: String,
    pub violations: Vec<SafetyViolation>,
    pub was_modified: bool,
    pub blocked: bool,
    /// A crisis resource appendix was added
    pub crisis_elements_appended: bool,
}

impl SafetyResult {
    fn blocked(original: &str, violations: Vec<SafetyViolation>) -> Self {
        let rules: Vec<&str> = violations.iter().map(|v| v.rule_id.as_str()).collect();
        warn!(rules = ?rules, "Response blocked by safety validator");
        Self {
            is_safe: false,
            original_response: original.to_string(),
            filtered_response: FALLBACK_RESPONSE.to_string(),
            violations,
            was_modified: true,
            blocked: true,
            crisis_elements_appended: false,
        }
    }

    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.violations.iter().map(|v| v.rule_id).collect()
    }

    pub fn warning_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Warning)
            .count()
    }
}

struct Rule {
    id: RuleId,
    description: &'static str,
    regex: Regex,
}

fn rule(id: RuleId, description: &'static str, source: &str) -> Rule {
    Rule {
        id,
        description,
        regex: Regex::new(source).expect("valid validator pattern"),
    }
}

static HARD_CONSTRAINTS: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            RuleId::MedicalDiagnosis,
            "Response contains medical diagnosis",
            r"(?i)\byou\s+(have|are\s+suffering\s+from|are\s+experiencing)\s+(an?\s+)?(panic\s+disorder|anxiety\s+disorder|depression|ptsd|bipolar|schizophrenia|ocd|mental\s+illness)\b",
        ),
        rule(
            RuleId::MedicationAdvice,
            "Response contains medication dosage advice",
            r"(?i)\b(take|try|consider)\s+(\d+(\.\d+)?\s*)?(mg|milligrams?|pills?|tablets?|doses?)\b|\b\d+(\.\d+)?\s*(mg|milligrams?)\b",
        ),
        rule(
            RuleId::MedicationRecommendation,
            "Response recommends specific medication",
            r"(?i)\b(xanax|valium|ativan|klonopin|prozac|zoloft|lexapro|benzodiazepines?|ssris?|antidepressants?|anti-anxiety|anxiolytics?)\b",
        ),
        rule(
            RuleId::ReplaceTherapy,
            "Response discourages professional help",
            r"(?i)\b(don't\s+need|no\s+need\s+for|instead\s+of|better\s+than)\s+(a\s+)?(therapy|therapists?|doctors?|professionals?|psychiatrists?)\b",
        ),
        rule(
            RuleId::GuaranteeCure,
            "Response promises cure",
            r"(?i)\b(will|can|going\s+to)\s+(cure|fix|heal|eliminate)\s+(your|the)\s+(anxiety|panic|depression|condition)\b",
        ),
        rule(
            RuleId::Dismissive,
            "Response is dismissive of user's experience",
            r"(?i)\b(calm\s+down|relax|stop\s+worrying|get\s+over\s+it|it's\s+(all\s+)?in\s+your\s+head|don't\s+be\s+(so\s+)?dramatic)\b",
        ),
    ]
});

static SOFT_FILTERS: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            RuleId::ExcessiveCertainty,
            "Response contains excessive certainty",
            r"(?i)\b(definitely|certainly|absolutely|guaranteed)\b|\b100%",
        ),
        rule(
            RuleId::ComparativeMinimizing,
            "Response minimizes by comparison",
            r"(?i)\b(others\s+have\s+it\s+worse|could\s+be\s+worse|at\s+least)\b",
        ),
    ]
});

static HOTLINE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b988\b|crisis\s*(line|hotline)|suicide\s*(prevention|hotline)|\bhotline\b")
        .expect("valid hotline pattern")
});

static PROFESSIONAL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(professional|therapist|counselor|doctor|emergency)").expect("valid professional pattern")
});

static INJECTION_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("ignore_instructions", r"(?i)\bignore\s+(all\s+)?(previous|above|all|prior)\s+(instructions|rules)"),
        ("disregard_instructions", r"(?i)\bdisregard\s+(your|the|all)\s+(instructions|guidelines|rules)"),
        ("persona_swap", r"(?i)\bpretend\s+(you're|you\s+are|to\s+be)\s+(a\s+different|another)"),
        ("prompt_markup", r"(?i)\[\[INST\]\]|<<SYS>>"),
    ]
    .into_iter()
    .map(|(name, source)| (name, Regex::new(source).expect("valid injection pattern")))
    .collect()
});

// "you are now <role>" is a role swap unless it describes the user's state
static YOU_ARE_NOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\byou\s+are\s+now\s+(\w+)").expect("valid role pattern"));

static EXCESS_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));
static EXCESS_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("valid space pattern"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +([.,;:!?])").expect("valid punctuation pattern"));

/// Pattern-based validator for candidate responses and outbound prompts.
#[derive(Debug, Clone, Default)]
pub struct SafetyValidator {
    strict_mode: bool,
}

impl SafetyValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ValidatorConfig) -> Self {
        Self {
            strict_mode: config.strict_mode,
        }
    }

    /// In strict mode a soft-filter match blocks like a hard constraint.
    pub fn strict() -> Self {
        Self { strict_mode: true }
    }

    pub fn is_strict(&self) -> bool {
        self.strict_mode
    }

    /// Validate with the default crisis appendix.
    pub fn validate(&self, response: &str, crisis_context: bool) -> SafetyResult {
        self.validate_with_appendix(response, crisis_context, None)
    }

    /// Validate, using `appendix` (e.g. a jurisdiction resource block) when a
    /// crisis response lacks required elements.
    pub fn validate_with_appendix(
        &self,
        response: &str,
        crisis_context: bool,
        appendix: Option<&str>,
    ) -> SafetyResult {
        if response.trim().is_empty() {
            return SafetyResult::blocked(
                response,
                vec![SafetyViolation::new(
                    RuleId::EmptyResponse,
                    "Response is empty",
                    ViolationSeverity::Block,
                )],
            );
        }

        let normalized = response.replace('\u{2019}', "'");

        let hard = hard_violations(&normalized);
        if !hard.is_empty() {
            return SafetyResult::blocked(response, hard);
        }

        let mut violations = Vec::new();
        let mut filtered = normalized;
        for rule in SOFT_FILTERS.iter() {
            if rule.regex.is_match(&filtered) {
                let severity = if self.strict_mode {
                    ViolationSeverity::Block
                } else {
                    ViolationSeverity::Warning
                };
                violations.push(SafetyViolation::new(rule.id, rule.description, severity));
                filtered = rule.regex.replace_all(&filtered, "").into_owned();
            }
        }

        if self.strict_mode && !violations.is_empty() {
            return SafetyResult::blocked(response, violations);
        }

        filtered = clean_response(&filtered);

        // Stripping can splice a hard-constraint phrase back together
        let spliced = hard_violations(&filtered);
        if !spliced.is_empty() {
            violations.extend(spliced);
            return SafetyResult::blocked(response, violations);
        }

        if filtered.is_empty() || !filtered.chars().any(char::is_alphanumeric) {
            violations.push(SafetyViolation::new(
                RuleId::EmptyResponse,
                "Response is empty after filtering",
                ViolationSeverity::Block,
            ));
            return SafetyResult::blocked(response, violations);
        }

        let mut crisis_elements_appended = false;
        if crisis_context {
            let missing = missing_crisis_elements(&filtered);
            if !missing.is_empty() {
                filtered.push_str("\n\n");
                filtered.push_str(appendix.unwrap_or(DEFAULT_CRISIS_APPENDIX).trim());
                crisis_elements_appended = true;
                violations.push(SafetyViolation::new(
                    RuleId::MissingCrisisElements,
                    format!("Added missing crisis elements: {}", missing.join(", ")),
                    ViolationSeverity::Warning,
                ));
            }
        }

        let was_modified = filtered != response;
        if was_modified {
            info!(
                warnings = violations.len(),
                crisis_appended = crisis_elements_appended,
                "Response modified by safety validator"
            );
        } else {
            debug!("Response passed safety validation unchanged");
        }

        SafetyResult {
            is_safe: true,
            original_response: response.to_string(),
            filtered_response: filtered,
            violations,
            was_modified,
            blocked: false,
            crisis_elements_appended,
        }
    }

    /// Screen an outbound prompt for injection attempts.
    ///
    /// Returns false when the prompt must not be sent.
    pub fn validate_prompt(&self, prompt: &str) -> bool {
        let normalized = prompt.replace('\u{2019}', "'");

        if let Some((name, _)) = INJECTION_PATTERNS.iter().find(|(_, re)| re.is_match(&normalized)) {
            warn!(pattern = name, "Prompt injection attempt detected");
            return false;
        }

        let role_swap = YOU_ARE_NOW.captures_iter(&normalized).any(|caps| {
            let next = caps[1].to_ascii_lowercase();
            next != "feeling" && next != "experiencing"
        });
        if role_swap {
            warn!(pattern = "role_swap", "Prompt injection attempt detected");
            return false;
        }

        true
    }
}

fn hard_violations(text: &str) -> Vec<SafetyViolation> {
    HARD_CONSTRAINTS
        .iter()
        .filter(|rule| rule.regex.is_match(text))
        .map(|rule| SafetyViolation::new(rule.id, rule.description, ViolationSeverity::Block))
        .collect()
}

fn missing_crisis_elements(text: &str) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !HOTLINE_REFERENCE.is_match(text) {
        missing.push("CRISIS_HOTLINE");
    }
    if !PROFESSIONAL_REFERENCE.is_match(text) {
        missing.push("PROFESSIONAL_HELP");
    }
    missing
}

fn clean_response(text: &str) -> String {
    let text = EXCESS_NEWLINES.replace_all(text, "\n\n");
    let text = EXCESS_SPACES.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n").trim().to_string()
}
