//! Raw-text crisis pre-screen.
//!
//! Weighted phrase patterns over the user's own words. Matched text is never
//! stored in the produced signals.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{RiskSignal, SignalCategory, SignalSource};

const MATCH_CONFIDENCE: f32 = 0.9;

struct CrisisPattern {
    name: &'static str,
    description: &'static str,
    weight: f32,
    regex: Regex,
}

fn pattern(name: &'static str, description: &'static str, weight: f32, source: &str) -> CrisisPattern {
    CrisisPattern {
        name,
        description,
        weight,
        regex: Regex::new(source).expect("valid crisis pattern"),
    }
}

static PATTERNS: LazyLock<Vec<CrisisPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            "direct_self_harm_intent",
            "Direct statement of intent to self-harm",
            0.40,
            r"(?i)\b(want|going|plan|planning|thinking about|considering)\s+(to\s+)?(hurt|harm|kill|end)\s+(myself|my life|it all)\b",
        ),
        pattern(
            "suicide_ideation",
            "Wish to be dead or not exist",
            0.35,
            r"(?i)\b(want|wish|rather)\s+(to\s+)?(be\s+)?dead\b|\b(don't|do not)\s+want\s+to\s+(live|be here|exist)\b|\bwish\s+i\s+(was|were)\s+(never\s+)?born\b",
        ),
        pattern(
            "method_reference",
            "Reference to a means of self-harm",
            0.25,
            r"(?i)\b(pills|overdose|cut|cutting|jump|jumping|hanging|gun|weapon)\b",
        ),
        pattern(
            "hopelessness_expression",
            "Expression of hopelessness",
            0.20,
            r"(?i)\bno\s+(way\s+out|hope|point|reason)\b|\bnever\s+get\s+better\b|\bcan't\s+(go\s+on|take\s+(it|this)\s+anymore)\b|\bgive\s+up\b",
        ),
        pattern(
            "farewell_language",
            "Farewell or finality language",
            0.30,
            r"(?i)\bgoodbye\s+forever\b|\bwon't\s+be\s+(here|around|a\s+problem)\b|\bbetter\s+off\s+without\s+me\b|\bsaying\s+goodbye\b",
        ),
        pattern(
            "burden_expression",
            "Feeling like a burden to others",
            0.20,
            r"(?i)\b(burden|bother|problem)\s+(to|for)\s+(everyone|you|them|others)\b|\beveryone\b.*\bbetter\b.*\bwithout\s+me\b",
        ),
    ]
});

/// Pattern-based crisis analyzer over raw text.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinguisticCrisisAnalyzer;

impl LinguisticCrisisAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// One linguistic signal per matched pattern; empty for blank text.
    pub fn analyze(&self, text: &str) -> Vec<RiskSignal> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Typographic apostrophes would otherwise dodge the contractions
        let normalized = text.replace('\u{2019}', "'");

        PATTERNS
            .iter()
            .filter(|p| p.regex.is_match(&normalized))
            .map(|p| {
                RiskSignal::new(
                    SignalCategory::Linguistic,
                    p.name,
                    p.description,
                    p.weight,
                    MATCH_CONFIDENCE,
                    SignalSource::LinguisticAnalyzer,
                )
            })
            .collect()
    }
}
