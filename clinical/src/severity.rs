//! Severity and urgency tiers.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Panic severity as classified from a user message.
///
/// Ordered so that comparisons read naturally (`severity >= PanicSeverity::Severe`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PanicSeverity {
    /// No panic indicators
    None = 0,
    /// Mild anxiety, manageable
    Mild = 1,
    /// Noticeable panic symptoms
    Moderate = 2,
    /// Intense panic, needs active support
    Severe = 3,
    /// Crisis level, crisis protocol required
    Critical = 4,
}

impl PanicSeverity {
    /// Numeric tier (0-4)
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::None),
            1 => Some(Self::Mild),
            2 => Some(Self::Moderate),
            3 => Some(Self::Severe),
            4 => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Mild => "MILD",
            Self::Moderate => "MODERATE",
            Self::Severe => "SEVERE",
            Self::Critical => "CRITICAL",
        }
    }

    /// All tiers in ascending order
    pub fn all() -> [Self; 5] {
        [Self::None, Self::Mild, Self::Moderate, Self::Severe, Self::Critical]
    }
}

impl Default for PanicSeverity {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for PanicSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How quickly a response needs to happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Routine = 1,
    Elevated = 2,
    High = 3,
    Emergency = 4,
}

impl UrgencyLevel {
    /// Urgency implied by a severity tier.
    pub fn from_severity(severity: PanicSeverity) -> Self {
        match severity {
            PanicSeverity::None => Self::Routine,
            PanicSeverity::Mild => Self::Elevated,
            PanicSeverity::Moderate => Self::High,
            PanicSeverity::Severe | PanicSeverity::Critical => Self::Emergency,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Emergency => "emergency",
        }
    }
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        Self::Routine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(PanicSeverity::Critical > PanicSeverity::Severe);
        assert!(PanicSeverity::Mild > PanicSeverity::None);
        let all = PanicSeverity::all();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_level_round_trip() {
        for severity in PanicSeverity::all() {
            assert_eq!(PanicSeverity::from_level(severity.level()), Some(severity));
        }
        assert_eq!(PanicSeverity::from_level(9), None);
    }

    #[test]
    fn test_urgency_from_severity() {
        assert_eq!(UrgencyLevel::from_severity(PanicSeverity::None), UrgencyLevel::Routine);
        assert_eq!(UrgencyLevel::from_severity(PanicSeverity::Mild), UrgencyLevel::Elevated);
        assert_eq!(UrgencyLevel::from_severity(PanicSeverity::Moderate), UrgencyLevel::High);
        assert_eq!(UrgencyLevel::from_severity(PanicSeverity::Severe), UrgencyLevel::Emergency);
        assert_eq!(UrgencyLevel::from_severity(PanicSeverity::Critical), UrgencyLevel::Emergency);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PanicSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: PanicSeverity = serde_json::from_str("\"moderate\"").unwrap();
        assert_eq!(parsed, PanicSeverity::Moderate);
    }
}
