//! Clinical assessment contract for the Hope panic-support system.
//!
//! A [`ClinicalAssessment`] is the structured description of a single user
//! message produced by the upstream classifiers: severity, emotion profile,
//! distress indicators and trigger analysis. It is the only input the safety
//! and decision core is allowed to reason about.
//!
//! # Key Components
//!
//! - [`PanicSeverity`]: Ordered severity tiers (NONE < MILD < MODERATE < SEVERE < CRITICAL)
//! - [`SeverityClassification`]: Predicted tier plus its probability distribution
//! - [`EmotionProfile`]: Multi-label emotion scores with a derived dominant emotion
//! - [`DistressIndicators`]: Distress evidence grouped by domain
//! - [`ClinicalAssessment`]: The normalized record handed to risk and decision logic
//!
//! # Example
//!
//! ```
//! use clinical::{ClinicalAssessment, PanicSeverity, SeverityClassification};
//!
//! let assessment = ClinicalAssessment::builder(SeverityClassification::point(PanicSeverity::Critical, 0.9))
//!     .confidence(0.85)
//!     .build();
//!
//! assert!(assessment.requires_crisis_protocol);
//! ```

pub mod assessment;
pub mod distress;
pub mod emotion;
pub mod error;
pub mod intervention;
pub mod severity;
pub mod triggers;

pub use assessment::*;
pub use distress::*;
pub use emotion::*;
pub use error::{ContractError, Result};
pub use intervention::PanicIntervention;
pub use severity::*;
pub use triggers::*;

/// Clamp a score into `[0, 1]`, mapping NaN to `nan_as`.
///
/// Callers pick `nan_as` so that a garbage value resolves toward the more
/// cautious interpretation for that field.
pub fn clamp_unit(value: f32, nan_as: f32) -> f32 {
    if value.is_nan() {
        nan_as
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7, 0.0), 1.0);
        assert_eq!(clamp_unit(-0.2, 0.0), 0.0);
        assert_eq!(clamp_unit(0.4, 0.0), 0.4);
        assert_eq!(clamp_unit(f32::NAN, 1.0), 1.0);
    }
}
