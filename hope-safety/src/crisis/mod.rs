//! Crisis detection.
//!
//! Two independent detectors:
//!
//! - [`CrisisDetector`] reads the structured clinical assessment
//! - [`LinguisticCrisisAnalyzer`] reads raw text as a cross-check when the
//!   classifier path is degraded, or as corroboration
//!
//! Neither instructs escalation. They only supply signals; no single signal
//! or single category may drive a crisis-level decision.

pub mod detector;
pub mod linguistic;

pub use detector::{CrisisDetectionResult, CrisisDetector};
pub use linguistic::LinguisticCrisisAnalyzer;
