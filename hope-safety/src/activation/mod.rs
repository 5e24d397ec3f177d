//! Activation of the generative recovery feature.
//!
//! [`ActivationGate`] decides whether generation may run for a session;
//! [`RecoverySupervisor`] runs it under that decision with a hard timeout
//! and a static fallback.

pub mod gate;
pub mod supervisor;

pub use gate::{ActivationDecision, ActivationGate, DenialReason, MIN_STABILITY_STATE};
pub use supervisor::{GenerationOutcome, MessageSource, RecoveryMessage, RecoverySupervisor};
