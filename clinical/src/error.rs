//! Contract violations detected on incoming assessments.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f32 },

    #[error("severity probabilities sum to {sum}, expected ~1.0")]
    ProbabilitySum { sum: f32 },

    #[error("critical severity without crisis protocol flag")]
    CrisisFlagMissing,

    #[error("uncertain assessment without uncertainty reasons")]
    UncertaintyUnreported,
}

pub type Result<T> = std::result::Result<T, ContractError>;
