//! Hope Agent - bounded generative text
//!
//! The generative-text collaborator is only ever reached through two things
//! defined here:
//! - A trait-based backend ([`TextBackend`]) so providers can be swapped or mocked
//! - Fixed recovery prompts ([`RecoveryPromptType`]) wrapped in a safety envelope,
//!   each with a static fallback text
//!
//! There is no free-form prompt building. Activation gating, timeouts and
//! output validation live in `hope-safety`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   RecoverySupervisor (hope-safety)      │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ TextBackend │       │ Recovery    │
//! │ (provider / │       │ prompts +   │
//! │  mock)      │       │ fallbacks   │
//! └─────────────┘       └─────────────┘
//! ```

pub mod backend;
pub mod prompt;

pub use backend::traits::{
    CompletionRequest, CompletionResponse, FinishReason, GenerationError, Message, MessageRole, TextBackend, Usage,
};
pub use backend::MockBackend;
pub use prompt::{RecoveryPrompt, RecoveryPromptType, SAFETY_ENVELOPE};
