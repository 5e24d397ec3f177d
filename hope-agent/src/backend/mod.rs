//! Text backend abstraction layer.
//!
//! Production providers implement [`TextBackend`]; [`MockBackend`] covers tests,
//! including slow and failing providers.

pub mod mock;
pub mod traits;

pub use mock::MockBackend;
pub use traits::{CompletionRequest, CompletionResponse, GenerationError, TextBackend};
