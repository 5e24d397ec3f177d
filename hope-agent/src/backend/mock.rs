//! Mock text backend for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::traits::*;

/// Mock backend for testing.
///
/// Can be made slow (to exercise timeouts) or failing (to exercise the
/// circuit breaker).
pub struct MockBackend {
    model_id: String,
    available: AtomicBool,
    response_content: String,
    delay: Option<Duration>,
    failure: Option<GenerationError>,
    call_count: AtomicU32,
}

impl MockBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            available: AtomicBool::new(true),
            response_content: "Mock response".to_string(),
            delay: None,
            failure: None,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with `error`.
    pub fn with_failure(mut self, error: GenerationError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl TextBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, GenerationError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(GenerationError::Unavailable("Mock backend disabled".to_string()));
        }

        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        // Rough token estimate
        let prompt_tokens: u32 = request.outbound_text().map(|t| t.len() as u32 / 4).sum();
        let completion_tokens = self.response_content.len() as u32 / 4;

        Ok(CompletionResponse {
            content: self.response_content.clone(),
            finish_reason: FinishReason::Stop,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend() {
        let backend = MockBackend::new("test-model").with_response("You did well.");

        assert!(backend.is_available().await);
        assert_eq!(backend.call_count(), 0);

        let response = backend.complete(CompletionRequest::user("Hi")).await.unwrap();

        assert_eq!(response.content, "You did well.");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let backend = MockBackend::new("test-model").with_available(false);

        assert!(!backend.is_available().await);
        assert!(backend.complete(CompletionRequest::user("Hi")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let backend =
            MockBackend::default().with_failure(GenerationError::RequestFailed("boom".to_string()));
        let result = backend.complete(CompletionRequest::user("Hi")).await;
        assert!(matches!(result, Err(GenerationError::RequestFailed(_))));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_delay() {
        let backend = MockBackend::default().with_delay(Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        backend.complete(CompletionRequest::user("Hi")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_blocking_call_with_tokio_test() {
        let backend = MockBackend::default().with_response("ok");
        let response = tokio_test::block_on(backend.complete(CompletionRequest::user("Hi"))).unwrap();
        assert_eq!(response.content, "ok");
    }
}
