//! Model-call seam consumed by the expert dispatcher.
//!
//! The client is model-bound and transport-owned by the caller: it either
//! returns a structured response or raises within bounded time. Retry and
//! backoff live outside this crate.

use async_trait::async_trait;

use super::ExpertCallError;

/// One outbound model call.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_completion_tokens: u32,
    /// Ask the service for a JSON-constrained response where supported.
    pub expect_json: bool,
}

/// The service's response plus its reported token usage.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Abstraction over the external model service (allows mocking).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, ExpertCallError>;
}
