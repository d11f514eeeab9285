//! Completion service integrations

mod gemini;
mod retry;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::GenerationSettings;

pub use gemini::GeminiProvider;
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Completion API key is not configured")]
    MissingApiKey,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API call failed: {status} - {message}")]
    Http { status: u16, message: String },

    #[error("Invalid API response structure: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Whether the service asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CompletionError::Http { status: 429, .. })
    }

    /// Request never reached the service or came back with a non-2xx status
    pub fn is_network(&self) -> bool {
        matches!(self, CompletionError::Request(_) | CompletionError::Http { .. })
    }
}

/// A text-completion backend: prompt in, generated text out
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Completes with the provider's configured generation parameters
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Completes with explicit generation parameters. Backends without
    /// tunable sampling fall back to `complete`.
    async fn complete_with(&self, prompt: &str, generation: &GenerationSettings) -> Result<String, CompletionError> {
        let _ = generation;
        self.complete(prompt).await
    }
}
