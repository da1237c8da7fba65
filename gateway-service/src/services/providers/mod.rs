//! AI provider abstractions and implementations.
//!
//! Handlers only see the [`TextProvider`] trait, so the Gemini backend can be
//! swapped for the mock in tests and local runs.

pub mod gemini;
pub mod mock;

use crate::models::ModelPart;
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

impl ProviderError {
    /// Short label used for the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::EmptyResponse => "empty_response",
        }
    }
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text, all text parts of the first candidate joined.
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            None | Some("STOP") => FinishReason::Complete,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                FinishReason::ContentFilter
            }
            Some(_) => FinishReason::Other,
        }
    }
}

/// Single-turn text generation from an ordered list of parts.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a text response for the given parts.
    async fn generate(&self, parts: &[ModelPart]) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from_wire(None), FinishReason::Complete);
        assert_eq!(FinishReason::from_wire(Some("STOP")), FinishReason::Complete);
        assert_eq!(FinishReason::from_wire(Some("MAX_TOKENS")), FinishReason::Length);
        assert_eq!(
            FinishReason::from_wire(Some("SAFETY")),
            FinishReason::ContentFilter
        );
        assert_eq!(FinishReason::from_wire(Some("RECITATION")), FinishReason::Other);
    }

    #[test]
    fn error_kinds_are_stable_labels() {
        assert_eq!(ProviderError::RateLimited.kind(), "rate_limited");
        assert_eq!(
            ProviderError::NetworkError("timeout".into()).kind(),
            "network_error"
        );
    }
}
