//! Mock provider implementation for testing and local runs.

use super::{FinishReason, ProviderError, ProviderResponse, TextProvider};
use crate::models::ModelPart;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// What the mock answers with.
#[derive(Debug, Clone)]
enum MockBehavior {
    /// Echo the first text part back.
    Echo,
    Respond(String),
    Fail(String),
}

/// Mock text provider that records every call it receives.
pub struct MockTextProvider {
    enabled: bool,
    behavior: MockBehavior,
    delay: Duration,
    calls: Mutex<Vec<Vec<ModelPart>>>,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            behavior: MockBehavior::Echo,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `text`.
    pub fn with_response(text: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Respond(text.into()),
            ..Self::new(true)
        }
    }

    /// Always fail with an API error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Fail(message.into()),
            ..Self::new(true)
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Parts of every call made so far, in arrival order.
    pub fn calls(&self) -> Vec<Vec<ModelPart>> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(&self, parts: &[ModelPart]) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(parts.to_vec());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let text = match &self.behavior {
            MockBehavior::Echo => format!(
                "Mock response for: {}",
                parts.iter().find_map(ModelPart::as_text).unwrap_or_default()
            ),
            MockBehavior::Respond(text) => text.clone(),
            MockBehavior::Fail(message) => return Err(ProviderError::ApiError(message.clone())),
        };

        let input_tokens = parts.iter().map(ModelPart::len).sum::<usize>() as i32 / 4;

        Ok(ProviderResponse {
            text,
            input_tokens,
            output_tokens: 10,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ))
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_first_text_part() {
        let provider = MockTextProvider::new(true);
        let response = provider
            .generate(&[
                ModelPart::inline_data(vec![0; 4], "image/png"),
                ModelPart::text("hello"),
            ])
            .await
            .unwrap();

        assert_eq!(response.text, "Mock response for: hello");
    }

    #[tokio::test]
    async fn records_calls() {
        let provider = MockTextProvider::with_response("world");
        provider.generate(&[ModelPart::text("hello")]).await.unwrap();

        assert_eq!(provider.calls(), vec![vec![ModelPart::text("hello")]]);
    }

    #[tokio::test]
    async fn failing_mock_returns_api_error() {
        let provider = MockTextProvider::failing("quota exceeded");
        let err = provider.generate(&[ModelPart::text("x")]).await.unwrap_err();

        assert!(matches!(err, ProviderError::ApiError(msg) if msg == "quota exceeded"));
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn disabled_mock_is_not_configured() {
        let provider = MockTextProvider::new(false);
        assert!(provider.health_check().await.is_err());
        assert!(matches!(
            provider.generate(&[ModelPart::text("x")]).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
