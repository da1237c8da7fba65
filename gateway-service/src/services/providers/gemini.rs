//! Gemini AI provider implementation.
//!
//! Calls the `generateContent` REST method with text and inline-data parts
//! and joins the text of the first candidate.

use super::{FinishReason, ProviderError, ProviderResponse, TextProvider};
use crate::models::ModelPart;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the API key, kept out of the URL so it never shows up in errors.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// Gemini text provider.
pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Build the API URL for the given model and method.
    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.api_base, self.config.model, method
        )
    }

    fn build_request(parts: &[ModelPart]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: parts.iter().map(WirePart::from).collect(),
            }],
        }
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn generate(&self, parts: &[ModelPart]) -> Result<ProviderResponse, ProviderError> {
        if parts.is_empty() {
            return Err(ProviderError::InvalidRequest(
                "At least one part is required".to_string(),
            ));
        }

        let request = Self::build_request(parts);
        let url = self.api_url("generateContent");

        tracing::debug!(
            model = %self.config.model,
            part_count = parts.len(),
            payload_bytes = parts.iter().map(ModelPart::len).sum::<usize>(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            if status.as_u16() == 400 {
                return Err(ProviderError::InvalidRequest(error_text));
            }

            return Err(ProviderError::ApiError(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        api_response.into_provider_response()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        // Fetching the model verifies both the key and the model name.
        let url = format!("{}/models/{}", self.config.api_base, self.config.model);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Gemini API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl From<&ModelPart> for WirePart {
    fn from(part: &ModelPart) -> Self {
        match part {
            ModelPart::Text(text) => WirePart::Text { text: text.clone() },
            ModelPart::InlineData { mime_type, .. } => WirePart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: part.encoded_data().unwrap_or_default(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

/// Response parts may carry other payloads (function calls, thoughts); only text is kept.
#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<i32>,
    candidates_token_count: Option<i32>,
}

impl GenerateContentResponse {
    fn into_provider_response(self) -> Result<ProviderResponse, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            tracing::warn!(block_reason = %reason, "Gemini blocked the prompt");
            return Err(ProviderError::ContentFiltered);
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let finish_reason = FinishReason::from_wire(candidate.finish_reason.as_deref());
        if finish_reason == FinishReason::ContentFilter {
            return Err(ProviderError::ContentFiltered);
        }

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let usage = self.usage_metadata.unwrap_or_default();

        Ok(ProviderResponse {
            text,
            input_tokens: usage.prompt_token_count.unwrap_or(0),
            output_tokens: usage.candidates_token_count.unwrap_or(0),
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<ProviderResponse, ProviderError> {
        serde_json::from_value::<GenerateContentResponse>(value)
            .unwrap()
            .into_provider_response()
    }

    #[test]
    fn request_uses_gemini_wire_format() {
        let parts = vec![
            ModelPart::text("describe"),
            ModelPart::inline_data(vec![1, 2, 3], "image/jpeg"),
        ];
        let body = serde_json::to_value(GeminiTextProvider::build_request(&parts)).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "describe" },
                        { "inlineData": { "mimeType": "image/jpeg", "data": "AQID" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn joins_all_text_parts_of_first_candidate() {
        let response = parse(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6 }
        }))
        .unwrap();

        assert_eq!(response.text, "Hello, world");
        assert_eq!(response.input_tokens, 4);
        assert_eq!(response.output_tokens, 2);
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn ignores_non_text_parts() {
        let response = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "functionCall": { "name": "f" } }, { "text": "ok" }] }
            }]
        }))
        .unwrap();
        assert_eq!(response.text, "ok");
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let err = parse(json!({ "candidates": [] })).unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[test]
    fn safety_finish_is_content_filtered() {
        let err = parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] })).unwrap_err();
        assert!(matches!(err, ProviderError::ContentFiltered));
    }

    #[test]
    fn blocked_prompt_is_content_filtered() {
        let err = parse(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap_err();
        assert!(matches!(err, ProviderError::ContentFiltered));
    }
}
