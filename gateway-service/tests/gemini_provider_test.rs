//! Gemini REST client tests against a local mock server.

mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use gateway_service::config::ProviderKind;
use gateway_service::models::ModelPart;
use gateway_service::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use gateway_service::services::providers::{ProviderError, TextProvider};
use gateway_service::startup::Application;
use secrecy::Secret;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.5-flash";
const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

fn provider(server: &MockServer, api_key: &str) -> GeminiTextProvider {
    GeminiTextProvider::new(GeminiConfig {
        api_key: Secret::new(api_key.to_string()),
        model: MODEL.to_string(),
        api_base: format!("{}/v1beta", server.uri()),
        timeout: Duration::from_secs(5),
    })
    .expect("Failed to build provider")
}

fn candidate(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 7, "candidatesTokenCount": 3 }
    })
}

async fn request_body(server: &MockServer) -> Value {
    let requests = server
        .received_requests()
        .await
        .expect("Request recording disabled");
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).unwrap()
}

#[tokio::test]
async fn sends_parts_in_order_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("A cat on a mat.")))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = vec![0x89, 0x50, 0x4e, 0x47];
    let response = provider(&server, "test-key")
        .generate(&[
            ModelPart::text("describe"),
            ModelPart::inline_data(bytes.clone(), "image/png"),
        ])
        .await
        .unwrap();

    assert_eq!(response.text, "A cat on a mat.");
    assert_eq!(response.input_tokens, 7);
    assert_eq!(response.output_tokens, 3);

    let body = request_body(&server).await;
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "describe");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(parts[1]["inlineData"]["data"], STANDARD.encode(&bytes));
}

#[tokio::test]
async fn api_key_is_not_sent_in_the_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("ok")))
        .mount(&server)
        .await;

    provider(&server, "secret-key")
        .generate(&[ModelPart::text("hi")])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].url.query().is_none());
}

#[tokio::test]
async fn rate_limit_maps_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = provider(&server, "test-key")
        .generate(&[ModelPart::text("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::RateLimited));
}

#[tokio::test]
async fn server_error_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let err = provider(&server, "test-key")
        .generate(&[ModelPart::text("hi")])
        .await
        .unwrap_err();
    match err {
        ProviderError::ApiError(message) => assert!(message.contains("backend unavailable")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn health_check_fetches_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1beta/models/gemini-2.5-flash"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "models/gemini-2.5-flash" })))
        .expect(1)
        .mount(&server)
        .await;

    provider(&server, "test-key").health_check().await.unwrap();
}

#[tokio::test]
async fn health_check_without_key_is_not_configured() {
    let server = MockServer::start().await;

    let err = provider(&server, "").health_check().await.unwrap_err();
    assert!(matches!(err, ProviderError::NotConfigured(_)));
}

#[tokio::test]
async fn generate_text_relays_model_output_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("world")))
        .expect(1)
        .mount(&server)
        .await;

    let upload_dir = tempfile::tempdir().unwrap();
    let mut config = common::test_config(upload_dir.path());
    config.provider = ProviderKind::Gemini;
    config.models.text_model = MODEL.to_string();
    config.google.api_key = Secret::new("test-key".to_string());
    config.google.api_base = format!("{}/v1beta", server.uri());

    let app = Application::build(config).await.unwrap();
    let address = format!("http://127.0.0.1:{}", app.port());
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let response = reqwest::Client::new()
        .post(format!("{}/generate-text", address))
        .json(&json!({ "prompt": "hello" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "output": "world" }));

    let sent = request_body(&server).await;
    assert_eq!(sent["contents"][0]["parts"], json!([{ "text": "hello" }]));
}
