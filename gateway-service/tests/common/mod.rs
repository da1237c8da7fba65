#![allow(dead_code)]

use gateway_service::config::{
    GatewayConfig, GoogleConfig, ModelConfig, ProviderKind, UploadConfig, DEFAULT_GEMINI_API_BASE,
};
use gateway_service::services::providers::mock::MockTextProvider;
use gateway_service::services::providers::TextProvider;
use gateway_service::startup::Application;
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const IMAGE_FAILURE: &str = "An error occurred while generating text from image.";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub provider: Arc<MockTextProvider>,
    pub upload_dir: TempDir,
    pub client: reqwest::Client,
}

/// Config pointing at a private upload directory, listening on a random port.
pub fn test_config(upload_dir: &Path) -> GatewayConfig {
    GatewayConfig {
        common: CoreConfig { port: 0 },
        models: ModelConfig {
            text_model: "mock-model".to_string(),
            request_timeout: Duration::from_secs(5),
        },
        google: GoogleConfig {
            api_key: Secret::new(String::new()),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
        },
        uploads: UploadConfig {
            dir: upload_dir.to_path_buf(),
            max_bytes: 1024 * 1024,
        },
        provider: ProviderKind::Mock,
    }
}

impl TestApp {
    pub async fn spawn(provider: MockTextProvider) -> Self {
        Self::spawn_with(provider, |_| {}).await
    }

    pub async fn spawn_with<F>(provider: MockTextProvider, customize: F) -> Self
    where
        F: FnOnce(&mut GatewayConfig),
    {
        let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");
        let mut config = test_config(upload_dir.path());
        customize(&mut config);

        let provider = Arc::new(provider);
        let app = Application::build_with_provider(config, provider.clone() as Arc<dyn TextProvider>)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            provider,
            upload_dir,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Files currently staged in the upload directory.
    pub fn staged_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub async fn post_form(&self, path: &str, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

pub fn file_part(bytes: Vec<u8>, file_name: &str, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .expect("Invalid mime type")
}
