//! Application startup and lifecycle management.

use crate::config::{GatewayConfig, ProviderKind};
use crate::handlers;
use crate::middleware::metrics_middleware;
use crate::services::metrics;
use crate::services::providers::gemini::{GeminiConfig, GeminiTextProvider};
use crate::services::providers::mock::MockTextProvider;
use crate::services::providers::TextProvider;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state, built once at startup and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub text_provider: Arc<dyn TextProvider>,
}

/// Construct the provider selected by configuration.
pub fn build_provider(config: &GatewayConfig) -> Result<Arc<dyn TextProvider>, AppError> {
    let provider: Arc<dyn TextProvider> = match config.provider {
        ProviderKind::Gemini => {
            let gemini_config = GeminiConfig {
                api_key: config.google.api_key.clone(),
                model: config.models.text_model.clone(),
                api_base: config.google.api_base.clone(),
                timeout: config.models.request_timeout,
            };
            Arc::new(
                GeminiTextProvider::new(gemini_config)
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
            )
        }
        ProviderKind::Mock => {
            tracing::warn!("Using mock text provider; responses are canned");
            Arc::new(MockTextProvider::new(true))
        }
    };

    tracing::info!(
        provider = provider.name(),
        model = provider.model(),
        "Initialized text provider"
    );

    Ok(provider)
}

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.uploads.max_bytes;

    Router::new()
        .route("/generate-text", post(handlers::generate_text))
        .route("/generate-from-image", post(handlers::generate_from_image))
        .route("/generate-from-document", post(handlers::generate_from_document))
        .route("/generate-from-audio", post(handlers::generate_from_audio))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route_layer(from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the provider selected by configuration.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let text_provider = build_provider(&config)?;
        Self::build_with_provider(config, text_provider).await
    }

    /// Build the application around an already constructed provider.
    pub async fn build_with_provider(
        config: GatewayConfig,
        text_provider: Arc<dyn TextProvider>,
    ) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.uploads.dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create upload directory {}: {}",
                    config.uploads.dir.display(),
                    e
                );
                AppError::from(e)
            })?;

        metrics::init_metrics();

        // Port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            upload_dir = %config.uploads.dir.display(),
            max_upload_bytes = config.uploads.max_bytes,
            "Server is running on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            state: AppState {
                config,
                text_provider,
            },
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
