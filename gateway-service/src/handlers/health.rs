use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

/// Health check endpoint for Docker/K8s liveness probes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "gateway-service",
            "version": env!("CARGO_PKG_VERSION"),
            "provider": state.text_provider.name(),
            "model": state.text_provider.model(),
        })),
    )
}

/// Readiness check endpoint: ready once the model provider answers.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.text_provider.health_check().await.map_err(|e| {
        tracing::warn!(provider = state.text_provider.name(), error = %e, "Provider not ready");
        AppError::ServiceUnavailable
    })?;

    Ok(StatusCode::OK)
}
