//! Generation endpoints.
//!
//! Each handler builds an ordered list of [`ModelPart`]s, makes one provider
//! call and answers with `{ "output": ... }`. Provider failures are logged and
//! collapsed into a fixed per-endpoint message.

use crate::models::{GenerateTextRequest, GenerationResponse, ModelPart};
use crate::services::metrics;
use crate::services::upload::{read_upload_form, resolve_mime, TempUpload, UploadError, UploadForm};
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::time::Instant;
use validator::Validate;

const TEXT_ENDPOINT: &str = "generate-text";
const TEXT_FAILURE_MESSAGE: &str = "An error occurred while generating text.";

/// Legacy clients always sent images as PNG; kept as the last resort.
const DEFAULT_IMAGE_MIME: &str = "image/png";
const DEFAULT_BINARY_MIME: &str = "application/octet-stream";

/// The three upload endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
    Audio,
}

impl UploadKind {
    pub fn endpoint(self) -> &'static str {
        match self {
            UploadKind::Image => "generate-from-image",
            UploadKind::Document => "generate-from-document",
            UploadKind::Audio => "generate-from-audio",
        }
    }

    /// Multipart field carrying the file.
    pub fn file_field(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Document => "document",
            UploadKind::Audio => "audio",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            UploadKind::Image => "An error occurred while generating text from image.",
            UploadKind::Document => "An error occurred while generating text from document.",
            UploadKind::Audio => "An error occurred while generating text from audio.",
        }
    }

    /// Fixed instruction placed before the file; images use the caller's prompt instead.
    pub fn instruction(self) -> Option<&'static str> {
        match self {
            UploadKind::Image => None,
            UploadKind::Document => Some("Analyze this document: "),
            UploadKind::Audio => Some("Analyze this audio:"),
        }
    }

    fn requires_prompt(self) -> bool {
        self == UploadKind::Image
    }

    fn mime_for(self, upload: &TempUpload) -> String {
        match self {
            UploadKind::Image => {
                resolve_mime(upload, |m| m.starts_with("image/"), DEFAULT_IMAGE_MIME)
            }
            UploadKind::Document | UploadKind::Audio => {
                resolve_mime(upload, |_| true, DEFAULT_BINARY_MIME)
            }
        }
    }

    /// Order the prompt, instruction and file the way the model expects them.
    ///
    /// Image: `[prompt, file]`. Document/audio: `[instruction, file, prompt?]`.
    pub fn build_parts(self, prompt: Option<String>, file: ModelPart) -> Vec<ModelPart> {
        let mut parts = Vec::with_capacity(3);
        match self.instruction() {
            None => {
                parts.extend(prompt.map(ModelPart::Text));
                parts.push(file);
            }
            Some(instruction) => {
                parts.push(ModelPart::text(instruction));
                parts.push(file);
                parts.extend(prompt.map(ModelPart::Text));
            }
        }
        parts
    }
}

/// `POST /generate-text`
pub async fn generate_text(
    State(state): State<AppState>,
    payload: Result<Json<GenerateTextRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    let result = generate_text_output(&state, payload).await;
    record_outcome(TEXT_ENDPOINT, &result);
    result.map(|output| Json(GenerationResponse { output }))
}

async fn generate_text_output(
    state: &AppState,
    payload: Result<Json<GenerateTextRequest>, JsonRejection>,
) -> Result<String, AppError> {
    let Json(request) =
        payload.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
    request.validate()?;
    if request.prompt.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Field 'prompt' must not be blank"
        )));
    }

    let parts = [ModelPart::Text(request.prompt)];
    run_generation(state, TEXT_ENDPOINT, &parts, TEXT_FAILURE_MESSAGE).await
}

/// `POST /generate-from-image`
pub async fn generate_from_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_upload(&state, UploadKind::Image, multipart).await
}

/// `POST /generate-from-document`
pub async fn generate_from_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_upload(&state, UploadKind::Document, multipart).await
}

/// `POST /generate-from-audio`
pub async fn generate_from_audio(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_upload(&state, UploadKind::Audio, multipart).await
}

async fn handle_upload(
    state: &AppState,
    kind: UploadKind,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<GenerationResponse>, AppError> {
    let result = generate_from_upload(state, kind, multipart).await;
    record_outcome(kind.endpoint(), &result);
    result.map(|output| Json(GenerationResponse { output }))
}

async fn generate_from_upload(
    state: &AppState,
    kind: UploadKind,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, AppError> {
    let mut multipart = multipart.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Expected a multipart form: {}", e.body_text()))
    })?;

    let UploadForm { file, prompt } =
        read_upload_form(&mut multipart, &state.config.uploads.dir, kind.file_field())
            .await
            .map_err(|e| upload_error(kind, e))?;

    let upload = file.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "No {} file uploaded (expected form field '{}')",
            kind.file_field(),
            kind.file_field()
        ))
    })?;

    tracing::info!(
        endpoint = kind.endpoint(),
        size = upload.size(),
        file_name = upload.file_name().unwrap_or("-"),
        "Upload received"
    );
    metrics::record_upload_bytes(kind.endpoint(), upload.size());

    let result = generate_with_upload(state, kind, &upload, prompt).await;

    // Removal failures are logged by the guard; the response is unaffected.
    let _ = upload.close();

    result
}

async fn generate_with_upload(
    state: &AppState,
    kind: UploadKind,
    upload: &TempUpload,
    prompt: Option<String>,
) -> Result<String, AppError> {
    if upload.size() == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Uploaded {} file is empty",
            kind.file_field()
        )));
    }

    if kind.requires_prompt() && prompt.is_none() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Form field 'prompt' is required"
        )));
    }

    let data = upload.read().await.map_err(|e| {
        tracing::error!(
            endpoint = kind.endpoint(),
            path = %upload.path().display(),
            error = %e,
            "Failed to read staged upload"
        );
        AppError::GenerationFailed(kind.failure_message().to_string())
    })?;

    let mime_type = kind.mime_for(upload);
    tracing::debug!(endpoint = kind.endpoint(), mime_type = %mime_type, "Resolved upload mime type");

    let parts = kind.build_parts(prompt, ModelPart::inline_data(data, mime_type));
    run_generation(state, kind.endpoint(), &parts, kind.failure_message()).await
}

/// One provider call: no retries, failures become `failure_message`.
async fn run_generation(
    state: &AppState,
    endpoint: &'static str,
    parts: &[ModelPart],
    failure_message: &'static str,
) -> Result<String, AppError> {
    let provider = &state.text_provider;
    let started = Instant::now();

    let result = provider.generate(parts).await;
    metrics::record_provider_latency(
        provider.name(),
        provider.model(),
        started.elapsed().as_secs_f64(),
    );

    match result {
        Ok(response) => {
            metrics::record_tokens(provider.model(), response.input_tokens, response.output_tokens);
            tracing::info!(
                endpoint,
                model = provider.model(),
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                finish_reason = ?response.finish_reason,
                "Generation completed"
            );
            Ok(response.text)
        }
        Err(e) => {
            metrics::record_provider_error(provider.name(), e.kind());
            tracing::error!(
                endpoint,
                provider = provider.name(),
                model = provider.model(),
                error = %e,
                "Generation failed"
            );
            Err(AppError::GenerationFailed(failure_message.to_string()))
        }
    }
}

fn upload_error(kind: UploadKind, err: UploadError) -> AppError {
    match err {
        UploadError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::PayloadTooLarge(e.body_text())
        }
        UploadError::Multipart(e) => AppError::BadRequest(anyhow::anyhow!(e.body_text())),
        UploadError::Io(e) => {
            tracing::error!(endpoint = kind.endpoint(), error = %e, "Failed to stage upload");
            AppError::InternalError(anyhow::Error::new(e).context("Failed to stage upload"))
        }
    }
}

fn record_outcome(endpoint: &str, result: &Result<String, AppError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(
            AppError::BadRequest(_) | AppError::ValidationError(_) | AppError::PayloadTooLarge(_),
        ) => "client_error",
        Err(AppError::GenerationFailed(_)) => "provider_error",
        Err(_) => "internal_error",
    };
    metrics::record_generation(endpoint, outcome);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> ModelPart {
        ModelPart::inline_data(vec![1, 2, 3], "application/pdf")
    }

    #[test]
    fn image_parts_start_with_prompt() {
        let parts = UploadKind::Image.build_parts(Some("describe".into()), file());
        assert_eq!(parts, vec![ModelPart::text("describe"), file()]);
    }

    #[test]
    fn document_parts_start_with_fixed_instruction() {
        let parts = UploadKind::Document.build_parts(None, file());
        assert_eq!(
            parts,
            vec![ModelPart::text("Analyze this document: "), file()]
        );
    }

    #[test]
    fn audio_prompt_follows_the_file() {
        let parts = UploadKind::Audio.build_parts(Some("list speakers".into()), file());
        assert_eq!(
            parts,
            vec![
                ModelPart::text("Analyze this audio:"),
                file(),
                ModelPart::text("list speakers"),
            ]
        );
    }

    #[test]
    fn endpoints_and_fields() {
        assert_eq!(UploadKind::Image.file_field(), "image");
        assert_eq!(UploadKind::Document.endpoint(), "generate-from-document");
        assert_eq!(
            UploadKind::Audio.failure_message(),
            "An error occurred while generating text from audio."
        );
    }
}
