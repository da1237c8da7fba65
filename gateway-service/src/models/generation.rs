use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /generate-text`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateTextRequest {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub prompt: String,
}

/// Successful response body shared by every generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationResponse {
    pub output: String,
}
