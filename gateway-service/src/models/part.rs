//! Content parts sent to a generative model.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// One element of a model prompt: either plain text or raw bytes with a mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelPart {
    Text(String),
    InlineData { data: Vec<u8>, mime_type: String },
}

impl ModelPart {
    pub fn text(text: impl Into<String>) -> Self {
        ModelPart::Text(text.into())
    }

    pub fn inline_data(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ModelPart::InlineData {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Returns the text if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ModelPart::Text(text) => Some(text),
            ModelPart::InlineData { .. } => None,
        }
    }

    /// Base64 payload for inline data; `None` for text parts.
    pub fn encoded_data(&self) -> Option<String> {
        match self {
            ModelPart::Text(_) => None,
            ModelPart::InlineData { data, .. } => Some(STANDARD.encode(data)),
        }
    }

    /// Approximate payload size, used for logging.
    pub fn len(&self) -> usize {
        match self {
            ModelPart::Text(text) => text.len(),
            ModelPart::InlineData { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
