//! Temporary storage for uploaded files.
//!
//! Every file lands in the uploads directory under a unique random name and
//! is owned by a [`TempUpload`]. The file is removed when the guard is closed
//! or dropped, so no exit path of a handler can leak it.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Name of the optional free-text field on multipart forms.
pub const PROMPT_FIELD: &str = "prompt";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Failed to read multipart form: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to stage upload: {0}")]
    Io(#[from] io::Error),
}

/// An uploaded file staged on disk for the lifetime of one request.
#[derive(Debug)]
pub struct TempUpload {
    path: Option<TempPath>,
    file_name: Option<String>,
    content_type: Option<String>,
    size: u64,
}

impl TempUpload {
    /// Stream a multipart field into a fresh file inside `dir`.
    pub async fn from_field(dir: &Path, mut field: Field<'_>) -> Result<Self, UploadError> {
        let (file, path) = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(dir)?
            .into_parts();

        let mut upload = TempUpload {
            path: Some(path),
            file_name: field.file_name().map(str::to_owned),
            content_type: field.content_type().map(str::to_owned),
            size: 0,
        };

        let mut file = tokio::fs::File::from_std(file);
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
            upload.size += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!(
            path = %upload.path().display(),
            size = upload.size,
            content_type = upload.content_type.as_deref().unwrap_or("-"),
            "Staged upload"
        );

        Ok(upload)
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Original file name as sent by the client.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Content type declared by the client for this part.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }

    /// Delete the staged file now and report the outcome.
    pub fn close(mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) => remove(path),
            None => Ok(()),
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = remove(path);
        }
    }
}

fn remove(path: TempPath) -> io::Result<()> {
    let staged: PathBuf = path.to_path_buf();
    match path.close() {
        Ok(()) => {
            tracing::debug!(path = %staged.display(), "Removed staged upload");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(path = %staged.display(), error = %e, "Failed to remove staged upload");
            Err(e)
        }
    }
}

/// Fields the gateway reads from an upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<TempUpload>,
    pub prompt: Option<String>,
}

/// Read a multipart form, staging the field named `file_field` on disk.
///
/// Only the first file under `file_field` is kept; unknown fields are skipped.
/// Already staged files are removed if a later field fails to parse.
pub async fn read_upload_form(
    multipart: &mut Multipart,
    dir: &Path,
    file_field: &str,
) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(name) if name == file_field => {
                if form.file.is_some() {
                    tracing::debug!(field = %name, "Ignoring additional file");
                    continue;
                }
                form.file = Some(TempUpload::from_field(dir, field).await?);
            }
            Some(PROMPT_FIELD) => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    form.prompt = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Choose the mime type reported to the model for an upload.
///
/// The declared content type wins when `accept` allows it; otherwise the type
/// is guessed from the file name, and `fallback` is used when neither fits.
pub fn resolve_mime<F>(upload: &TempUpload, accept: F, fallback: &str) -> String
where
    F: Fn(&str) -> bool,
{
    let declared = upload
        .content_type()
        .map(str::trim)
        .filter(|m| !m.is_empty() && *m != mime_guess::mime::APPLICATION_OCTET_STREAM.as_ref())
        .filter(|m| accept(m));

    if let Some(mime) = declared {
        return mime.to_string();
    }

    upload
        .file_name()
        .and_then(|name| mime_guess::from_path(name).first())
        .map(|mime| mime.essence_str().to_string())
        .filter(|m| accept(m))
        .unwrap_or_else(|| fallback.to_string())
}
