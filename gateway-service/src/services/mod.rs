pub mod metrics;
pub mod providers;
pub mod upload;

pub use providers::{ProviderError, ProviderResponse, TextProvider};
pub use upload::{read_upload_form, resolve_mime, TempUpload, UploadError, UploadForm};
