//! Request-scoped domain models for the gateway.

pub mod generation;
pub mod part;

pub use generation::{GenerateTextRequest, GenerationResponse};
pub use part::ModelPart;
