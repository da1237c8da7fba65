//! gateway-service: relays text, image, document and audio prompts to a
//! generative model and returns the generated text.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
