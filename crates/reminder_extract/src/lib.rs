//! HTTP adapter turning free text into a partial appointment.

pub mod client;
pub mod prompt;
pub mod schema;

pub use crate::client::{GeminiExtractor, GeminiExtractorBuilder};
