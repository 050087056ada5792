//! Text generation and translation through a hosted generative model.

pub mod gemini;
mod prompts;

pub use gemini::GeminiClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing api key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
