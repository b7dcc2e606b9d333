//! Generative answer providers and prompt assembly.
//!
//! A provider receives a fully assembled prompt and returns free text. The Gemini adapter talks to
//! the hosted `generateContent` API; the Ollama adapter mirrors it against a local runtime.

mod gemini;
mod ollama;

use crate::config::{Config, ConfigError, GenerationProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use gemini::GeminiClient;
pub use ollama::OllamaGenerationClient;

/// Errors surfaced while asking a provider for an answer.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate response: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Provider did not answer before the deadline.
    #[error("Generation timed out after {0} seconds")]
    Timeout(u64),
}

/// Interface implemented by generative answer providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationClientError>;
}

/// Build the question-answering prompt sent to the provider.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context from a PDF document, please answer the question.\n\n\
         Context: {context}\n\n\
         Question: {question}\n\n\
         Please provide a comprehensive answer based solely on the information provided in the context."
    )
}

/// Build a generation client for the configured provider.
pub fn get_generation_client(config: &Config) -> Result<Arc<dyn GenerationClient>, ConfigError> {
    let timeout = Duration::from_secs(config.generation_timeout_secs);
    match config.generation_provider {
        GenerationProvider::Gemini => {
            let api_key = config
                .gemini_api_key
                .clone()
                .ok_or_else(|| ConfigError::MissingVariable("GEMINI_API_KEY".into()))?;
            Ok(Arc::new(GeminiClient::new(
                config.gemini_base_url.clone(),
                api_key,
                config.generation_model.clone(),
                timeout,
            )))
        }
        GenerationProvider::Ollama => Ok(Arc::new(OllamaGenerationClient::new(
            config.ollama_url.clone(),
            config.generation_model.clone(),
            timeout,
        ))),
    }
}

pub(crate) fn map_transport_error(
    error: reqwest::Error,
    provider: &str,
    base_url: &str,
    timeout: Duration,
) -> GenerationClientError {
    if error.is_timeout() {
        GenerationClientError::Timeout(timeout.as_secs())
    } else {
        GenerationClientError::ProviderUnavailable(format!(
            "failed to reach {provider} at {base_url}: {error}"
        ))
    }
}
