//! Embedding client abstraction and adapters.
//!
//! The hashing adapter runs in-process and needs no external service. The Ollama adapter calls a
//! local runtime over HTTP.

mod ollama;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaEmbeddingClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider response could not be parsed or had the wrong shape.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Provider did not answer before the deadline.
    #[error("Embedding request timed out after {0} seconds")]
    Timeout(u64),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Dimensionality of every vector this client returns.
    fn dimension(&self) -> usize;
}

/// Deterministic local embedder based on hashed character trigrams.
///
/// Similar texts share trigrams and therefore land close together under cosine similarity, which
/// is enough for retrieval over a single document without a model download.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbeddingClient {
    dimension: usize,
}

impl HashingEmbeddingClient {
    /// Construct a hashing embedder producing vectors of `dimension` slots.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embed a single text synchronously.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; self.dimension.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return embedding;
        }

        if chars.len() < 3 {
            let slot = bucket(&lowered, embedding.len());
            embedding[slot] += 1.0;
        }

        for window in chars.windows(3) {
            let token: String = window.iter().collect();
            let slot = bucket(&token, embedding.len());
            embedding[slot] += 1.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

// FNV-1a
fn bucket(token: &str, slots: usize) -> usize {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % slots as u64) as usize
}

#[async_trait]
impl EmbeddingClient for HashingEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        let encoder = *self;
        tracing::debug!(
            texts = texts.len(),
            dimension = self.dimension,
            "Generating hashing embeddings"
        );
        tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|text| encoder.encode(text))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|error| EmbeddingClientError::GenerationFailed(error.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Build an embedding client suitable for the current configuration.
pub fn get_embedding_client(config: &Config) -> Arc<dyn EmbeddingClient> {
    match config.embedding_provider {
        EmbeddingProvider::Hashing => {
            Arc::new(HashingEmbeddingClient::new(config.embedding_dimension))
        }
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
            Duration::from_secs(config.embedding_timeout_secs),
        )),
    }
}

/// Cosine similarity between two vectors of equal length.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}
