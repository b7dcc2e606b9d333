use crate::embedding::cosine_similarity;
use crate::processing::chunking::TextChunk;
use thiserror::Error;

/// Errors raised while building or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Chunk and vector counts disagree.
    #[error("embedding count {vectors} doesn't match chunk count {chunks}")]
    LengthMismatch {
        /// Number of chunks supplied.
        chunks: usize,
        /// Number of vectors supplied.
        vectors: usize,
    },
    /// Vector has a different dimension than the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// Chunk returned by a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Cosine similarity against the query vector.
    pub score: f32,
    /// Matched chunk.
    pub chunk: TextChunk,
}

/// Immutable brute-force cosine index over one document's chunks.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<(TextChunk, Vec<f32>)>,
}

impl VectorIndex {
    /// Pair each chunk with its vector. Every vector must have `dimension` slots.
    pub fn build(
        dimension: usize,
        chunks: Vec<TextChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if chunks.len() != vectors.len() {
            return Err(IndexError::LengthMismatch {
                chunks: chunks.len(),
                vectors: vectors.len(),
            });
        }
        if let Some(vector) = vectors.iter().find(|vector| vector.len() != dimension) {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        Ok(Self {
            dimension,
            entries: chunks.into_iter().zip(vectors).collect(),
        })
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return up to `k` chunks ranked by descending similarity; ties keep insertion order.
    pub fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (_, vector))| (position, cosine_similarity(query, vector)))
            .collect();
        // sort_by is stable, so equal scores stay in insertion order
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                score,
                chunk: self.entries[position].0.clone(),
            })
            .collect())
    }
}
