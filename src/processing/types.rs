//! Core data types and error definitions for the processing pipeline.

use crate::{
    embedding::EmbeddingClientError,
    generation::GenerationClientError,
    index::{DocumentStatus, IndexError},
    pdf::PdfError,
};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while turning page text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible character budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted while ingesting an upload.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Upload could not be staged or parsed as a PDF.
    #[error(transparent)]
    Pdf(#[from] PdfError),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Vectors could not be assembled into an index.
    #[error("Failed to build index: {0}")]
    Index(#[from] IndexError),
    /// Blocking worker panicked or was cancelled.
    #[error("Extraction worker failed: {0}")]
    Worker(String),
    /// Document was deleted or evicted before its index was published.
    #[error("PDF was removed before indexing finished")]
    Removed,
}

/// Errors emitted while answering a question or looking up a document.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Identifier was never issued, was evicted, or was deleted.
    #[error("PDF not found")]
    NotFound,
    /// No index is available to answer from.
    #[error("Vector store not initialized")]
    NotInitialized,
    /// Embedding provider failed to embed the question.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Retrieval against the document's index failed.
    #[error("Retrieval failed: {0}")]
    Index(#[from] IndexError),
    /// Generation provider failed or timed out.
    #[error(transparent)]
    Generation(#[from] GenerationClientError),
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Identifier to use for follow-up questions.
    pub pdf_id: Uuid,
    /// Original filename, when the client supplied one.
    pub filename: Option<String>,
    /// Pages found in the PDF.
    pub page_count: usize,
    /// Chunks stored in the document's index.
    pub chunk_count: usize,
    /// Registry status once the index was published.
    pub status: DocumentStatus,
}

/// Answer returned for a question.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Text produced by the generation provider, unmodified.
    pub response: String,
    /// Number of chunks that went into the prompt.
    pub context_chunks: usize,
}

/// Upload handed to the ingest pipeline.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename declared by the client, if any.
    pub filename: Option<String>,
    /// Raw payload bytes.
    pub bytes: Vec<u8>,
}
