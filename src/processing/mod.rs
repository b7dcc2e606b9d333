//! Document pipeline: extraction, chunking, embedding, per-document indexing, and answering.

pub mod chunking;
mod service;
pub mod types;

pub use service::{DocumentApi, ProcessingService, ProcessingSettings};
pub use types::{ChatError, ChatOutcome, ChunkingError, IngestError, IngestOutcome, Upload};
