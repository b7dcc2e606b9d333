//! In-memory vector storage: one index per document, tracked by a registry.

mod memory;
mod registry;

pub use memory::{IndexError, ScoredChunk, VectorIndex};
pub use registry::{DocumentRecord, DocumentRegistry, DocumentStatus, LookupError};
