//! Per-document registry of records, lifecycle status, and index handles.
//!
//! Every upload gets its own entry and, once ready, its own [`VectorIndex`]. Indexes are published
//! behind an `Arc` so queries clone the handle and release the registry lock before searching.
//! The registry holds at most `capacity` entries; inserting past that evicts the oldest entries
//! that are not still indexing.

use super::memory::VectorIndex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Extraction, chunking, or embedding is in progress.
    Indexing,
    /// Index is published and questions can be answered.
    Ready,
    /// Ingestion failed; see [`DocumentRecord::error`].
    Failed,
}

/// Metadata kept for each upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    /// Identifier issued at upload.
    pub pdf_id: Uuid,
    /// Filename declared by the client.
    pub filename: Option<String>,
    /// SHA-256 of the uploaded bytes, hex encoded.
    pub checksum: String,
    /// Upload time, RFC 3339.
    pub uploaded_at: String,
    /// Current lifecycle status.
    pub status: DocumentStatus,
    /// Pages found in the PDF (zero until ready).
    pub page_count: usize,
    /// Chunks stored in the index (zero until ready).
    pub chunk_count: usize,
    /// Failure message when `status` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reasons a document's index cannot be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Identifier is not in the registry.
    #[error("PDF not found")]
    NotFound,
    /// No index exists for the identifier (or none has ever been built).
    #[error("Vector store not initialized")]
    NotInitialized,
}

struct Entry {
    record: DocumentRecord,
    index: Option<Arc<VectorIndex>>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<Uuid, Entry>,
    order: VecDeque<Uuid>,
    initialized: bool,
}

impl RegistryState {
    fn forget(&mut self, id: &Uuid) -> Option<Entry> {
        let entry = self.entries.remove(id)?;
        if let Some(position) = self.order.iter().position(|candidate| candidate == id) {
            self.order.remove(position);
        }
        Some(entry)
    }

    fn evict_over(&mut self, capacity: usize) -> Vec<Uuid> {
        let mut evicted = Vec::new();
        while self.entries.len() > capacity {
            let candidate = self.order.iter().copied().find(|id| {
                self.entries
                    .get(id)
                    .is_some_and(|entry| entry.record.status != DocumentStatus::Indexing)
            });
            let Some(id) = candidate else {
                break;
            };
            self.forget(&id);
            evicted.push(id);
        }
        evicted
    }
}

/// Registry of uploaded documents guarded by a single reader-writer lock.
pub struct DocumentRegistry {
    capacity: usize,
    state: RwLock<RegistryState>,
}

impl DocumentRegistry {
    /// Create an empty registry holding at most `capacity` documents.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Register a new upload in the `indexing` state. Returns identifiers evicted to make room.
    pub async fn begin(&self, mut record: DocumentRecord) -> Vec<Uuid> {
        record.status = DocumentStatus::Indexing;
        record.error = None;
        let id = record.pdf_id;

        let mut state = self.state.write().await;
        state.forget(&id);
        state.entries.insert(id, Entry {
            record,
            index: None,
        });
        state.order.push_back(id);
        state.evict_over(self.capacity)
    }

    /// Publish the index for an upload and mark it ready. Returns the updated record.
    ///
    /// Returns `None` when the entry was deleted or evicted while indexing; the index is discarded.
    pub async fn complete(
        &self,
        id: Uuid,
        page_count: usize,
        index: Arc<VectorIndex>,
    ) -> Option<DocumentRecord> {
        let mut state = self.state.write().await;
        let entry = state.entries.get_mut(&id)?;
        if entry.record.status != DocumentStatus::Indexing {
            return None;
        }
        entry.record.status = DocumentStatus::Ready;
        entry.record.page_count = page_count;
        entry.record.chunk_count = index.len();
        entry.index = Some(index);
        let record = entry.record.clone();
        state.initialized = true;
        Some(record)
    }

    /// Mark an upload as failed with `error`. Returns `false` when the entry no longer exists.
    pub async fn fail(&self, id: Uuid, error: String) -> bool {
        let mut state = self.state.write().await;
        let Some(entry) = state.entries.get_mut(&id) else {
            return false;
        };
        if entry.record.status != DocumentStatus::Indexing {
            return false;
        }
        entry.record.status = DocumentStatus::Failed;
        entry.record.error = Some(error);
        entry.index = None;
        true
    }

    /// Hand out the index for `id`.
    ///
    /// Before any document has ever become ready every lookup reports
    /// [`LookupError::NotInitialized`]. Afterwards unknown identifiers report
    /// [`LookupError::NotFound`] and documents that are not ready report `NotInitialized`.
    pub async fn index_for(&self, id: &Uuid) -> Result<Arc<VectorIndex>, LookupError> {
        let state = self.state.read().await;
        if !state.initialized {
            return Err(LookupError::NotInitialized);
        }
        let entry = state.entries.get(id).ok_or(LookupError::NotFound)?;
        entry.index.clone().ok_or(LookupError::NotInitialized)
    }

    /// Current record for `id`.
    pub async fn record(&self, id: &Uuid) -> Option<DocumentRecord> {
        let state = self.state.read().await;
        state.entries.get(id).map(|entry| entry.record.clone())
    }

    /// All records, oldest upload first.
    pub async fn list(&self) -> Vec<DocumentRecord> {
        let state = self.state.read().await;
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Remove `id` and drop its index.
    pub async fn remove(&self, id: &Uuid) -> Option<DocumentRecord> {
        let mut state = self.state.write().await;
        state.forget(id).map(|entry| entry.record)
    }

    /// Whether any document has ever become ready.
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::chunking::TextChunk;

    fn record(id: Uuid) -> DocumentRecord {
        DocumentRecord {
            pdf_id: id,
            filename: Some("manual.pdf".into()),
            checksum: "abc".into(),
            uploaded_at: "2026-01-01T00:00:00Z".into(),
            status: DocumentStatus::Indexing,
            page_count: 0,
            chunk_count: 0,
            error: None,
        }
    }

    fn index(text: &str) -> Arc<VectorIndex> {
        Arc::new(
            VectorIndex::build(
                1,
                vec![TextChunk {
                    text: text.into(),
                    page: 1,
                    position: 0,
                }],
                vec![vec![1.0]],
            )
            .expect("index"),
        )
    }

    #[tokio::test]
    async fn lookups_before_first_ready_document_are_not_initialized() {
        let registry = DocumentRegistry::new(4);
        assert_eq!(
            registry.index_for(&Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotInitialized
        );

        let id = Uuid::new_v4();
        registry.begin(record(id)).await;
        assert_eq!(
            registry.index_for(&id).await.unwrap_err(),
            LookupError::NotInitialized
        );
    }

    #[tokio::test]
    async fn ready_document_serves_its_own_index() {
        let registry = DocumentRegistry::new(4);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.begin(record(first)).await;
        assert!(registry.complete(first, 1, index("first")).await.is_some());
        registry.begin(record(second)).await;
        assert!(registry.complete(second, 1, index("second")).await.is_some());

        let hits = registry
            .index_for(&first)
            .await
            .expect("index")
            .similarity_search(&[1.0], 1)
            .expect("hits");
        assert_eq!(hits[0].chunk.text, "first");

        let stored = registry.record(&first).await.expect("record");
        assert_eq!(stored.status, DocumentStatus::Ready);
        assert_eq!(stored.chunk_count, 1);
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found_once_initialized() {
        let registry = DocumentRegistry::new(4);
        let id = Uuid::new_v4();
        registry.begin(record(id)).await;
        registry.complete(id, 1, index("text")).await;

        assert_eq!(
            registry.index_for(&Uuid::new_v4()).await.unwrap_err(),
            LookupError::NotFound
        );
    }

    #[tokio::test]
    async fn failed_document_keeps_its_error() {
        let registry = DocumentRegistry::new(4);
        let ready = Uuid::new_v4();
        registry.begin(record(ready)).await;
        registry.complete(ready, 1, index("text")).await;

        let broken = Uuid::new_v4();
        registry.begin(record(broken)).await;
        assert!(registry.fail(broken, "pdf parse error".into()).await);

        let stored = registry.record(&broken).await.expect("record");
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("pdf parse error"));
        assert_eq!(
            registry.index_for(&broken).await.unwrap_err(),
            LookupError::NotInitialized
        );
        assert!(registry.complete(broken, 1, index("late")).await.is_none());
    }

    #[tokio::test]
    async fn oldest_settled_documents_are_evicted_first() {
        let registry = DocumentRegistry::new(2);
        let oldest_indexing = Uuid::new_v4();
        let settled = Uuid::new_v4();
        let newest = Uuid::new_v4();

        registry.begin(record(oldest_indexing)).await;
        registry.begin(record(settled)).await;
        registry.complete(settled, 1, index("settled")).await;
        let evicted = registry.begin(record(newest)).await;

        assert_eq!(evicted, vec![settled]);
        let remaining: Vec<Uuid> = registry.list().await.iter().map(|r| r.pdf_id).collect();
        assert_eq!(remaining, vec![oldest_indexing, newest]);
        assert_eq!(
            registry.index_for(&settled).await.unwrap_err(),
            LookupError::NotFound
        );
    }

    #[tokio::test]
    async fn deleted_document_is_not_resurrected_by_late_completion() {
        let registry = DocumentRegistry::new(4);
        let id = Uuid::new_v4();
        registry.begin(record(id)).await;
        assert!(registry.remove(&id).await.is_some());
        assert!(registry.complete(id, 1, index("late")).await.is_none());
        assert!(registry.record(&id).await.is_none());
        assert!(registry.list().await.is_empty());
    }
}
