//! Processing service coordinating extraction, chunking, embedding, retrieval, and generation.

use crate::{
    config::{Config, ConfigError},
    embedding::{EmbeddingClient, get_embedding_client},
    generation::{GenerationClient, GenerationClientError, build_prompt, get_generation_client},
    index::{DocumentRecord, DocumentRegistry, DocumentStatus, LookupError, VectorIndex},
    metrics::{MetricsSnapshot, ServiceMetrics},
    pdf,
    processing::{
        chunking::chunk_pages,
        types::{ChatError, ChatOutcome, IngestError, IngestOutcome, Upload},
    },
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Tunables for the pipeline, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ProcessingSettings {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Registry capacity.
    pub max_documents: usize,
    /// Uploads processed at the same time.
    pub max_concurrent_ingests: usize,
    /// Deadline for one generation call.
    pub generation_timeout: Duration,
    /// Directory receiving scoped temporary upload files.
    pub upload_dir: PathBuf,
}

impl From<&Config> for ProcessingSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            top_k: config.retrieval_top_k,
            max_documents: config.max_documents,
            max_concurrent_ingests: config.max_concurrent_ingests,
            generation_timeout: Duration::from_secs(config.generation_timeout_secs),
            upload_dir: config.upload_dir.clone(),
        }
    }
}

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Extract, chunk, embed, and index an uploaded PDF.
    async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError>;

    /// Answer `message` from the document identified by `pdf_id`.
    async fn chat(&self, pdf_id: &str, message: &str) -> Result<ChatOutcome, ChatError>;

    /// Record for a single document.
    async fn document(&self, pdf_id: &str) -> Result<DocumentRecord, ChatError>;

    /// Records for every known document, oldest first.
    async fn list_documents(&self) -> Vec<DocumentRecord>;

    /// Forget a document and drop its index.
    async fn delete_document(&self, pdf_id: &str) -> Result<DocumentRecord, ChatError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the full pipeline for every upload and question.
///
/// The service owns long-lived handles to the embedding and generation clients, the document
/// registry, and the metrics counters. Construct it once near process start and share it through
/// an `Arc`.
pub struct ProcessingService {
    settings: ProcessingSettings,
    embedding_client: Arc<dyn EmbeddingClient>,
    generation_client: Arc<dyn GenerationClient>,
    registry: DocumentRegistry,
    ingest_permits: Semaphore,
    metrics: ServiceMetrics,
}

impl ProcessingService {
    /// Build a service from explicit collaborators.
    pub fn new(
        settings: ProcessingSettings,
        embedding_client: Arc<dyn EmbeddingClient>,
        generation_client: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            registry: DocumentRegistry::new(settings.max_documents),
            ingest_permits: Semaphore::new(settings.max_concurrent_ingests.max(1)),
            settings,
            embedding_client,
            generation_client,
            metrics: ServiceMetrics::new(),
        }
    }

    /// Build a service with the providers selected in `config`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        tracing::info!(provider = ?config.embedding_provider, "Initializing embedding client");
        let embedding_client = get_embedding_client(config);
        tracing::info!(provider = ?config.generation_provider, model = %config.generation_model, "Initializing generation client");
        let generation_client = get_generation_client(config)?;
        Ok(Self::new(
            ProcessingSettings::from(config),
            embedding_client,
            generation_client,
        ))
    }

    /// Extract, chunk, embed, and index an upload under a fresh identifier.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        let Upload { filename, bytes } = upload;
        let pdf_id = Uuid::new_v4();
        let record = DocumentRecord {
            pdf_id,
            filename: filename.clone(),
            checksum: compute_checksum(&bytes),
            uploaded_at: current_timestamp_rfc3339(),
            status: DocumentStatus::Indexing,
            page_count: 0,
            chunk_count: 0,
            error: None,
        };

        let evicted = self.registry.begin(record).await;
        for id in evicted {
            tracing::info!(pdf_id = %id, "Evicted document to stay within capacity");
        }
        tracing::info!(pdf_id = %pdf_id, filename = ?filename, bytes = bytes.len(), "Processing PDF");

        match self.build_index(pdf_id, bytes).await {
            Ok((page_count, index)) => {
                let Some(record) = self.registry.complete(pdf_id, page_count, index).await else {
                    tracing::warn!(pdf_id = %pdf_id, "Document removed while indexing; index discarded");
                    return Err(IngestError::Removed);
                };
                self.metrics.record_document(record.chunk_count as u64);
                tracing::info!(
                    pdf_id = %pdf_id,
                    pages = record.page_count,
                    chunks = record.chunk_count,
                    "Successfully processed PDF"
                );
                Ok(IngestOutcome {
                    pdf_id,
                    filename,
                    page_count: record.page_count,
                    chunk_count: record.chunk_count,
                    status: record.status,
                })
            }
            Err(error) => {
                self.registry.fail(pdf_id, error.to_string()).await;
                self.metrics.record_failure();
                tracing::error!(pdf_id = %pdf_id, error = %error, "Error processing PDF");
                Err(error)
            }
        }
    }

    async fn build_index(
        &self,
        pdf_id: Uuid,
        bytes: Vec<u8>,
    ) -> Result<(usize, Arc<VectorIndex>), IngestError> {
        let _permit = self
            .ingest_permits
            .acquire()
            .await
            .map_err(|error| IngestError::Worker(error.to_string()))?;

        let upload_dir = self.settings.upload_dir.clone();
        let chunk_size = self.settings.chunk_size;
        let overlap = self.settings.chunk_overlap;
        let upload_id = pdf_id.to_string();

        let (page_count, chunks) = tokio::task::spawn_blocking(move || {
            let pages = pdf::load_pdf(&upload_dir, &upload_id, &bytes)?;
            let chunks = chunk_pages(&pages, chunk_size, overlap)?;
            Ok::<_, IngestError>((pages.len(), chunks))
        })
        .await
        .map_err(|error| IngestError::Worker(error.to_string()))??;

        tracing::debug!(pdf_id = %pdf_id, pages = page_count, chunks = chunks.len(), chunk_size, overlap, "Chunked document");

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect();
            self.embedding_client.generate_embeddings(texts).await?
        };

        let index = VectorIndex::build(self.embedding_client.dimension(), chunks, vectors)?;
        Ok((page_count, Arc::new(index)))
    }

    /// Answer a question from the named document's chunks.
    pub async fn chat(&self, pdf_id: &str, message: &str) -> Result<ChatOutcome, ChatError> {
        let id = parse_id(pdf_id)?;
        let index = self
            .registry
            .index_for(&id)
            .await
            .map_err(ChatError::from)?;

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![message.to_string()])
            .await?;
        let query = vectors.pop().unwrap_or_default();
        let hits = index.similarity_search(&query, self.settings.top_k)?;

        let context = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let prompt = build_prompt(&context, message);

        let deadline = self.settings.generation_timeout;
        let response = tokio::time::timeout(deadline, self.generation_client.generate(&prompt))
            .await
            .map_err(|_| GenerationClientError::Timeout(deadline.as_secs()))??;

        self.metrics.record_answer();
        tracing::info!(pdf_id = %id, context_chunks = hits.len(), "Generated response for PDF");
        Ok(ChatOutcome {
            response,
            context_chunks: hits.len(),
        })
    }

    /// Record for a single document.
    pub async fn document(&self, pdf_id: &str) -> Result<DocumentRecord, ChatError> {
        let id = parse_id(pdf_id)?;
        self.registry.record(&id).await.ok_or(ChatError::NotFound)
    }

    /// Records for every known document, oldest first.
    pub async fn list_documents(&self) -> Vec<DocumentRecord> {
        self.registry.list().await
    }

    /// Forget a document and drop its index.
    pub async fn delete_document(&self, pdf_id: &str) -> Result<DocumentRecord, ChatError> {
        let id = parse_id(pdf_id)?;
        let removed = self.registry.remove(&id).await.ok_or(ChatError::NotFound)?;
        tracing::info!(pdf_id = %id, "Deleted document");
        Ok(removed)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl DocumentApi for ProcessingService {
    async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        ProcessingService::ingest(self, upload).await
    }

    async fn chat(&self, pdf_id: &str, message: &str) -> Result<ChatOutcome, ChatError> {
        ProcessingService::chat(self, pdf_id, message).await
    }

    async fn document(&self, pdf_id: &str) -> Result<DocumentRecord, ChatError> {
        ProcessingService::document(self, pdf_id).await
    }

    async fn list_documents(&self) -> Vec<DocumentRecord> {
        ProcessingService::list_documents(self).await
    }

    async fn delete_document(&self, pdf_id: &str) -> Result<DocumentRecord, ChatError> {
        ProcessingService::delete_document(self, pdf_id).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ProcessingService::metrics_snapshot(self)
    }
}

impl From<LookupError> for ChatError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound => ChatError::NotFound,
            LookupError::NotInitialized => ChatError::NotInitialized,
        }
    }
}

// Identifiers are only ever issued as UUIDs, so anything else cannot exist.
fn parse_id(pdf_id: &str) -> Result<Uuid, ChatError> {
    Uuid::parse_str(pdf_id.trim()).map_err(|_| ChatError::NotFound)
}

fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
