//! HTTP surface for pdfchat.
//!
//! - `POST /v1/pdf` – Multipart upload (field `file`). Extracts, chunks, embeds, and indexes the
//!   PDF under a fresh identifier and returns `{ pdf_id, filename, page_count, chunk_count, status }`.
//! - `POST /v1/chat/:pdf_id` – Answer `{ "message": ... }` from that document's chunks.
//! - `GET /v1/pdf` – List document records, oldest upload first.
//! - `GET /v1/pdf/:pdf_id` – Record for one document.
//! - `DELETE /v1/pdf/:pdf_id` – Forget a document and drop its index.
//! - `GET /metrics` – Ingestion and answer counters.
//! - `GET /health` – Liveness probe with the crate version.
//!
//! Errors are returned as `{ "detail": <message> }`.

use crate::index::{DocumentRecord, DocumentStatus};
use crate::metrics::MetricsSnapshot;
use crate::processing::{ChatError, DocumentApi, IngestError, Upload};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

/// Build the HTTP router around a document service.
pub fn create_router<S>(service: Arc<S>, max_upload_bytes: usize) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/v1/pdf", post(upload_pdf::<S>).get(list_documents::<S>))
        .route(
            "/v1/pdf/:pdf_id",
            get(get_document::<S>).delete(delete_document::<S>),
        )
        .route("/v1/chat/:pdf_id", post(chat_with_pdf::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Success response for `POST /v1/pdf`.
#[derive(Serialize)]
struct UploadResponse {
    pdf_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    page_count: usize,
    chunk_count: usize,
    status: DocumentStatus,
}

/// Accept a PDF upload and index it.
async fn upload_pdf<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: DocumentApi,
{
    let mut multipart =
        multipart.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
        break;
    }
    let upload = upload.ok_or_else(|| {
        AppError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Missing multipart field `file`",
        )
    })?;

    let outcome = service.ingest(upload).await?;
    Ok(Json(UploadResponse {
        pdf_id: outcome.pdf_id,
        filename: outcome.filename,
        page_count: outcome.page_count,
        chunk_count: outcome.chunk_count,
        status: outcome.status,
    }))
}

/// Request body for `POST /v1/chat/:pdf_id`.
#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

/// Response body for `POST /v1/chat/:pdf_id`.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

/// Answer a question from one document.
async fn chat_with_pdf<S>(
    State(service): State<Arc<S>>,
    Path(pdf_id): Path<String>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError>
where
    S: DocumentApi,
{
    let Json(request) =
        payload.map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;
    let outcome = service.chat(&pdf_id, &request.message).await?;
    Ok(Json(ChatResponse {
        response: outcome.response,
    }))
}

/// Response body for `GET /v1/pdf`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentRecord>,
}

async fn list_documents<S>(State(service): State<Arc<S>>) -> Json<DocumentsResponse>
where
    S: DocumentApi,
{
    Json(DocumentsResponse {
        documents: service.list_documents().await,
    })
}

async fn get_document<S>(
    State(service): State<Arc<S>>,
    Path(pdf_id): Path<String>,
) -> Result<Json<DocumentRecord>, AppError>
where
    S: DocumentApi,
{
    Ok(Json(service.document(&pdf_id).await?))
}

async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Path(pdf_id): Path<String>,
) -> Result<StatusCode, AppError>
where
    S: DocumentApi,
{
    service.delete_document(&pdf_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Error body returned by every failing endpoint.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<IngestError> for AppError {
    fn from(error: IngestError) -> Self {
        let status = match error {
            IngestError::Removed => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<ChatError> for AppError {
    fn from(error: ChatError) -> Self {
        let status = match error {
            ChatError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

fn multipart_error(error: MultipartError) -> AppError {
    AppError::new(error.status(), error.body_text())
}
