#![deny(missing_docs)]

//! Core library for the pdfchat service: upload a PDF, then ask questions answered from its text.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Answer generation clients and prompt construction.
pub mod generation;
/// Per-document vector indexes and the document registry.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and answer counters.
pub mod metrics;
/// PDF staging and page text extraction.
pub mod pdf;
/// Document processing pipeline.
pub mod processing;
