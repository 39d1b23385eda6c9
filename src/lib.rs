#![deny(missing_docs)]

//! Core library for the docpipe ingestion server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document ingestion pipeline: loading, OCR fallback, splitting, indexing.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Qdrant vector store integration.
pub mod qdrant;
