//! Ingestion orchestration: load, split, embed, and index documents.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::{self, EmbeddingClient};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::qdrant::payload::{build_payload, current_timestamp_rfc3339};
use crate::qdrant::{PointInsert, QdrantStore, build_point_id, doc_id_for_source};

use super::loader::DocumentLoader;
use super::ocr::{OcrEngine, TesseractOcr};
use super::splitter::TokenSplitter;
use super::types::{BatchReport, Chunk, DocumentFailure, IngestError, IngestOutcome, StoreHealth};

/// Abstraction over the ingestion pipeline consumed by external surfaces.
///
/// The HTTP layer depends on this trait rather than [`IngestService`]
/// directly so routing tests can substitute a scripted implementation.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Load, split, embed, and index one document.
    async fn ingest_file(
        &self,
        path: &str,
        collection: Option<String>,
        language: Option<String>,
    ) -> Result<IngestOutcome, IngestError>;

    /// Create a collection (and its payload indexes) with the given vector size.
    async fn create_collection(
        &self,
        collection: &str,
        vector_size: Option<u64>,
    ) -> Result<(), IngestError>;

    /// Enumerate collections known to the vector store.
    async fn list_collections(&self) -> Result<Vec<String>, IngestError>;

    /// Probe the vector store and report reachability.
    async fn health(&self) -> StoreHealth;

    /// Retrieve the current ingestion counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the ingestion pipeline: document loading with OCR fallback,
/// token-window splitting, batched embedding, and vector store writes.
///
/// The service owns long-lived handles to its collaborators so the HTTP
/// surface and the batch CLI share one pipeline. Construct it once near
/// process start and share it behind an `Arc`.
pub struct IngestService {
    loader: DocumentLoader,
    splitter: TokenSplitter,
    embedder: Arc<dyn EmbeddingClient>,
    store: QdrantStore,
    metrics: Arc<IngestMetrics>,
    collection: String,
    vector_size: usize,
    on_disk: bool,
    language: String,
}

impl IngestService {
    /// Build a service from explicit collaborators.
    ///
    /// The target collection, vector geometry, and payload language come from
    /// `config`; the collaborators are injected so tests can substitute a
    /// fake OCR engine, a deterministic embedder, or a mock store endpoint.
    pub fn new(
        config: &Config,
        loader: DocumentLoader,
        splitter: TokenSplitter,
        embedder: Arc<dyn EmbeddingClient>,
        store: QdrantStore,
    ) -> Self {
        Self {
            loader,
            splitter,
            embedder,
            store,
            metrics: Arc::new(IngestMetrics::new()),
            collection: config.qdrant_collection.clone(),
            vector_size: config.embedding_dimension,
            on_disk: config.qdrant_on_disk,
            language: config.payload_language(),
        }
    }

    /// Build the standard pipeline described by `config`: Tesseract OCR when
    /// enabled, the configured embedding provider, and the configured store.
    pub fn from_config(config: &Config) -> Result<Self, IngestError> {
        let ocr: Option<Arc<dyn OcrEngine>> = if config.ocr_enabled {
            Some(Arc::new(TesseractOcr::new(&config.language_hints)))
        } else {
            None
        };
        let loader = DocumentLoader::new(
            config.allowed_exts.clone(),
            ocr,
            config.ocr_dpi,
            config.ocr_min_chars,
        );
        let splitter = TokenSplitter::new(config.chunk_tokens, config.chunk_overlap)?;
        let embedder = embedding::client_from_config(config)?;
        let store = QdrantStore::new(&config.qdrant_url, config.qdrant_api_key.clone())?;
        Ok(Self::new(config, loader, splitter, embedder, store))
    }

    /// Converge a collection to its provisioned-and-indexed state. Both steps
    /// are idempotent, so every ingestion run starts here.
    pub async fn ensure_collection(&self, collection: Option<&str>) -> Result<(), IngestError> {
        let name = collection.unwrap_or(&self.collection);
        self.store
            .ensure_collection(name, self.vector_size as u64, self.on_disk)
            .await?;
        self.store.ensure_payload_indexes(name).await?;
        Ok(())
    }

    /// Ingest one document into `collection` (default: the configured
    /// target), tagging its chunks with `language` (default: the configured
    /// hints). Returns counters describing what was loaded and written.
    pub async fn ingest_file(
        &self,
        path: &Path,
        collection: Option<&str>,
        language: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let collection = collection.unwrap_or(&self.collection);
        let language = language.unwrap_or(&self.language);
        tracing::info!(collection, path = %path.display(), "Ingesting document");

        self.ensure_collection(Some(collection)).await?;

        let units = self.loader.load(path).await?;
        let pages = units.len();
        let ocr_pages = units.iter().filter(|unit| unit.via_ocr).count();

        let mut chunks: Vec<Chunk> = Vec::new();
        for unit in &units {
            chunks.extend(self.splitter.split(&unit.text, &unit.meta));
        }

        if chunks.is_empty() {
            tracing::warn!(collection, path = %path.display(), "Document produced no chunks");
            self.metrics.record_document(pages as u64, ocr_pages as u64, 0);
            return Ok(IngestOutcome {
                pages,
                ocr_pages,
                chunks: 0,
                points_upserted: 0,
            });
        }

        // One batched provider call per document; network round-trips
        // dominate the cost and amortize poorly over per-chunk calls.
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(texts).await?;
        debug_assert_eq!(chunks.len(), vectors.len());
        for vector in &vectors {
            if vector.len() != self.vector_size {
                return Err(IngestError::DimensionMismatch {
                    expected: self.vector_size,
                    actual: vector.len(),
                });
            }
        }

        let doc_id = doc_id_for_source(&chunks[0].meta.page.source);
        let now = current_timestamp_rfc3339();
        let points: Vec<PointInsert> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(point_seq, (chunk, vector))| PointInsert {
                // Identifiers hash the document-wide ordinal rather than the
                // per-unit chunk_id, so chunks of different pages can never
                // collide while re-ingestion still reproduces every id.
                id: build_point_id(&doc_id, point_seq),
                vector,
                payload: build_payload(&chunk.text, &chunk.meta, &doc_id, language, &now),
            })
            .collect();

        let points_upserted = self.store.upsert_points(collection, points).await?;
        self.metrics
            .record_document(pages as u64, ocr_pages as u64, chunks.len() as u64);

        let outcome = IngestOutcome {
            pages,
            ocr_pages,
            chunks: chunks.len(),
            points_upserted,
        };
        tracing::info!(
            collection,
            path = %path.display(),
            pages,
            ocr_pages,
            chunks = outcome.chunks,
            points = points_upserted,
            "Document indexed"
        );
        Ok(outcome)
    }

    /// Ingest every allowed file under `dir`, isolating per-document
    /// failures: one unreadable document never aborts the batch.
    pub async fn ingest_directory(
        &self,
        dir: &Path,
        collection: Option<&str>,
        language: Option<&str>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for entry in WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
        {
            let path = entry.path();
            if !self.loader.is_allowed(path) {
                continue;
            }
            match self.ingest_file(path, collection, language).await {
                Ok(outcome) => {
                    report.succeeded.push((path.display().to_string(), outcome));
                }
                Err(error) => {
                    tracing::error!(path = %path.display(), error = %error, "Document ingestion failed");
                    report.failed.push(DocumentFailure {
                        path: path.display().to_string(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Batch ingestion finished"
        );
        report
    }

    /// Create a collection with the given vector size (default: the
    /// configured embedding dimension), then make sure its payload indexes
    /// exist.
    pub async fn create_collection(
        &self,
        collection: &str,
        vector_size: Option<u64>,
    ) -> Result<(), IngestError> {
        let size = vector_size.unwrap_or(self.vector_size as u64);
        self.store
            .create_collection(collection, size, self.on_disk)
            .await?;
        self.store.ensure_payload_indexes(collection).await?;
        tracing::info!(collection, vector_size = size, "Collection created");
        Ok(())
    }

    /// Enumerate all collections currently known to the store.
    pub async fn list_collections(&self) -> Result<Vec<String>, IngestError> {
        Ok(self.store.list_collections().await?)
    }

    /// Probe the store with a cheap request and report what was found.
    pub async fn health(&self) -> StoreHealth {
        match self.store.list_collections().await {
            Ok(collections) => StoreHealth {
                reachable: true,
                collection_present: collections.iter().any(|name| name == &self.collection),
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Store health probe failed");
                StoreHealth {
                    reachable: false,
                    collection_present: false,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Return the current ingestion metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl IngestApi for IngestService {
    async fn ingest_file(
        &self,
        path: &str,
        collection: Option<String>,
        language: Option<String>,
    ) -> Result<IngestOutcome, IngestError> {
        IngestService::ingest_file(
            self,
            Path::new(path),
            collection.as_deref(),
            language.as_deref(),
        )
        .await
    }

    async fn create_collection(
        &self,
        collection: &str,
        vector_size: Option<u64>,
    ) -> Result<(), IngestError> {
        IngestService::create_collection(self, collection, vector_size).await
    }

    async fn list_collections(&self) -> Result<Vec<String>, IngestError> {
        IngestService::list_collections(self).await
    }

    async fn health(&self) -> StoreHealth {
        IngestService::health(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        IngestService::metrics_snapshot(self)
    }
}
