//! Core data types and error definitions for the ingestion pipeline.

use crate::embedding::EmbeddingClientError;
use crate::qdrant::QdrantError;
use anyhow::Error as TokenizerError;
use thiserror::Error;

/// Provenance attached to every unit of text extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    /// Absolute path of the source file.
    pub source: String,
    /// File name component of the source path.
    pub source_name: String,
    /// Lowercase extension without the leading dot (`pdf`, `docx`).
    pub ext: String,
    /// First page covered by the unit, 1-based.
    pub page_start: u32,
    /// Last page covered by the unit, 1-based.
    pub page_end: u32,
}

/// One logical unit of extracted text: a PDF page, or a whole DOCX document.
#[derive(Debug, Clone)]
pub struct PageUnit {
    /// Normalized text of the unit.
    pub text: String,
    /// Whether the text came from the OCR fallback rather than direct extraction.
    pub via_ocr: bool,
    /// Source provenance for the unit.
    pub meta: PageMeta,
}

/// Metadata carried by every chunk; each chunk owns an independent copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMeta {
    /// Provenance of the page unit the chunk was cut from.
    pub page: PageMeta,
    /// Position of the chunk within its page unit, 0-based.
    pub chunk_id: usize,
    /// Raw token count of the window before whitespace trimming.
    pub token_count: usize,
}

/// A token-bounded slice of a page unit's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Decoded and trimmed window text.
    pub text: String,
    /// Chunk metadata, owned.
    pub meta: ChunkMeta,
}

/// Errors raised while rendering a page image and recognizing its text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Page rasterization failed to run or reported a failure.
    #[error("failed to rasterize page {page} of '{path}': {detail}")]
    Render {
        /// Source document path.
        path: String,
        /// Page index as requested, 0-based.
        page: u32,
        /// Captured stderr or spawn failure.
        detail: String,
    },
    /// The renderer exited successfully but produced no image.
    #[error("no raster output for page {page} of '{path}'")]
    MissingRaster {
        /// Source document path.
        path: String,
        /// Page index as requested, 0-based.
        page: u32,
    },
    /// The recognition engine failed to run or reported a failure.
    #[error("text recognition failed for page {page} of '{path}': {detail}")]
    Recognition {
        /// Source document path.
        path: String,
        /// Page index as requested, 0-based.
        page: u32,
        /// Captured stderr or spawn failure.
        detail: String,
    },
    /// Scratch-directory I/O failed around the engine invocation.
    #[error("OCR scratch I/O failed for '{path}': {source}")]
    Io {
        /// Source document path.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while turning a source file into page units.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The input path does not exist.
    #[error("file not found: '{path}'")]
    FileNotFound {
        /// Path as given by the caller.
        path: String,
    },
    /// The extension is not in the configured allow-list or has no loader.
    #[error("unsupported file type '{ext}' for '{path}'")]
    UnsupportedType {
        /// Path as given by the caller.
        path: String,
        /// Offending extension, including the leading dot when present.
        ext: String,
    },
    /// The PDF could not be opened or parsed.
    #[error("failed to read PDF '{path}': {source}")]
    Pdf {
        /// Path as given by the caller.
        path: String,
        /// Underlying parser error.
        #[source]
        source: lopdf::Error,
    },
    /// The DOCX archive or its document part could not be read.
    #[error("failed to read DOCX '{path}': {detail}")]
    Docx {
        /// Path as given by the caller.
        path: String,
        /// Description of the failing stage.
        detail: String,
    },
    /// The OCR fallback failed for a page; fails the whole document.
    #[error("OCR fallback failed: {0}")]
    Ocr(#[from] OcrError),
    /// Filesystem metadata or canonicalization failed.
    #[error("failed to stat '{path}': {source}")]
    Io {
        /// Path as given by the caller.
        path: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while splitting text into token windows.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Overlap must stay below the window size, and the window must be positive.
    #[error("invalid token window: overlap {overlap_tokens} must be smaller than chunk size {chunk_tokens}")]
    InvalidWindow {
        /// Configured window size.
        chunk_tokens: usize,
        /// Configured overlap.
        overlap_tokens: usize,
    },
    /// The tokenizer vocabulary could not be loaded.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted by the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Document loading failed.
    #[error("failed to load document: {0}")]
    Load(#[from] LoadError),
    /// Chunking failed.
    #[error("failed to split document: {0}")]
    Split(#[from] SplitError),
    /// The embedding provider failed to produce vectors.
    #[error("failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// A returned vector does not match the configured dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was provisioned with.
        expected: usize,
        /// Dimension the provider returned.
        actual: usize,
    },
    /// The vector store rejected or failed a request.
    #[error("vector store request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

/// Summary of a completed single-document ingestion.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOutcome {
    /// Page units loaded from the document.
    pub pages: usize,
    /// Pages whose text came from the OCR fallback.
    pub ocr_pages: usize,
    /// Chunks produced across all page units.
    pub chunks: usize,
    /// Points written to the vector store.
    pub points_upserted: usize,
}

/// One failed document inside a batch run.
#[derive(Debug)]
pub struct DocumentFailure {
    /// Path of the document that failed.
    pub path: String,
    /// Error that stopped it.
    pub error: IngestError,
}

/// Result of ingesting a directory; failures never abort the batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Documents ingested successfully, with their outcomes.
    pub succeeded: Vec<(String, IngestOutcome)>,
    /// Documents that failed, with the error for each.
    pub failed: Vec<DocumentFailure>,
}

impl BatchReport {
    /// Total documents the batch attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Reachability snapshot for the vector store.
#[derive(Debug, Clone)]
pub struct StoreHealth {
    /// Whether the store answered the probe.
    pub reachable: bool,
    /// Whether the configured target collection is present.
    pub collection_present: bool,
    /// Diagnostic captured when the store could not be reached.
    pub error: Option<String>,
}
