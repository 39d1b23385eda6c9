//! Document ingestion pipeline.
//!
//! Source files become normalized page units (with an OCR fallback for
//! scanned PDF pages), page units become overlapping token windows, and the
//! windows are embedded and upserted into the vector store under
//! deterministic identifiers.

pub mod loader;
pub mod normalize;
pub mod ocr;
mod service;
pub mod splitter;
pub mod types;

pub use loader::{DocumentLoader, Extraction, choose_extraction};
pub use normalize::normalize;
pub use ocr::{OcrEngine, TesseractOcr, resolve_ocr_langs};
pub use service::{IngestApi, IngestService};
pub use splitter::TokenSplitter;
pub use types::{
    BatchReport, Chunk, ChunkMeta, DocumentFailure, IngestError, IngestOutcome, LoadError,
    OcrError, PageMeta, PageUnit, SplitError, StoreHealth,
};
