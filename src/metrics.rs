use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters tracking what the pipeline has ingested since startup.
#[derive(Default)]
pub struct IngestMetrics {
    documents_indexed: AtomicU64,
    pages_loaded: AtomicU64,
    ocr_pages: AtomicU64,
    chunks_indexed: AtomicU64,
}

impl IngestMetrics {
    /// Create an accumulator with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed document with its page, OCR, and chunk counts.
    pub fn record_document(&self, pages: u64, ocr_pages: u64, chunks: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.pages_loaded.fetch_add(pages, Ordering::Relaxed);
        self.ocr_pages.fetch_add(ocr_pages, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunks, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            pages_loaded: self.pages_loaded.load(Ordering::Relaxed),
            ocr_pages: self.ocr_pages.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents that have been indexed since startup.
    pub documents_indexed: u64,
    /// Total page units loaded across all indexed documents.
    pub pages_loaded: u64,
    /// Pages whose text came from the OCR fallback.
    pub ocr_pages: u64,
    /// Total chunk count produced across all indexed documents.
    pub chunks_indexed: u64,
}
