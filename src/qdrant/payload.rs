//! Payload construction and the deterministic point-identifier scheme.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ingest::types::ChunkMeta;

/// Stable document identifier derived from the absolute source path.
pub fn doc_id_for_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic point identifier for a chunk of a document.
///
/// `point_seq` is the chunk's 0-based position across the whole document, so
/// every chunk of a multi-page document maps to a distinct identifier.
/// Re-ingesting an unchanged document reproduces the same identifiers, which
/// makes upserts overwrite instead of duplicate. Pure and stateless.
///
/// Qdrant only accepts integers or UUIDs as point identifiers, so the digest
/// of `"{doc_id}:{point_seq}"` is truncated to 128 bits and rendered in UUID
/// form; collision odds stay negligible.
pub fn build_point_id(doc_id: &str, point_seq: usize) -> String {
    let digest = Sha256::digest(format!("{doc_id}:{point_seq}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(
    text: &str,
    meta: &ChunkMeta,
    doc_id: &str,
    language: &str,
    ingested_at: &str,
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert("doc_id".into(), Value::String(doc_id.to_string()));
    payload.insert("source".into(), Value::String(meta.page.source.clone()));
    payload.insert(
        "source_name".into(),
        Value::String(meta.page.source_name.clone()),
    );
    payload.insert("ext".into(), Value::String(meta.page.ext.clone()));
    payload.insert("page_start".into(), Value::from(meta.page.page_start));
    payload.insert("page_end".into(), Value::from(meta.page.page_end));
    payload.insert("chunk_id".into(), Value::from(meta.chunk_id));
    payload.insert("token_count".into(), Value::from(meta.token_count));
    payload.insert("language".into(), Value::String(language.to_string()));
    payload.insert(
        "ingested_at".into(),
        Value::String(ingested_at.to_string()),
    );
    payload
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::PageMeta;

    #[test]
    fn point_id_is_deterministic() {
        let first = build_point_id("doc-a", 3);
        let second = build_point_id("doc-a", 3);
        assert_eq!(first, second);
        assert_eq!(first.len(), 36);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_hexdigit() || c == '-')
        );
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn point_id_separates_documents_and_positions() {
        assert_ne!(build_point_id("doc-a", 0), build_point_id("doc-b", 0));
        assert_ne!(build_point_id("doc-a", 0), build_point_id("doc-a", 1));
    }

    #[test]
    fn doc_id_is_stable_for_a_path() {
        let a = doc_id_for_source("/data/report.pdf");
        let b = doc_id_for_source("/data/report.pdf");
        assert_eq!(a, b);
        assert_ne!(a, doc_id_for_source("/data/other.pdf"));
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_carries_full_provenance() {
        let meta = ChunkMeta {
            page: PageMeta {
                source: "/data/report.pdf".into(),
                source_name: "report.pdf".into(),
                ext: "pdf".into(),
                page_start: 2,
                page_end: 2,
            },
            chunk_id: 1,
            token_count: 640,
        };
        let payload = build_payload("sample", &meta, "deadbeef", "en,pl", "2025-01-01T00:00:00Z");
        assert_eq!(payload["text"], "sample");
        assert_eq!(payload["doc_id"], "deadbeef");
        assert_eq!(payload["source"], "/data/report.pdf");
        assert_eq!(payload["source_name"], "report.pdf");
        assert_eq!(payload["ext"], "pdf");
        assert_eq!(payload["page_start"], 2);
        assert_eq!(payload["page_end"], 2);
        assert_eq!(payload["chunk_id"], 1);
        assert_eq!(payload["token_count"], 640);
        assert_eq!(payload["language"], "en,pl");
        assert_eq!(payload["ingested_at"], "2025-01-01T00:00:00Z");
    }
}
