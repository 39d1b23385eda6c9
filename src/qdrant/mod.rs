//! Qdrant vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::{INDEXED_PAYLOAD_FIELDS, QdrantStore};
pub use payload::{build_point_id, doc_id_for_source};
pub use types::{PointInsert, QdrantError};
