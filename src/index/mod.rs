//! Vector index seam: upsert chunk records into a namespace and run ranked
//! (optionally reranked) text searches against it.

pub mod hosted;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Chunk, RetrievedHit};

/// Metadata fields returned with every hit.
pub const HIT_FIELDS: [&str; 4] = ["chunk_text", "file_name", "file_path", "language"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RerankSpec {
    pub model: String,
    pub top_n: usize,
    pub rank_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub rerank: Option<RerankSpec>,
}

/// A chunk as stored in the index. The `chunk_text` field is the one the
/// hosted model embeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub chunk_text: String,
    pub file_name: String,
    pub file_path: String,
    pub language: String,
    pub chunk_index: usize,
}

impl ChunkRecord {
    pub fn new(namespace: &str, chunk: Chunk) -> Self {
        Self {
            id: format!("{namespace}-{}", Uuid::new_v4()),
            chunk_text: chunk.text,
            file_name: chunk.file_name,
            file_path: chunk.file_path,
            language: chunk.language,
            chunk_index: chunk.chunk_index,
        }
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store records in `namespace`. Ids are unique per record.
    async fn upsert(&self, namespace: &str, records: &[ChunkRecord]) -> Result<()>;

    /// Ranked hits for `request`, best first. When `request.rerank` is set
    /// the returned order is the reranked order.
    async fn search(&self, namespace: &str, request: &SearchRequest) -> Result<Vec<RetrievedHit>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_namespaced() {
        let chunk = Chunk {
            text: "fn main() {}".into(),
            file_name: "main.rs".into(),
            file_path: "src/main.rs".into(),
            language: "rust".into(),
            chunk_index: 2,
            position: 7,
        };
        let a = ChunkRecord::new("ns-1", chunk.clone());
        let b = ChunkRecord::new("ns-1", chunk);
        assert!(a.id.starts_with("ns-1-"));
        assert_ne!(a.id, b.id);
        assert_eq!(a.chunk_index, 2);

        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["_id"], a.id.as_str());
        assert_eq!(json["chunk_text"], "fn main() {}");
        assert!(json.get("position").is_none());
    }
}
