use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::retrieval::{FileSummary, QueryAnalysis};

/// A slice of a source file, stored as the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub file_name: String,
    /// Path relative to the session root
    pub file_path: String,
    pub language: String,
    /// Index of this chunk within its file
    pub chunk_index: usize,
    /// Ordinal within the ingestion batch
    pub position: usize,
}

/// A ranked hit returned by the vector index for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedHit {
    pub text: String,
    pub file_name: String,
    pub file_path: String,
    pub language: String,
    pub score: f32,
    pub reranked: bool,
}

/// POST /chat body
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Token budget for retrieved context
    pub max_tokens: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatMetadata {
    pub chunks_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files_involved: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_summary: Option<Vec<FileSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_reranked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<QueryAnalysis>,
}

/// Optional chunking overrides sent with an upload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkingOverrides {
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

impl ChunkingOverrides {
    pub fn apply(&self, defaults: ChunkingConfig) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: self.chunk_overlap.unwrap_or(defaults.chunk_overlap),
        }
    }
}

/// POST /upload-github form
#[derive(Debug, Clone, Deserialize)]
pub struct GithubUploadForm {
    pub repo_url: String,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub success: bool,
    pub message: String,
    pub namespace: String,
    pub files_processed: usize,
    pub chunks_indexed: usize,
    pub config: ChunkingConfig,
}

/// POST /explain-file body
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainFileRequest {
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainFileResponse {
    pub success: bool,
    pub response: String,
    pub metadata: serde_json::Value,
}

/// One node of the rendered working directory.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileTreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeNode>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Folder,
    File,
}

/// Feature flags reported by the health and session endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Features {
    pub hosted_embeddings: bool,
    pub reranking: bool,
    pub dynamic_topk: bool,
    pub token_management: bool,
}

impl Features {
    pub const ALL: Features = Features {
        hosted_embeddings: true,
        reranking: true,
        dynamic_topk: true,
        token_management: true,
    };
}
