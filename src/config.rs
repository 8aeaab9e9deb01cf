use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where session working directories (uploads and clones) live
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Frontend origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Hosted vector index configuration
    pub index: IndexConfig,
    /// Default chunking parameters for ingestion
    pub chunking: ChunkingConfig,
    /// Token budget used when a chat request does not set one
    pub default_token_budget: usize,
    /// Maximum chat requests in flight
    pub max_concurrent_chats: usize,
    /// Clone timeout in seconds
    pub clone_timeout_secs: u64,
    /// Per-request timeout for index and LLM calls
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint, Groq by default) or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for completions
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_completion_tokens: u32,
}

/// Integrated-embedding vector index (records API with hosted rerank).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    pub api_key: Option<String>,
    pub index_name: String,
    /// Data-plane host. When unset it is resolved (or the index created)
    /// through the control plane at startup.
    pub host: Option<String>,
    pub control_plane_url: String,
    pub api_version: String,
    pub cloud: String,
    pub region: String,
    /// Hosted embedding model used when the index has to be created
    pub embed_model: String,
    /// Hosted reranker applied to exploratory queries
    pub rerank_model: String,
    /// Records per upsert request
    pub upsert_batch_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/rag-data"),
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origins: vec!["http://localhost:8080".to_string()],
            llm: LlmConfig::default(),
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            default_token_budget: 8000,
            max_concurrent_chats: 3,
            clone_timeout_secs: 300,
            http_timeout_secs: 120,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.groq.com/openai".to_string(),
            chat_model: "openai/gpt-oss-120b".to_string(),
            api_key: None,
            temperature: 1.0,
            max_completion_tokens: 8192,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_name: "ai-code-reviewer".to_string(),
            host: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            api_version: "2025-01".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            embed_model: "multilingual-e5-large".to_string(),
            rerank_model: "bge-reranker-v2-m3".to_string(),
            upsert_batch_size: 50,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CODECHAT_DATA_DIR").or_else(|_| std::env::var("DATA_DIR")) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("CODECHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(origins) = std::env::var("CODECHAT_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY").or_else(|_| std::env::var("GROQ_API")) {
            config.llm.api_key = Some(key);
        }
        if let Some(t) = parse_env("LLM_TEMPERATURE") {
            config.llm.temperature = t;
        }
        if let Some(v) = parse_env("LLM_MAX_COMPLETION_TOKENS") {
            config.llm.max_completion_tokens = v;
        }

        // Vector index
        if let Ok(key) = std::env::var("PINECONE_API_KEY") {
            config.index.api_key = Some(key);
        }
        if let Ok(name) = std::env::var("PINECONE_INDEX_NAME") {
            config.index.index_name = name;
        }
        if let Ok(host) = std::env::var("PINECONE_INDEX_HOST") {
            config.index.host = Some(host);
        }
        if let Ok(cloud) = std::env::var("PINECONE_CLOUD") {
            config.index.cloud = cloud;
        }
        if let Ok(region) = std::env::var("PINECONE_REGION") {
            config.index.region = region;
        }
        if let Ok(model) = std::env::var("PINECONE_EMBED_MODEL") {
            config.index.embed_model = model;
        }
        if let Ok(model) = std::env::var("PINECONE_RERANK_MODEL") {
            config.index.rerank_model = model;
        }

        // Retrieval and ingestion
        if let Some(v) = parse_env("CODECHAT_DEFAULT_TOKEN_BUDGET") {
            config.default_token_budget = v;
        }
        if let Some(v) = parse_env("CODECHAT_CHUNK_SIZE") {
            config.chunking.chunk_size = v;
        }
        if let Some(v) = parse_env("CODECHAT_CHUNK_OVERLAP") {
            config.chunking.chunk_overlap = v;
        }
        if let Some(v) = parse_env::<usize>("CODECHAT_MAX_CONCURRENT_CHATS") {
            config.max_concurrent_chats = v.max(1);
        }
        if let Some(v) = parse_env("CODECHAT_CLONE_TIMEOUT_SECS") {
            config.clone_timeout_secs = v;
        }
        if let Some(v) = parse_env("CODECHAT_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = v;
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
