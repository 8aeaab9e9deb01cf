use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::index::hosted::HostedIndex;
use crate::index::VectorIndex;
use crate::ingest::Ingestor;
use crate::llm::{ChatCompletionClient, LlmClient};
use crate::retrieval::Retriever;
use crate::session::SessionManager;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub retriever: Arc<Retriever>,
    pub ingestor: Arc<Ingestor>,
    pub llm: Arc<dyn LlmClient>,
    /// Single permit: ingests and resets never overlap
    pub ingest_semaphore: Arc<tokio::sync::Semaphore>,
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    /// Connect to the hosted index and LLM described by `config`.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let index = HostedIndex::connect(http_client.clone(), &config.index).await?;
        let llm = ChatCompletionClient::new(http_client, config.llm.clone());

        Self::with_backends(config, Arc::new(index), Arc::new(llm))
    }

    /// Build state around already-constructed backends.
    pub fn with_backends(
        config: Config,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let retriever = Retriever::new(index.clone(), config.index.rerank_model.clone());
        let ingestor = Ingestor::new(index)?;
        let max_concurrent_chats = config.max_concurrent_chats.max(1);

        Ok(Self {
            session: Arc::new(SessionManager::new(config.data_dir.clone())),
            retriever: Arc::new(retriever),
            ingestor: Arc::new(ingestor),
            llm,
            ingest_semaphore: Arc::new(tokio::sync::Semaphore::new(1)),
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_chats)),
            config,
        })
    }
}
