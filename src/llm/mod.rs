//! Language-model completion.

pub mod completion;
pub mod prompt;

use anyhow::Result;
use async_trait::async_trait;

pub use completion::ChatCompletionClient;

/// Single-shot completion: prompt in, answer text out.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// True when `err` (or anything in its chain) is a request timeout.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .is_some_and(|e| e.is_timeout())
            || cause
                .downcast_ref::<tokio::time::error::Elapsed>()
                .is_some()
    })
}
