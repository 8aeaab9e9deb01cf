use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::llm::is_timeout;
use crate::llm::prompt::build_chat_prompt;
use crate::models::{ChatMetadata, ChatRequest, ChatResponse};
use crate::retrieval::Query;
use crate::state::AppState;

pub const NOT_READY_MESSAGE: &str = "No code repository has been uploaded yet. \
    Please upload files or connect a GitHub repository first.";
pub const NO_HITS_MESSAGE: &str = "I couldn't find relevant information in the uploaded code. \
    Please try rephrasing your question or check if files were properly uploaded.";
const LLM_TIMEOUT_MESSAGE: &str =
    "The language model timed out while generating an answer. Please retry.";
const LLM_ERROR_MESSAGE: &str =
    "The language model is unavailable right now, so no answer could be generated. Please try again later.";

/// POST /chat — retrieval-augmented answer about the session's code.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let _permit = state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat service at capacity".to_string(),
            )
        })?;

    answer(&state, req).await.map(Json)
}

/// Chat pipeline without the HTTP extractors.
pub async fn answer(
    state: &AppState,
    req: ChatRequest,
) -> Result<ChatResponse, (StatusCode, String)> {
    // ── Step 1: Validate input ────────────────────────────
    let query = Query::parse(&req.message)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("{e}: message is required")))?;

    // ── Step 2: Check session ─────────────────────────────
    let session = state.session.snapshot();
    if !session.is_ready() {
        return Ok(ChatResponse {
            success: false,
            response: NOT_READY_MESSAGE.to_string(),
            metadata: ChatMetadata::default(),
        });
    }

    // ── Step 3: Retrieve context ──────────────────────────
    let budget = req.max_tokens.unwrap_or(state.config.default_token_budget);
    let Some(bundle) = state
        .retriever
        .plan_and_retrieve(&session.namespace, query.as_str(), budget)
        .await
    else {
        return Ok(ChatResponse {
            success: true,
            response: NO_HITS_MESSAGE.to_string(),
            metadata: ChatMetadata::default(),
        });
    };

    // ── Step 4: Generate ──────────────────────────────────
    let prompt = build_chat_prompt(&bundle, query.as_str());
    let chunks_found = bundle.hits.len();

    match state.llm.complete(&prompt).await {
        Ok(text) => Ok(ChatResponse {
            success: true,
            response: text,
            metadata: ChatMetadata {
                chunks_found,
                files_involved: Some(bundle.file_count()),
                retrieval_reranked: Some(bundle.reranked()),
                estimated_tokens: Some(bundle.total_tokens),
                analysis: Some(bundle.analysis),
                file_summary: Some(bundle.files),
            },
        }),
        Err(e) => {
            tracing::error!("LLM completion failed: {e:#}");
            let message = if is_timeout(&e) {
                LLM_TIMEOUT_MESSAGE
            } else {
                LLM_ERROR_MESSAGE
            };
            Ok(ChatResponse {
                success: false,
                response: message.to_string(),
                metadata: ChatMetadata {
                    chunks_found,
                    ..ChatMetadata::default()
                },
            })
        }
    }
}
