use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::models::Features;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub features: [&'static str; 4],
}

/// GET /
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "RAG Code Reviewer is running",
        features: ["hosted_embeddings", "reranking", "dynamic_topk", "token_management"],
    })
}

#[derive(Serialize)]
pub struct SessionInfo {
    pub namespace: String,
    pub has_data: bool,
    pub files_processed: usize,
    pub features: Features,
}

/// GET /session-info
pub async fn session_info(State(state): State<AppState>) -> Json<SessionInfo> {
    let session = state.session.snapshot();
    Json(SessionInfo {
        has_data: session.is_ready(),
        namespace: session.namespace,
        files_processed: session.files_processed,
        features: Features::ALL,
    })
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: &'static str,
    pub namespace: String,
}

/// POST /reset-session — waits for any running ingest, then starts fresh.
pub async fn reset_session(State(state): State<AppState>) -> Json<ResetResponse> {
    let _permit = state.ingest_semaphore.acquire().await;

    let session = state.session.clone();
    let fresh = match tokio::task::spawn_blocking(move || session.reset()).await {
        Ok(fresh) => fresh,
        Err(e) => {
            tracing::error!("Reset task failed: {e}");
            state.session.snapshot()
        }
    };

    Json(ResetResponse {
        success: true,
        message: "Session reset successfully",
        namespace: fresh.namespace,
    })
}
