use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::retrieval::{Query, QueryAnalysis};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueryAnalysisResponse {
    pub query: String,
    pub analysis: QueryAnalysis,
    pub strategy: Strategy,
}

#[derive(Debug, Serialize)]
pub struct Strategy {
    pub description: String,
    pub reranking: &'static str,
}

/// GET /query-analysis/{query} — the retrieval plan a chat question would get.
pub async fn query_analysis(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<QueryAnalysisResponse>, (StatusCode, String)> {
    let query = Query::parse(&raw).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let analysis = state.retriever.analyze(&query);
    Ok(Json(describe(query, analysis)))
}

fn describe(query: Query, analysis: QueryAnalysis) -> QueryAnalysisResponse {
    QueryAnalysisResponse {
        strategy: Strategy {
            description: analysis.describe(),
            reranking: if analysis.should_rerank { "enabled" } else { "disabled" },
        },
        query: query.as_str().to_string(),
        analysis,
    }
}
