use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::{header, StatusCode};
use axum::{Form, Json};

use crate::config::ChunkingConfig;
use crate::ingest::clone::{clone_repo, repo_name_from_url, unique_dir, validate_repo_url};
use crate::ingest::{save_upload, IngestError, IngestSummary, RecursiveSplitter};
use crate::models::{ChunkingOverrides, GithubUploadForm, IngestResponse};
use crate::state::AppState;

type ApiError = (StatusCode, String);

/// POST /upload-file — multipart `files` plus an optional `config` JSON field.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut files: Vec<(String, Bytes)> = Vec::new();
    let mut raw_config: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("files") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_request)?;
                files.push((file_name, bytes));
            }
            Some("config") => raw_config = Some(field.text().await.map_err(bad_request)?),
            _ => {}
        }
    }

    if files.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "At least one file is required".to_string()));
    }
    let chunking = parse_upload_config(raw_config.as_deref(), state.config.chunking);
    RecursiveSplitter::new(chunking).map_err(bad_request)?;

    let _permit = state.ingest_semaphore.acquire().await.map_err(unavailable)?;
    let namespace = state.session.snapshot().namespace;
    let root = state.session.workdir(&namespace);

    let written = {
        let root = root.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, IngestError> {
            files
                .iter()
                .map(|(name, bytes)| save_upload(&root, name, bytes))
                .collect()
        })
        .await
        .map_err(internal)?
        .map_err(ingest_error)?
    };
    tracing::info!("Saved {} uploaded files for {namespace}", written.len());

    let summary = state
        .ingestor
        .ingest_paths(&namespace, &root, written, chunking)
        .await
        .map_err(ingest_error)?;

    let message = format!(
        "Processed {} chunks from {} files",
        summary.chunks_indexed, summary.files_processed
    );
    finish(&state, namespace, root, summary, chunking, message)
}

/// POST /upload-github — clone a repository into the session and index it.
pub async fn upload_github(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<IngestResponse>, ApiError> {
    let form = read_github_form(request).await?;
    let repo_url = form.repo_url.trim().to_string();
    validate_repo_url(&repo_url).map_err(ingest_error)?;

    let chunking = ChunkingOverrides {
        chunk_size: form.chunk_size,
        chunk_overlap: form.chunk_overlap,
    }
    .apply(state.config.chunking);
    RecursiveSplitter::new(chunking).map_err(bad_request)?;

    let _permit = state.ingest_semaphore.acquire().await.map_err(unavailable)?;
    let namespace = state.session.snapshot().namespace;
    let root = state.session.workdir(&namespace);

    let target = clone_target(&root, repo_name_from_url(&repo_url)).await?;
    let timeout = Duration::from_secs(state.config.clone_timeout_secs);
    if let Err(e) = clone_repo(&repo_url, &target, timeout).await {
        tracing::error!("Clone failed: {e:#}");
        let partial = target.clone();
        let _ = tokio::task::spawn_blocking(move || {
            if partial.exists() {
                if let Err(e) = std::fs::remove_dir_all(&partial) {
                    tracing::warn!("Failed to remove {}: {e}", partial.display());
                }
            }
        })
        .await;
        return Err(ingest_error(e));
    }

    let summary = state
        .ingestor
        .ingest_dir(&namespace, &root, &target, chunking)
        .await
        .map_err(ingest_error)?;

    let message = format!(
        "Repository processed: {} chunks from {} files",
        summary.chunks_indexed, summary.files_processed
    );
    finish(&state, namespace, root, summary, chunking, message)
}

/// Create the session root and pick a free directory for the clone.
async fn clone_target(root: &Path, name: String) -> Result<PathBuf, ApiError> {
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&root)?;
        Ok(unique_dir(&root, &name))
    })
    .await
    .map_err(internal)?
    .map_err(internal)
}

fn finish(
    state: &AppState,
    namespace: String,
    root: PathBuf,
    summary: IngestSummary,
    chunking: ChunkingConfig,
    message: String,
) -> Result<Json<IngestResponse>, ApiError> {
    state
        .session
        .bind(&namespace, root, summary.files_processed)
        .map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

    Ok(Json(IngestResponse {
        success: true,
        message,
        namespace,
        files_processed: summary.files_processed,
        chunks_indexed: summary.chunks_indexed,
        config: chunking,
    }))
}

/// Chunking settings from the optional `config` field. Malformed JSON falls
/// back to the defaults.
pub fn parse_upload_config(raw: Option<&str>, defaults: ChunkingConfig) -> ChunkingConfig {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return defaults;
    };
    match serde_json::from_str::<ChunkingOverrides>(raw) {
        Ok(overrides) => overrides.apply(defaults),
        Err(e) => {
            tracing::warn!("Ignoring malformed upload config ({e}); using defaults");
            defaults
        }
    }
}

/// The GitHub form arrives either url-encoded or as multipart form data.
async fn read_github_form(request: Request) -> Result<GithubUploadForm, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let Form(form) = Form::<GithubUploadForm>::from_request(request, &())
            .await
            .map_err(|e| (e.status(), e.body_text()))?;
        return Ok(form);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| (e.status(), e.body_text()))?;
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.map_err(bad_request)?;
        fields.insert(name, value);
    }

    github_form_from_fields(&fields)
}

fn github_form_from_fields(fields: &HashMap<String, String>) -> Result<GithubUploadForm, ApiError> {
    let repo_url = fields
        .get("repo_url")
        .filter(|u| !u.trim().is_empty())
        .cloned()
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "repo_url is required".to_string()))?;

    let number = |key: &str| -> Result<Option<usize>, ApiError> {
        match fields.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) => v.parse().map(Some).map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("{key} must be a non-negative integer"),
                )
            }),
        }
    };

    Ok(GithubUploadForm {
        repo_url,
        chunk_size: number("chunk_size")?,
        chunk_overlap: number("chunk_overlap")?,
    })
}

fn ingest_error(e: IngestError) -> ApiError {
    if e.is_input_error() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else {
        tracing::error!("Ingestion failed: {e:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Ingestion failed: {e}"))
    }
}

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn unavailable(_: tokio::sync::AcquireError) -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Ingestion is shutting down".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_config() {
        let defaults = ChunkingConfig::default();
        assert_eq!(parse_upload_config(None, defaults), defaults);
        assert_eq!(parse_upload_config(Some("not json"), defaults), defaults);
        assert_eq!(
            parse_upload_config(Some(r#"{"chunk_size": 400}"#), defaults),
            ChunkingConfig { chunk_size: 400, chunk_overlap: 100 }
        );
        assert_eq!(
            parse_upload_config(Some(r#"{"chunk_size": 500, "chunk_overlap": 50}"#), defaults),
            ChunkingConfig { chunk_size: 500, chunk_overlap: 50 }
        );
    }

    #[test]
    fn test_github_form_from_fields() {
        let mut fields = HashMap::new();
        fields.insert("repo_url".to_string(), "https://github.com/o/r".to_string());
        fields.insert("chunk_size".to_string(), "600".to_string());
        fields.insert("chunk_overlap".to_string(), "".to_string());
        let form = github_form_from_fields(&fields).unwrap();
        assert_eq!(form.repo_url, "https://github.com/o/r");
        assert_eq!(form.chunk_size, Some(600));
        assert_eq!(form.chunk_overlap, None);

        fields.insert("chunk_size".to_string(), "big".to_string());
        let (status, _) = github_form_from_fields(&fields).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = github_form_from_fields(&HashMap::new()).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ingest_error_status() {
        let (status, _) = ingest_error(IngestError::NoValidFiles);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = ingest_error(IngestError::Other(anyhow::anyhow!("index down")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_clone_target_creates_root_and_avoids_taken_names() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("ns");

        let first = clone_target(&root, "demo".to_string()).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(first, root.join("demo"));

        std::fs::create_dir_all(&first).unwrap();
        let second = clone_target(&root, "demo".to_string()).await.unwrap();
        assert_eq!(second, root.join("demo-2"));
    }
}
