use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use walkdir::WalkDir;

use crate::llm::prompt::{build_direct_explain_prompt, build_embedded_explain_prompt};
use crate::models::{ExplainFileRequest, ExplainFileResponse, FileTreeNode, NodeKind};
use crate::state::AppState;

/// Files larger than this are cut to their first `DIRECT_READ_MAX_LINES` lines.
const DIRECT_READ_MAX_BYTES: u64 = 150 * 1024;
const DIRECT_READ_MAX_LINES: usize = 600;

/// GET /file-tree
pub async fn file_tree(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session = state.session.snapshot();
    let Some(root) = session.root.filter(|r| r.exists()) else {
        return Json(json!({
            "success": false,
            "tree": [],
            "message": "No files uploaded yet",
        }));
    };

    let walk_root = root.clone();
    let tree = match tokio::task::spawn_blocking(move || build_tree(&walk_root)).await {
        Ok(Ok(tree)) => tree,
        Ok(Err(e)) => {
            tracing::error!("Failed to build file tree for {}: {e}", root.display());
            return Json(json!({ "success": false, "tree": [], "error": e.to_string() }));
        }
        Err(e) => {
            tracing::error!("File tree task failed: {e}");
            return Json(json!({ "success": false, "tree": [], "error": e.to_string() }));
        }
    };

    if tree.is_empty() {
        return Json(json!({
            "success": false,
            "tree": [],
            "message": "No files found in repository",
        }));
    }

    Json(json!({
        "success": true,
        "total_files": count_files(&tree),
        "tree": tree,
        "root_path": root,
        "files_processed": session.files_processed,
    }))
}

/// Directory listing of `root`, entries sorted by name at every level.
pub fn build_tree(root: &Path) -> std::io::Result<Vec<FileTreeNode>> {
    fn children(root: &Path, dir: &Path) -> std::io::Result<Vec<FileTreeNode>> {
        let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|e| e.file_name());

        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = relative_path(root, &path);
            if entry.file_type()?.is_dir() {
                nodes.push(FileTreeNode {
                    name,
                    path: relative,
                    kind: NodeKind::Folder,
                    children: Some(children(root, &path)?),
                });
            } else {
                nodes.push(FileTreeNode {
                    name,
                    path: relative,
                    kind: NodeKind::File,
                    children: None,
                });
            }
        }
        Ok(nodes)
    }

    children(root, root)
}

/// Files anywhere in the tree.
pub fn count_files(nodes: &[FileTreeNode]) -> usize {
    nodes
        .iter()
        .map(|n| match n.kind {
            NodeKind::File => 1,
            NodeKind::Folder => n.children.as_deref().map(count_files).unwrap_or(0),
        })
        .sum()
}

/// POST /explain-file — explain one file from its indexed chunks, or read it
/// straight from disk when none are indexed.
pub async fn explain_file(
    State(state): State<AppState>,
    Json(req): Json<ExplainFileRequest>,
) -> Result<Json<ExplainFileResponse>, (StatusCode, String)> {
    let requested = req
        .file_path
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "file_path is required".to_string()))?;

    let session = state.session.snapshot();
    let root = session
        .root
        .filter(|r| r.exists())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, "No code repository loaded".to_string()))?;

    let found = {
        let (root, requested) = (root.clone(), requested.clone());
        tokio::task::spawn_blocking(move || find_file_in_repo(&root, &requested))
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    };
    let Some(path) = found else {
        return Ok(Json(ExplainFileResponse {
            success: false,
            response: format!("File '{requested}' not found in the repository"),
            metadata: json!({ "source": "file_not_found" }),
        }));
    };

    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| requested.clone());
    let relative = relative_path(&root, &path);

    // ── Embedded chunks first ─────────────────────────────
    let search = format!("file:{file_name} content");
    let embedded: Vec<String> = state
        .retriever
        .plan_and_retrieve(&session.namespace, &search, state.config.default_token_budget)
        .await
        .map(|bundle| {
            bundle
                .hits
                .into_iter()
                .filter(|h| h.file_path == relative)
                .map(|h| h.text)
                .collect()
        })
        .unwrap_or_default();

    if !embedded.is_empty() {
        let chunks: Vec<&str> = embedded.iter().map(String::as_str).collect();
        let prompt = build_embedded_explain_prompt(&file_name, &chunks);
        let metadata = json!({
            "source": "embedded",
            "file_name": file_name,
            "chunks_used": embedded.len(),
            "method": "vector_search",
        });
        return Ok(Json(complete(&state, &prompt, metadata).await));
    }

    // ── Direct read fallback ──────────────────────────────
    let read = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || {
            read_file_with_limit(&path, DIRECT_READ_MAX_BYTES, DIRECT_READ_MAX_LINES)
        })
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    };
    let file = match read {
        Ok(Some(file)) => file,
        Ok(None) => {
            return Ok(Json(ExplainFileResponse {
                success: false,
                response: format!(
                    "Could not read file {file_name}. It may be binary or corrupted."
                ),
                metadata: json!({ "source": "read_error" }),
            }))
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {e}", path.display());
            return Ok(Json(ExplainFileResponse {
                success: false,
                response: format!("Error reading file: {e}"),
                metadata: json!({ "source": "error" }),
            }));
        }
    };

    let size_kb = file.size_bytes / 1024;
    let prompt = build_direct_explain_prompt(&file_name, size_kb, &file.content, file.truncated);
    let metadata = json!({
        "source": "direct_read",
        "file_name": file_name,
        "file_size_kb": size_kb,
        "was_truncated": file.truncated,
        "method": "direct_file_read",
    });
    Ok(Json(complete(&state, &prompt, metadata).await))
}

async fn complete(
    state: &AppState,
    prompt: &str,
    metadata: serde_json::Value,
) -> ExplainFileResponse {
    match state.llm.complete(prompt).await {
        Ok(text) => ExplainFileResponse {
            success: true,
            response: text,
            metadata,
        },
        Err(e) => {
            tracing::error!("LLM completion failed: {e:#}");
            let response = if crate::llm::is_timeout(&e) {
                "The language model timed out while explaining this file. Please retry."
            } else {
                "The language model is unavailable right now. Please try again later."
            };
            ExplainFileResponse {
                success: false,
                response: response.to_string(),
                metadata: json!({ "source": "llm_error" }),
            }
        }
    }
}

/// Locate `identifier` below `root`: as a relative path, as a path with its
/// leading `/` stripped, then by file name anywhere in the tree. Candidates
/// that resolve outside `root` are refused.
pub fn find_file_in_repo(root: &Path, identifier: &str) -> Option<PathBuf> {
    let canonical_root = root.canonicalize().ok()?;
    let within_root = |p: &Path| {
        p.canonicalize()
            .map(|c| c.starts_with(&canonical_root))
            .unwrap_or(false)
    };

    for candidate in [root.join(identifier), root.join(identifier.trim_start_matches('/'))] {
        if candidate.is_file() && within_root(&candidate) {
            return Some(candidate);
        }
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == identifier)
        .map(|e| e.into_path())
}

#[derive(Debug)]
pub struct LimitedRead {
    pub content: String,
    pub size_bytes: u64,
    pub truncated: bool,
}

/// Read a file as lossy UTF-8. Files over `max_bytes` keep their first
/// `max_lines` lines plus a note. `None` for binary or blank files.
pub fn read_file_with_limit(
    path: &Path,
    max_bytes: u64,
    max_lines: usize,
) -> std::io::Result<Option<LimitedRead>> {
    let bytes = std::fs::read(path)?;
    if bytes.contains(&0) {
        return Ok(None);
    }
    let size_bytes = bytes.len() as u64;
    let text = String::from_utf8_lossy(&bytes);
    if text.trim().is_empty() {
        return Ok(None);
    }

    if size_bytes <= max_bytes {
        return Ok(Some(LimitedRead {
            content: text.into_owned(),
            size_bytes,
            truncated: false,
        }));
    }

    let head: String = text.split_inclusive('\n').take(max_lines).collect();
    Ok(Some(LimitedRead {
        content: format!(
            "{head}\n\n... (File truncated - showing first {max_lines} lines of {}KB file)",
            size_bytes / 1024
        ),
        size_bytes,
        truncated: true,
    }))
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
