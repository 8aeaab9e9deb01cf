//! Integration tests for the codechat pipeline.
//!
//! These tests run ingestion, retrieval and chat end to end against an
//! in-process vector index and LLM, so no network access is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use parking_lot::Mutex;

use codechat::api;
use codechat::config::{ChunkingConfig, Config};
use codechat::index::{ChunkRecord, SearchRequest, VectorIndex};
use codechat::llm::LlmClient;
use codechat::models::{ChatRequest, ExplainFileRequest, RetrievedHit};
use codechat::state::AppState;

/// Stores records per namespace and returns them in insertion order.
#[derive(Default)]
struct MemoryIndex {
    records: Mutex<HashMap<String, Vec<ChunkRecord>>>,
    searches: Mutex<Vec<(String, SearchRequest)>>,
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, namespace: &str, records: &[ChunkRecord]) -> anyhow::Result<()> {
        self.records
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn search(
        &self,
        namespace: &str,
        request: &SearchRequest,
    ) -> anyhow::Result<Vec<RetrievedHit>> {
        self.searches
            .lock()
            .push((namespace.to_string(), request.clone()));

        let records = self.records.lock();
        let limit = request
            .rerank
            .as_ref()
            .map(|r| r.top_n)
            .unwrap_or(request.top_k);
        Ok(records
            .get(namespace)
            .map(|records| {
                records
                    .iter()
                    .take(limit)
                    .enumerate()
                    .map(|(i, r)| RetrievedHit {
                        text: r.chunk_text.clone(),
                        file_name: r.file_name.clone(),
                        file_path: r.file_path.clone(),
                        language: r.language.clone(),
                        score: 1.0 - i as f32 * 0.1,
                        reranked: request.rerank.is_some(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Clone, Copy)]
enum LlmMode {
    Answer,
    Timeout,
    Down,
}

struct ScriptedLlm {
    mode: LlmMode,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(mode: LlmMode) -> Self {
        Self {
            mode,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.lock().push(prompt.to_string());
        match self.mode {
            LlmMode::Answer => Ok("The project greets the user.".to_string()),
            LlmMode::Timeout => {
                let elapsed = tokio::time::timeout(
                    Duration::from_millis(1),
                    std::future::pending::<()>(),
                )
                .await
                .unwrap_err();
                Err(anyhow::Error::new(elapsed).context("Chat completion request"))
            }
            LlmMode::Down => anyhow::bail!("Chat completion API returned 503: overloaded"),
        }
    }
}

struct Harness {
    _tmp: tempfile::TempDir,
    state: AppState,
    index: Arc<MemoryIndex>,
    llm: Arc<ScriptedLlm>,
}

fn harness(mode: LlmMode) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: tmp.path().join("data"),
        ..Config::default()
    };
    let index = Arc::new(MemoryIndex::default());
    let llm = Arc::new(ScriptedLlm::new(mode));
    let state = AppState::with_backends(config, index.clone(), llm.clone()).unwrap();
    Harness {
        _tmp: tmp,
        state,
        index,
        llm,
    }
}

/// Write a small Python project into the session and ingest it the way the
/// GitHub upload does.
async fn ingest_sample_project(state: &AppState) -> String {
    let namespace = state.session.snapshot().namespace;
    let root = state.session.workdir(&namespace);
    let repo = root.join("demo");
    std::fs::create_dir_all(repo.join("pkg")).unwrap();
    std::fs::write(
        repo.join("app.py"),
        "from pkg.greet import greet\n\n\ndef main():\n    print(greet('world'))\n",
    )
    .unwrap();
    std::fs::write(
        repo.join("pkg/greet.py"),
        "def greet(name):\n    return f'Hello, {name}!'\n",
    )
    .unwrap();
    std::fs::write(repo.join("README.md"), "# Demo\n\nGreets people.\n").unwrap();
    std::fs::write(repo.join("package.json"), "{}").unwrap();

    let summary = state
        .ingestor
        .ingest_dir(&namespace, &root, &repo, ChunkingConfig::default())
        .await
        .unwrap();
    assert_eq!(summary.files_processed, 3);
    state
        .session
        .bind(&namespace, root, summary.files_processed)
        .unwrap();
    namespace
}

fn chat_request(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        max_tokens: None,
    }
}

#[tokio::test]
async fn test_chat_before_upload_is_not_ready() {
    let h = harness(LlmMode::Answer);
    let response = api::chat::answer(&h.state, chat_request("summarize this project"))
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(response.response, api::chat::NOT_READY_MESSAGE);
    assert_eq!(response.metadata.chunks_found, 0);
    assert!(h.index.searches.lock().is_empty());
    assert!(h.llm.prompts.lock().is_empty());
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let h = harness(LlmMode::Answer);
    ingest_sample_project(&h.state).await;

    let (status, _) = api::chat::answer(&h.state, chat_request("   "))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ingest_then_chat_end_to_end() {
    let h = harness(LlmMode::Answer);
    let namespace = ingest_sample_project(&h.state).await;
    assert!(h.state.session.is_ready());

    let Json(response) = api::chat::chat(
        State(h.state.clone()),
        Json(chat_request("summarize this project")),
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(response.response, "The project greets the user.");
    let metadata = &response.metadata;
    assert_eq!(metadata.chunks_found, 3);
    assert_eq!(metadata.files_involved, Some(3));
    assert_eq!(metadata.retrieval_reranked, Some(true));
    assert!(metadata.estimated_tokens.unwrap() > 0);
    assert_eq!(metadata.analysis.unwrap().base_k, 8);

    // The planner's numbers reach the index unchanged
    let searches = h.index.searches.lock();
    let (searched_ns, request) = &searches[0];
    assert_eq!(searched_ns, &namespace);
    assert_eq!(request.top_k, 8);
    let rerank = request.rerank.as_ref().unwrap();
    assert_eq!(rerank.top_n, 4);
    assert_eq!(rerank.model, "bge-reranker-v2-m3");

    let prompts = h.llm.prompts.lock();
    assert!(prompts[0].contains("from 3 files with 3 relevant chunks"));
    assert!(prompts[0].contains("QUESTION: summarize this project"));
    assert!(prompts[0].contains("**File: greet.py** (Language: python"));
}

#[tokio::test]
async fn test_token_budget_limits_context() {
    let h = harness(LlmMode::Answer);
    ingest_sample_project(&h.state).await;

    let response = api::chat::answer(
        &h.state,
        ChatRequest {
            message: "summarize this project".to_string(),
            max_tokens: Some(1),
        },
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(response.metadata.chunks_found, 1);
}

#[tokio::test]
async fn test_no_hits_is_successful_fallback() {
    let h = harness(LlmMode::Answer);
    ingest_sample_project(&h.state).await;
    h.index.records.lock().clear();

    let response = api::chat::answer(&h.state, chat_request("where is main()"))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(response.response, api::chat::NO_HITS_MESSAGE);
    assert!(h.llm.prompts.lock().is_empty());
}

#[tokio::test]
async fn test_llm_timeout_is_user_visible() {
    let h = harness(LlmMode::Timeout);
    ingest_sample_project(&h.state).await;

    let response = api::chat::answer(&h.state, chat_request("explain greet"))
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.response.contains("timed out"));
    assert!(response.response.contains("retry"));
}

#[tokio::test]
async fn test_llm_failure_is_user_visible() {
    let h = harness(LlmMode::Down);
    ingest_sample_project(&h.state).await;

    let response = api::chat::answer(&h.state, chat_request("explain greet"))
        .await
        .unwrap();
    assert!(!response.success);
    assert!(!response.response.contains("503"));
    assert_eq!(response.metadata.chunks_found, 3);
}

#[tokio::test]
async fn test_reset_session_discards_files() {
    let h = harness(LlmMode::Answer);
    let old = ingest_sample_project(&h.state).await;
    let old_root = h.state.session.workdir(&old);
    assert!(old_root.exists());

    let Json(reset) = api::session::reset_session(State(h.state.clone())).await;
    assert!(reset.success);
    assert_ne!(reset.namespace, old);
    assert!(!old_root.exists());

    let Json(info) = api::session::session_info(State(h.state.clone())).await;
    assert_eq!(info.namespace, reset.namespace);
    assert!(!info.has_data);
    assert_eq!(info.files_processed, 0);

    let response = api::chat::answer(&h.state, chat_request("summarize this project"))
        .await
        .unwrap();
    assert!(!response.success);
}

#[tokio::test]
async fn test_ingest_finishing_after_reset_is_stale() {
    let h = harness(LlmMode::Answer);
    let namespace = h.state.session.snapshot().namespace;
    h.state.session.reset();

    let err = h
        .state
        .session
        .bind(&namespace, h.state.session.workdir(&namespace), 2)
        .unwrap_err();
    assert!(err.to_string().contains(&namespace));
    assert!(!h.state.session.is_ready());
}

#[tokio::test]
async fn test_file_tree_lists_session_files() {
    let h = harness(LlmMode::Answer);
    let Json(empty) = api::files::file_tree(State(h.state.clone())).await;
    assert_eq!(empty["success"], false);

    ingest_sample_project(&h.state).await;
    let Json(tree) = api::files::file_tree(State(h.state.clone())).await;
    assert_eq!(tree["success"], true);
    assert_eq!(tree["total_files"], 4);
    assert_eq!(tree["files_processed"], 3);
    assert_eq!(tree["tree"][0]["name"], "demo");
    assert_eq!(tree["tree"][0]["type"], "folder");
}

#[tokio::test]
async fn test_explain_file_prefers_embedded_chunks() {
    let h = harness(LlmMode::Answer);
    ingest_sample_project(&h.state).await;

    let Json(response) = api::files::explain_file(
        State(h.state.clone()),
        Json(ExplainFileRequest {
            file_path: Some("app.py".to_string()),
        }),
    )
    .await
    .unwrap();

    assert!(response.success);
    assert_eq!(response.metadata["source"], "embedded");
    assert_eq!(response.metadata["chunks_used"], 1);
    assert!(h.llm.prompts.lock()[0].contains("**app.py**"));
}

#[tokio::test]
async fn test_explain_file_reads_unindexed_files() {
    let h = harness(LlmMode::Answer);
    let namespace = ingest_sample_project(&h.state).await;
    let root = h.state.session.workdir(&namespace);

    let Json(response) = api::files::explain_file(
        State(h.state.clone()),
        Json(ExplainFileRequest {
            file_path: Some("demo/package.json".to_string()),
        }),
    )
    .await
    .unwrap();
    assert!(response.success);
    assert_eq!(response.metadata["source"], "direct_read");
    assert_eq!(response.metadata["was_truncated"], false);

    let Json(missing) = api::files::explain_file(
        State(h.state.clone()),
        Json(ExplainFileRequest {
            file_path: Some("nope.rs".to_string()),
        }),
    )
    .await
    .unwrap();
    assert!(!missing.success);
    assert_eq!(missing.metadata["source"], "file_not_found");

    let (status, _) = api::files::explain_file(
        State(h.state.clone()),
        Json(ExplainFileRequest { file_path: None }),
    )
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(root.join("demo/package.json").exists());
}

/// Build the multipart body a browser sends to /upload-file.
async fn upload_form(files: &[(&str, &str)], config: Option<&str>) -> Multipart {
    let boundary = "codechat-test-boundary";
    let mut body = String::new();
    for (name, content) in files {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    if let Some(config) = config {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"config\"\r\n\r\n{config}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    let request: Request = axum::http::Request::builder()
        .method("POST")
        .uri("/upload-file")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    Multipart::from_request(request, &()).await.unwrap()
}

#[tokio::test]
async fn test_successive_uploads_accumulate_in_one_session() {
    let h = harness(LlmMode::Answer);
    let namespace = h.state.session.snapshot().namespace;

    let form = upload_form(
        &[
            ("app.py", "def main():\n    return util.helper()\n"),
            ("lib/util.py", "def helper():\n    return 7\n"),
            ("package.json", "{}"),
        ],
        Some(r#"{"chunk_size": 400, "chunk_overlap": 40}"#),
    )
    .await;
    let Json(first) = api::upload::upload_file(State(h.state.clone()), form)
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.namespace, namespace);
    assert_eq!(first.files_processed, 2);
    assert_eq!(first.config.chunk_size, 400);
    assert_eq!(first.config.chunk_overlap, 40);
    assert!(h.state.session.is_ready());

    let root = h.state.session.workdir(&namespace);
    assert!(root.join("lib/util.py").is_file());

    let form = upload_form(&[("README.md", "# Helper\n\nReturns seven.\n")], None).await;
    let Json(second) = api::upload::upload_file(State(h.state.clone()), form)
        .await
        .unwrap();
    assert_eq!(second.namespace, namespace);
    assert_eq!(second.files_processed, 1);
    assert_eq!(second.config, ChunkingConfig::default());

    let session = h.state.session.snapshot();
    assert_eq!(session.namespace, namespace);
    assert_eq!(session.files_processed, 3);
    assert_eq!(session.root.as_deref(), Some(root.as_path()));

    let mut paths: Vec<String> = h.index.records.lock()[&namespace]
        .iter()
        .map(|r| r.file_path.clone())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["README.md", "app.py", "lib/util.py"]);

    // The stored path is what explain-file matches embedded chunks against.
    let Json(explained) = api::files::explain_file(
        State(h.state.clone()),
        Json(ExplainFileRequest {
            file_path: Some("lib/util.py".to_string()),
        }),
    )
    .await
    .unwrap();
    assert!(explained.success);
    assert_eq!(explained.metadata["source"], "embedded");
    assert_eq!(explained.metadata["chunks_used"], 1);
}

#[tokio::test]
async fn test_upload_without_files_is_bad_request() {
    let h = harness(LlmMode::Answer);
    let form = upload_form(&[], Some(r#"{"chunk_size": 400}"#)).await;
    let (status, _) = api::upload::upload_file(State(h.state.clone()), form)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!h.state.session.is_ready());
}

#[tokio::test]
async fn test_query_analysis_endpoint() {
    let h = harness(LlmMode::Answer);
    let Json(response) = api::analysis::query_analysis(
        State(h.state.clone()),
        Path("analyze the architecture of this project".to_string()),
    )
    .await
    .unwrap();

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["analysis"]["intent"], "analysis");
    assert_eq!(json["analysis"]["rerank_top_n"], 5);
    assert_eq!(json["strategy"]["reranking"], "enabled");

    let (status, _) = api::analysis::query_analysis(State(h.state.clone()), Path(" ".to_string()))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
