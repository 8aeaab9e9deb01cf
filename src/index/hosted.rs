//! Integrated-embedding vector index over HTTP (Pinecone records API).
//!
//! Records are embedded server-side from their `chunk_text` field, and
//! searches can ask the service to rerank the initial candidates with a
//! hosted reranker before returning them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ChunkRecord, SearchRequest, VectorIndex, HIT_FIELDS};
use crate::config::IndexConfig;
use crate::models::RetrievedHit;

pub struct HostedIndex {
    client: reqwest::Client,
    host: String,
    api_key: String,
    api_version: String,
    batch_size: usize,
}

impl HostedIndex {
    /// Connect to the configured index. Without an explicit host the index is
    /// looked up by name on the control plane, and created for the configured
    /// embedding model if it does not exist yet.
    pub async fn connect(client: reqwest::Client, config: &IndexConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("PINECONE_API_KEY is not configured")?;

        let host = match &config.host {
            Some(host) => host.clone(),
            None => resolve_host(&client, config, &api_key).await?,
        };

        tracing::info!("Vector index '{}' at {}", config.index_name, host);

        Ok(Self {
            client,
            host: normalize_host(&host),
            api_key,
            api_version: config.api_version.clone(),
            batch_size: config.upsert_batch_size.max(1),
        })
    }

    fn namespace_url(&self, namespace: &str, op: &str) -> String {
        format!("{}/records/namespaces/{namespace}/{op}", self.host)
    }
}

#[async_trait]
impl VectorIndex for HostedIndex {
    async fn upsert(&self, namespace: &str, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let url = self.namespace_url(namespace, "upsert");
        let total_batches = records.len().div_ceil(self.batch_size);

        for (n, batch) in records.chunks(self.batch_size).enumerate() {
            let body = to_ndjson(batch)?;
            let resp = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", &self.api_version)
                .header("Content-Type", "application/x-ndjson")
                .body(body)
                .send()
                .await
                .context("Failed to reach vector index for upsert")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Vector index upsert returned {status}: {body}");
            }

            tracing::info!(
                "Batch {}/{total_batches}: upserted {} records into '{namespace}'",
                n + 1,
                batch.len()
            );
        }

        Ok(())
    }

    async fn search(&self, namespace: &str, request: &SearchRequest) -> Result<Vec<RetrievedHit>> {
        let url = self.namespace_url(namespace, "search");

        let resp = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .json(&search_body(request))
            .send()
            .await
            .context("Failed to reach vector index for search")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Vector index search returned {status}: {body}");
        }

        let body: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse vector index search response")?;

        Ok(into_hits(body, request.rerank.is_some()))
    }
}

// ─── Control plane ───────────────────────────────────────

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
}

async fn resolve_host(
    client: &reqwest::Client,
    config: &IndexConfig,
    api_key: &str,
) -> Result<String> {
    let base = config.control_plane_url.trim_end_matches('/');
    let describe_url = format!("{base}/indexes/{}", config.index_name);

    let resp = client
        .get(&describe_url)
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", &config.api_version)
        .send()
        .await
        .context("Failed to reach vector index control plane")?;

    if resp.status().is_success() {
        let desc: IndexDescription = resp.json().await.context("Bad index description")?;
        return Ok(desc.host);
    }

    if resp.status() != reqwest::StatusCode::NOT_FOUND {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Describing index '{}' returned {status}: {body}", config.index_name);
    }

    tracing::info!(
        "Index '{}' not found; creating it for model {}",
        config.index_name,
        config.embed_model
    );

    let resp = client
        .post(format!("{base}/indexes/create-for-model"))
        .header("Api-Key", api_key)
        .header("X-Pinecone-API-Version", &config.api_version)
        .json(&create_index_body(config))
        .send()
        .await
        .context("Failed to create vector index")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Creating index '{}' returned {status}: {body}", config.index_name);
    }

    let desc: IndexDescription = resp.json().await.context("Bad create-index response")?;
    Ok(desc.host)
}

fn create_index_body(config: &IndexConfig) -> serde_json::Value {
    json!({
        "name": config.index_name,
        "cloud": config.cloud,
        "region": config.region,
        "embed": {
            "model": config.embed_model,
            "field_map": { "text": "chunk_text" }
        },
        "deletion_protection": "disabled"
    })
}

/// The control plane reports bare hostnames.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

// ─── Data plane payloads ─────────────────────────────────

fn to_ndjson(records: &[ChunkRecord]) -> Result<String> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

fn search_body(request: &SearchRequest) -> serde_json::Value {
    let mut body = json!({
        "query": {
            "inputs": { "text": request.query },
            "top_k": request.top_k,
        },
        "fields": HIT_FIELDS,
    });
    if let Some(rerank) = &request.rerank {
        body["rerank"] = json!(rerank);
    }
    body
}

#[derive(Deserialize)]
struct SearchResponse {
    result: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_score", default)]
    score: f32,
    #[serde(default)]
    fields: HitFields,
}

#[derive(Default, Deserialize)]
struct HitFields {
    chunk_text: Option<String>,
    file_name: Option<String>,
    file_path: Option<String>,
    language: Option<String>,
}

fn into_hits(body: SearchResponse, reranked: bool) -> Vec<RetrievedHit> {
    body.result
        .hits
        .into_iter()
        .filter_map(|hit| {
            let Some(text) = hit.fields.chunk_text else {
                tracing::warn!("Skipping hit {} without chunk_text", hit.id);
                return None;
            };
            let unknown = || "unknown".to_string();
            Some(RetrievedHit {
                text,
                file_name: hit.fields.file_name.unwrap_or_else(unknown),
                file_path: hit.fields.file_path.unwrap_or_else(unknown),
                language: hit.fields.language.unwrap_or_else(unknown),
                score: hit.score,
                reranked,
            })
        })
        .collect()
}
