//! Ingestion: turn uploaded files or a cloned repository into chunk records
//! in the session's namespace.
//!
//! ```text
//!  upload / clone ──▶ FileFilter ──▶ RecursiveSplitter ──▶ ChunkRecord ──▶ VectorIndex::upsert
//! ```

pub mod clone;
pub mod splitter;
pub mod walk;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::ChunkingConfig;
use crate::index::{ChunkRecord, VectorIndex};
use crate::models::Chunk;

pub use splitter::{ChunkingError, RecursiveSplitter};
pub use walk::{FileFilter, SourceFile};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    #[error("No valid code files found")]
    NoValidFiles,
    #[error("Only https://, http:// and git:// repository URLs are allowed: {0}")]
    UnsupportedUrl(String),
    #[error("Invalid upload path: {0}")]
    InvalidPath(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// Caller mistakes (HTTP 400) as opposed to upstream or I/O failures.
    pub fn is_input_error(&self) -> bool {
        !matches!(self, IngestError::Other(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub files_processed: usize,
    pub chunks_indexed: usize,
}

/// Splits files and upserts their chunks into the index.
pub struct Ingestor {
    index: Arc<dyn VectorIndex>,
    filter: Arc<FileFilter>,
}

impl Ingestor {
    pub fn new(index: Arc<dyn VectorIndex>) -> anyhow::Result<Self> {
        Ok(Self {
            index,
            filter: Arc::new(FileFilter::new()?),
        })
    }

    /// Ingest every accepted file below `dir`. Paths are recorded relative
    /// to `root`.
    pub async fn ingest_dir(
        &self,
        namespace: &str,
        root: &Path,
        dir: &Path,
        chunking: ChunkingConfig,
    ) -> Result<IngestSummary, IngestError> {
        let splitter = RecursiveSplitter::new(chunking)?;
        let filter = self.filter.clone();
        let (root, dir) = (root.to_path_buf(), dir.to_path_buf());

        let files = tokio::task::spawn_blocking(move || {
            let mut files = filter.collect(&dir);
            if let Ok(prefix) = dir.strip_prefix(&root) {
                let prefix = prefix.to_string_lossy().replace('\\', "/");
                if !prefix.is_empty() {
                    for file in &mut files {
                        file.relative_path = format!("{prefix}/{}", file.relative_path);
                    }
                }
            }
            files
        })
        .await
        .map_err(anyhow::Error::from)?;

        self.ingest_files(namespace, files, splitter).await
    }

    /// Ingest specific files (already written below `root`).
    pub async fn ingest_paths(
        &self,
        namespace: &str,
        root: &Path,
        paths: Vec<PathBuf>,
        chunking: ChunkingConfig,
    ) -> Result<IngestSummary, IngestError> {
        let splitter = RecursiveSplitter::new(chunking)?;
        let filter = self.filter.clone();
        let root = root.to_path_buf();

        let files = tokio::task::spawn_blocking(move || {
            paths
                .iter()
                .filter_map(|p| filter.read(&root, p))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(anyhow::Error::from)?;

        self.ingest_files(namespace, files, splitter).await
    }

    async fn ingest_files(
        &self,
        namespace: &str,
        files: Vec<SourceFile>,
        splitter: RecursiveSplitter,
    ) -> Result<IngestSummary, IngestError> {
        let chunks = chunk_files(&files, &splitter);
        if chunks.is_empty() {
            return Err(IngestError::NoValidFiles);
        }

        let files_processed = {
            let mut seen: Vec<&str> = chunks.iter().map(|c| c.file_path.as_str()).collect();
            seen.dedup();
            seen.len()
        };
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .map(|chunk| ChunkRecord::new(namespace, chunk))
            .collect();

        tracing::info!(
            "Upserting {} chunks from {files_processed} files into namespace {namespace}",
            records.len()
        );
        self.index.upsert(namespace, &records).await?;

        Ok(IngestSummary {
            files_processed,
            chunks_indexed: records.len(),
        })
    }
}

/// Split each file; `chunk_index` restarts per file, `position` runs across
/// the whole batch.
pub fn chunk_files(files: &[SourceFile], splitter: &RecursiveSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for file in files {
        for (chunk_index, text) in splitter.split(&file.content).into_iter().enumerate() {
            chunks.push(Chunk {
                text,
                file_name: file.file_name.clone(),
                file_path: file.relative_path.clone(),
                language: file.language.clone(),
                chunk_index,
                position: chunks.len(),
            });
        }
    }
    chunks
}

/// Resolve an uploaded file name below `root`, refusing absolute paths and
/// `..` components.
pub fn upload_target(root: &Path, file_name: &str) -> Result<PathBuf, IngestError> {
    let relative = Path::new(file_name.trim());
    let mut target = root.to_path_buf();
    let mut depth = 0;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                target.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            _ => return Err(IngestError::InvalidPath(file_name.to_string())),
        }
    }
    if depth == 0 {
        return Err(IngestError::InvalidPath(file_name.to_string()));
    }
    Ok(target)
}

/// Write one uploaded file below `root`, creating parent directories.
pub fn save_upload(root: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, IngestError> {
    let target = upload_target(root, file_name)?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(anyhow::Error::from)?;
    }
    std::fs::write(&target, bytes).map_err(anyhow::Error::from)?;
    Ok(target)
}
