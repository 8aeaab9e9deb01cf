//! The single live chat session: which namespace is current, where its files
//! live on disk and how many of them were ingested.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session was reset while an ingest for `namespace` was running.
    #[error("session {namespace} was reset before ingestion finished")]
    Stale { namespace: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub namespace: String,
    pub root: Option<PathBuf>,
    pub files_processed: usize,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn fresh() -> Self {
        Self {
            namespace: Uuid::new_v4().to_string(),
            root: None,
            files_processed: 0,
            created_at: Utc::now(),
        }
    }

    /// Root is set, still exists on disk, and at least one file was ingested.
    pub fn is_ready(&self) -> bool {
        self.files_processed > 0 && self.root.as_deref().is_some_and(Path::exists)
    }
}

/// Owns the current [`Session`]. Handlers receive it through the app state.
pub struct SessionManager {
    data_dir: PathBuf,
    current: RwLock<Session>,
}

impl SessionManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let session = Session::fresh();
        tracing::info!("Created session {}", session.namespace);
        Self {
            data_dir: data_dir.into(),
            current: RwLock::new(session),
        }
    }

    /// Consistent copy of the current session.
    pub fn snapshot(&self) -> Session {
        self.current.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ready()
    }

    /// Working directory for a namespace's uploads and clones.
    pub fn workdir(&self, namespace: &str) -> PathBuf {
        self.data_dir.join(namespace)
    }

    /// Record a finished ingest. Refused when `namespace` is no longer current.
    pub fn bind(
        &self,
        namespace: &str,
        root: PathBuf,
        files_added: usize,
    ) -> Result<Session, SessionError> {
        let mut session = self.current.write();
        if session.namespace != namespace {
            return Err(SessionError::Stale {
                namespace: namespace.to_string(),
            });
        }
        session.root = Some(root);
        session.files_processed += files_added;
        Ok(session.clone())
    }

    /// Drop the current session's files and start a new one.
    pub fn reset(&self) -> Session {
        let (fresh, old_dir) = self.rotate();
        if old_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&old_dir) {
                tracing::warn!("Failed to remove {}: {e}", old_dir.display());
            }
        }
        fresh
    }

    /// Swap in a fresh session under the lock. Returns it together with the
    /// previous session's directory, which the caller removes unlocked.
    fn rotate(&self) -> (Session, PathBuf) {
        let mut session = self.current.write();
        let old = std::mem::replace(&mut *session, Session::fresh());
        tracing::info!("Reset session {} -> {}", old.namespace, session.namespace);
        let old_dir = old.root.unwrap_or_else(|| self.workdir(&old.namespace));
        (session.clone(), old_dir)
    }
}
