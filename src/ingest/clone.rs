use anyhow::Context;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::IngestError;

/// Only network URLs may be cloned; `file://` and local paths are refused.
pub fn validate_repo_url(url: &str) -> Result<(), IngestError> {
    let url = url.trim();
    let allowed = ["https://", "http://", "git://"]
        .iter()
        .any(|scheme| url.starts_with(scheme) && url.len() > scheme.len());
    if allowed {
        Ok(())
    } else {
        Err(IngestError::UnsupportedUrl(url.to_string()))
    }
}

/// Last path segment of the URL without a trailing `.git`.
pub fn repo_name_from_url(url: &str) -> String {
    let name = url
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git");
    let name: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        "repo".to_string()
    } else {
        name
    }
}

/// `parent/name`, or `parent/name-2`, `parent/name-3`... when taken.
pub fn unique_dir(parent: &Path, name: &str) -> PathBuf {
    let candidate = parent.join(name);
    if !candidate.exists() {
        return candidate;
    }
    (2..)
        .map(|n| parent.join(format!("{name}-{n}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Clone `url` into `target` on a blocking thread, giving up after `timeout`.
pub async fn clone_repo(url: &str, target: &Path, timeout: Duration) -> Result<(), IngestError> {
    validate_repo_url(url)?;

    let url = url.trim().to_string();
    let target = target.to_path_buf();
    tracing::info!("Cloning {url} into {}", target.display());

    let task = tokio::task::spawn_blocking({
        let url = url.clone();
        let target = target.clone();
        move || {
            git2::Repository::clone(&url, &target)
                .map(|_| ())
                .with_context(|| format!("Failed to clone {url}"))
        }
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            joined.context("Clone task panicked")??;
            tracing::info!("Clone complete: {}", target.display());
            Ok(())
        }
        Err(elapsed) => {
            tracing::warn!("Clone of {url} timed out after {}s", timeout.as_secs());
            Err(IngestError::Other(
                anyhow::Error::new(elapsed).context(format!("Cloning {url} timed out")),
            ))
        }
    }
}
