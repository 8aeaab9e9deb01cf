//! Token-bounded context assembly over ranked hits.

use serde::Serialize;

use super::QueryAnalysis;
use crate::models::RetrievedHit;

/// Estimates how many model tokens a piece of text costs.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// Coarse approximation: one token per `chars_per_token` characters.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    pub chars_per_token: usize,
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count() / self.chars_per_token.max(1)
    }
}

/// Per-file statistics over accepted hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub file_name: String,
    pub count: usize,
    pub language: String,
}

/// Hits accepted under a token budget, in rank order.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub analysis: QueryAnalysis,
    pub hits: Vec<RetrievedHit>,
    /// Keyed by file name, first-seen order
    pub files: Vec<FileSummary>,
    pub total_tokens: usize,
    /// Ranked hits left out because the budget ran out
    pub dropped: usize,
}

impl ContextBundle {
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn reranked(&self) -> bool {
        self.hits.first().is_some_and(|h| h.reranked)
    }
}

/// Greedy rank-order prefix of `hits` whose estimated cost fits `budget`.
///
/// Stops at the first hit that does not fit; lower-ranked hits are never
/// pulled forward. The top hit is always kept, even when it alone exceeds
/// the budget.
pub fn assemble(
    analysis: QueryAnalysis,
    hits: Vec<RetrievedHit>,
    budget: usize,
    estimator: &dyn TokenEstimator,
) -> ContextBundle {
    let ranked = hits.len();
    let mut accepted = Vec::with_capacity(ranked);
    let mut files: Vec<FileSummary> = Vec::new();
    let mut total_tokens = 0usize;

    for hit in hits {
        let cost = estimator.estimate(&hit.text);
        if total_tokens + cost > budget {
            if accepted.is_empty() {
                tracing::warn!(
                    "Top hit ({cost} tokens) exceeds budget of {budget}; keeping it alone"
                );
                total_tokens += cost;
                record_file(&mut files, &hit);
                accepted.push(hit);
            }
            break;
        }
        total_tokens += cost;
        record_file(&mut files, &hit);
        accepted.push(hit);
    }

    let dropped = ranked - accepted.len();
    if dropped > 0 {
        tracing::info!(
            "Token budget reached: using {} of {ranked} chunks (~{total_tokens} tokens)",
            accepted.len()
        );
    }

    ContextBundle {
        analysis,
        hits: accepted,
        files,
        total_tokens,
        dropped,
    }
}

fn record_file(files: &mut Vec<FileSummary>, hit: &RetrievedHit) {
    match files.iter_mut().find(|f| f.file_name == hit.file_name) {
        Some(f) => f.count += 1,
        None => files.push(FileSummary {
            file_name: hit.file_name.clone(),
            count: 1,
            language: hit.language.clone(),
        }),
    }
}
