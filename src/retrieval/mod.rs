//! Query-adaptive retrieval.
//!
//! A query is classified (intent, complexity, specificity), the
//! classification picks how wide to search and whether to rerank, and the
//! ranked hits are cut down to a token budget:
//!
//! ```text
//!   query ──▶ classify ──▶ plan (base_k, rerank_top_n)
//!                               │
//!                               ▼
//!                     index.search(top_k = base_k,
//!                                  rerank.top_n = rerank_top_n)
//!                               │ ranked hits
//!                               ▼
//!                     assemble under token budget ──▶ ContextBundle
//! ```

pub mod assembler;
pub mod classifier;
pub mod planner;

use serde::Serialize;
use std::sync::{Arc, LazyLock};
use thiserror::Error;

pub use assembler::{assemble, CharRatioEstimator, ContextBundle, FileSummary, TokenEstimator};
pub use classifier::{Intent, Level};
pub use planner::{BaseKTable, RetrievalPlan};

use crate::index::{RerankSpec, SearchRequest, VectorIndex};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Empty query")]
    Empty,
}

/// A trimmed, non-empty user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Retrieval strategy derived from one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryAnalysis {
    pub intent: Intent,
    pub complexity: Level,
    /// Not used for planning yet
    pub specificity: Level,
    pub base_k: usize,
    pub should_rerank: bool,
    pub rerank_top_n: usize,
}

impl QueryAnalysis {
    /// One-line human description of the strategy.
    pub fn describe(&self) -> String {
        format!(
            "This {} complexity {} query will retrieve {} chunks",
            self.complexity.as_str(),
            self.intent.as_str(),
            self.base_k
        )
    }
}

static DEFAULT_TABLE: LazyLock<BaseKTable> = LazyLock::new(BaseKTable::default);

/// Classify and plan with the default `base_k` table.
pub fn analyze(query: &str) -> QueryAnalysis {
    analyze_with(&DEFAULT_TABLE, query)
}

pub fn analyze_with(table: &BaseKTable, query: &str) -> QueryAnalysis {
    let c = classifier::classify(query);
    let plan = planner::plan(table, c.intent, c.complexity);
    QueryAnalysis {
        intent: c.intent,
        complexity: c.complexity,
        specificity: c.specificity,
        base_k: plan.base_k,
        should_rerank: plan.should_rerank,
        rerank_top_n: plan.rerank_top_n,
    }
}

/// Plans a search per query, runs it against the vector index and trims
/// the ranked hits to a token budget.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    table: BaseKTable,
    estimator: Box<dyn TokenEstimator>,
    rerank_model: String,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, rerank_model: impl Into<String>) -> Self {
        Self {
            index,
            table: BaseKTable::default(),
            estimator: Box::new(CharRatioEstimator::default()),
            rerank_model: rerank_model.into(),
        }
    }

    pub fn with_estimator(mut self, estimator: Box<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_table(mut self, table: BaseKTable) -> Self {
        self.table = table;
        self
    }

    pub fn analyze(&self, query: &Query) -> QueryAnalysis {
        analyze_with(&self.table, query.as_str())
    }

    /// Search request the index receives for `analysis`.
    pub fn search_request(&self, query: &Query, analysis: &QueryAnalysis) -> SearchRequest {
        SearchRequest {
            query: query.as_str().to_string(),
            top_k: analysis.base_k,
            rerank: analysis.should_rerank.then(|| RerankSpec {
                model: self.rerank_model.clone(),
                top_n: analysis.rerank_top_n,
                rank_fields: vec!["chunk_text".to_string()],
            }),
        }
    }

    /// Returns `None` for an invalid query, when nothing matched, or when the
    /// index failed (logged). Never a partial bundle.
    pub async fn plan_and_retrieve(
        &self,
        namespace: &str,
        query: &str,
        token_budget: usize,
    ) -> Option<ContextBundle> {
        let query = match Query::parse(query) {
            Ok(q) => q,
            Err(e) => {
                tracing::debug!("Skipping retrieval: {e}");
                return None;
            }
        };

        let analysis = self.analyze(&query);
        tracing::info!(
            intent = analysis.intent.as_str(),
            complexity = analysis.complexity.as_str(),
            specificity = analysis.specificity.as_str(),
            base_k = analysis.base_k,
            should_rerank = analysis.should_rerank,
            rerank_top_n = analysis.rerank_top_n,
            "Query analysis"
        );

        let request = self.search_request(&query, &analysis);
        let hits = match self.index.search(namespace, &request).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!("Vector search failed: {e:#}");
                return None;
            }
        };

        if hits.is_empty() {
            tracing::warn!("No results found");
            return None;
        }

        let bundle = assemble(analysis, hits, token_budget, self.estimator.as_ref());
        tracing::info!(
            "Retrieved {} chunks (~{} tokens)",
            bundle.hits.len(),
            bundle.total_tokens
        );
        Some(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parse_rejects_blank() {
        assert_eq!(Query::parse(""), Err(QueryError::Empty));
        assert_eq!(Query::parse(" \n\t "), Err(QueryError::Empty));
        assert_eq!(Query::parse("  hi  ").unwrap().as_str(), "hi");
    }

    #[test]
    fn test_summary_query_reranks() {
        let a = analyze("summarize this project");
        assert_eq!(a.intent, Intent::Summary);
        assert!(a.should_rerank);
        assert_eq!(a.base_k, 8);
        assert_eq!(a.rerank_top_n, 4);
    }

    #[test]
    fn test_general_query_plan() {
        let a = analyze("xyz123");
        assert_eq!(a.intent, Intent::General);
        assert!(!a.should_rerank);
        assert_eq!(a.base_k, 5);
        assert_eq!(a.rerank_top_n, 5);
    }

    #[test]
    fn test_explain_architecture_query() {
        // "explain" sits in the summary list, which outranks analysis
        let a = analyze("explain the architecture of this project");
        assert_eq!(a.intent, Intent::Summary);
        assert_eq!(a.complexity, Level::Low);
        assert_eq!(a.base_k, 8);
        assert!(a.should_rerank);
        assert_eq!(a.rerank_top_n, 4);
    }

    #[test]
    fn test_analyze_architecture_query() {
        let a = analyze("analyze the architecture of this project");
        assert_eq!(a.intent, Intent::Analysis);
        assert_eq!(a.complexity, Level::Low);
        assert_eq!(a.base_k, 10);
        assert!(a.should_rerank);
        assert_eq!(a.rerank_top_n, 5);
    }

    #[test]
    fn test_specific_query_skips_rerank() {
        let a = analyze("find the function that loads files");
        assert_eq!(a.intent, Intent::Specific);
        assert!(!a.should_rerank);
        assert_eq!(a.rerank_top_n, a.base_k);
    }

    #[test]
    fn test_describe() {
        let a = analyze("xyz123");
        assert_eq!(a.describe(), "This low complexity general query will retrieve 5 chunks");
    }

    #[test]
    fn test_analysis_serializes_snake_case() {
        let json = serde_json::to_value(analyze("debug the crash")).unwrap();
        assert_eq!(json["intent"], "bug_check");
        assert_eq!(json["complexity"], "low");
        assert_eq!(json["should_rerank"], true);
    }

    // ─── plan_and_retrieve ───────────────────────────────

    use crate::index::ChunkRecord;
    use crate::models::RetrievedHit;
    use parking_lot::Mutex;

    struct StubIndex {
        hits: Result<Vec<RetrievedHit>, String>,
        requests: Mutex<Vec<SearchRequest>>,
    }

    impl StubIndex {
        fn returning(hits: Vec<RetrievedHit>) -> Arc<Self> {
            Arc::new(Self {
                hits: Ok(hits),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                hits: Err("index unavailable".into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl VectorIndex for StubIndex {
        async fn upsert(&self, _: &str, _: &[ChunkRecord]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn search(
            &self,
            _: &str,
            request: &SearchRequest,
        ) -> anyhow::Result<Vec<RetrievedHit>> {
            self.requests.lock().push(request.clone());
            self.hits.clone().map_err(anyhow::Error::msg)
        }
    }

    fn hit(file: &str, text: &str) -> RetrievedHit {
        RetrievedHit {
            text: text.into(),
            file_name: file.into(),
            file_path: file.into(),
            language: "rust".into(),
            score: 0.9,
            reranked: true,
        }
    }

    /// Every hit costs its text length in tokens.
    struct LenEstimator;

    impl TokenEstimator for LenEstimator {
        fn estimate(&self, text: &str) -> usize {
            text.len()
        }
    }

    #[tokio::test]
    async fn test_plan_and_retrieve_passes_plan_to_index() {
        let index = StubIndex::returning(vec![hit("a.rs", "fn a() {}")]);
        let retriever = Retriever::new(index.clone(), "rerank-model");

        let bundle = retriever
            .plan_and_retrieve("ns", "analyze the architecture of this project", 8000)
            .await
            .unwrap();
        assert_eq!(bundle.hits.len(), 1);
        assert_eq!(bundle.analysis.intent, Intent::Analysis);

        let requests = index.requests.lock();
        assert_eq!(requests[0].top_k, 10);
        let rerank = requests[0].rerank.as_ref().unwrap();
        assert_eq!(rerank.top_n, 5);
        assert_eq!(rerank.model, "rerank-model");
        assert_eq!(rerank.rank_fields, vec!["chunk_text"]);
    }

    #[tokio::test]
    async fn test_plan_and_retrieve_none_cases() {
        let empty = Retriever::new(StubIndex::returning(Vec::new()), "m");
        assert!(empty.plan_and_retrieve("ns", "summarize", 8000).await.is_none());

        let failing = Retriever::new(StubIndex::failing(), "m");
        assert!(failing.plan_and_retrieve("ns", "summarize", 8000).await.is_none());

        let index = StubIndex::returning(vec![hit("a.rs", "x")]);
        let blank = Retriever::new(index.clone(), "m");
        assert!(blank.plan_and_retrieve("ns", "   ", 8000).await.is_none());
        assert!(index.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_custom_estimator_and_table() {
        let index = StubIndex::returning(vec![
            hit("a.rs", "aaaa"),
            hit("b.rs", "bbbb"),
            hit("c.rs", "cccc"),
        ]);
        let rows = [
            (Intent::Summary, [4, 6, 9]),
            (Intent::Analysis, [4, 6, 9]),
            (Intent::BugCheck, [4, 6, 9]),
            (Intent::Specific, [3, 3, 3]),
            (Intent::General, [7, 7, 7]),
        ];
        let retriever = Retriever::new(index.clone(), "m")
            .with_table(BaseKTable::from_rows(&rows).unwrap())
            .with_estimator(Box::new(LenEstimator));

        let bundle = retriever.plan_and_retrieve("ns", "xyz123", 9).await.unwrap();
        assert_eq!(bundle.hits.len(), 2);
        assert_eq!(bundle.total_tokens, 8);
        assert_eq!(bundle.dropped, 1);
        assert_eq!(index.requests.lock()[0].top_k, 7);
    }
}
