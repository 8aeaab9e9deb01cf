//! Maps a query classification to retrieval breadth and rerank depth.

use std::collections::HashMap;

use super::classifier::{Intent, Level};

/// Floor on retrieval breadth and on rerank depth.
pub const MIN_K: usize = 3;

/// Retrieval breadth per intent row, as `[low, medium, high]` complexity.
const BASE_K_ROWS: [(Intent, [usize; 3]); 5] = [
    (Intent::Specific, [3, 5, 8]),
    (Intent::General, [5, 8, 12]),
    (Intent::Summary, [8, 15, 25]),
    (Intent::Analysis, [10, 18, 30]),
    (Intent::BugCheck, [12, 20, 35]),
];

const FALLBACK_ROW: [usize; 3] = [5, 8, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub base_k: usize,
    pub should_rerank: bool,
    pub rerank_top_n: usize,
}

/// Intent × complexity lookup for `base_k`.
#[derive(Debug, Clone)]
pub struct BaseKTable {
    cells: HashMap<(Intent, Level), usize>,
}

impl BaseKTable {
    /// Build from rows of `[low, medium, high]`. Every intent must have a
    /// row and every cell must be at least [`MIN_K`].
    pub fn from_rows(rows: &[(Intent, [usize; 3])]) -> anyhow::Result<Self> {
        let mut cells = HashMap::new();
        for (intent, values) in rows {
            for (level, k) in Level::ALL.iter().zip(values) {
                if *k < MIN_K {
                    anyhow::bail!(
                        "base_k for ({}, {}) is {k}, below the floor of {MIN_K}",
                        intent.as_str(),
                        level.as_str()
                    );
                }
                cells.insert((*intent, *level), *k);
            }
        }
        for intent in Intent::ALL {
            for level in Level::ALL {
                if !cells.contains_key(&(intent, level)) {
                    anyhow::bail!(
                        "base_k table is missing ({}, {})",
                        intent.as_str(),
                        level.as_str()
                    );
                }
            }
        }
        Ok(Self { cells })
    }

    pub fn base_k(&self, intent: Intent, complexity: Level) -> usize {
        self.cells
            .get(&(intent, complexity))
            .copied()
            .unwrap_or(FALLBACK_ROW[complexity as usize])
    }
}

impl Default for BaseKTable {
    fn default() -> Self {
        let mut cells = HashMap::new();
        for (intent, values) in BASE_K_ROWS {
            for (level, k) in Level::ALL.into_iter().zip(values) {
                cells.insert((intent, level), k);
            }
        }
        Self { cells }
    }
}

/// Exploratory questions get a rerank pass; narrow lookups skip it.
pub fn should_rerank(intent: Intent) -> bool {
    matches!(intent, Intent::Summary | Intent::Analysis | Intent::BugCheck)
}

pub fn plan(table: &BaseKTable, intent: Intent, complexity: Level) -> RetrievalPlan {
    let base_k = table.base_k(intent, complexity);
    let should_rerank = should_rerank(intent);
    let rerank_top_n = if should_rerank {
        (base_k / 2).max(MIN_K)
    } else {
        base_k
    };
    RetrievalPlan {
        base_k,
        should_rerank,
        rerank_top_n,
    }
}
