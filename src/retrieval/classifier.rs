//! Keyword and shape heuristics that classify a query before retrieval.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Summary,
    Analysis,
    BugCheck,
    Specific,
    General,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::Summary,
        Intent::Analysis,
        Intent::BugCheck,
        Intent::Specific,
        Intent::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Summary => "summary",
            Intent::Analysis => "analysis",
            Intent::BugCheck => "bug_check",
            Intent::Specific => "specific",
            Intent::General => "general",
        }
    }
}

/// Shared scale for complexity and specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Medium, Level::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

/// Intent keyword table, evaluated top to bottom. First row with a
/// substring hit wins.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (
        Intent::Summary,
        &["summary", "summarize", "overview", "explain", "describe", "what is", "tell me about"],
    ),
    (
        Intent::Analysis,
        &["analyze", "analysis", "architecture", "pattern", "structure", "design", "flow"],
    ),
    (
        Intent::BugCheck,
        &[
            "bug",
            "error",
            "issue",
            "problem",
            "fix",
            "debug",
            "vulnerability",
            "security",
            "improvements",
        ],
    ),
    (
        Intent::Specific,
        &["function", "method", "class", "variable", "import", "specific", "find"],
    ),
];

const INTERROGATIVES: [&str; 6] = ["what", "how", "why", "when", "where", "which"];

static CAMEL_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]*[A-Z][a-zA-Z]*\b").expect("valid regex"));

// call(), dotted.access, array[]
static CODE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\(\)|[\w\.]+\.\w+|\w+\[\]").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub complexity: Level,
    pub specificity: Level,
}

/// Classify a trimmed, non-empty query. Pure: the same text always yields
/// the same classification.
pub fn classify(query: &str) -> Classification {
    let lower = query.to_lowercase();
    Classification {
        intent: classify_intent(&lower),
        complexity: assess_complexity(&lower),
        specificity: assess_specificity(query),
    }
}

pub fn classify_intent(lowercased: &str) -> Intent {
    INTENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowercased.contains(k)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General)
}

pub fn assess_complexity(lowercased: &str) -> Level {
    let words: Vec<&str> = lowercased.split_whitespace().collect();
    let word_count = words.len();
    let interrogatives = words.iter().filter(|w| INTERROGATIVES.contains(*w)).count();

    if word_count > 15 || interrogatives > 2 {
        Level::High
    } else if word_count > 8 || interrogatives > 1 {
        Level::Medium
    } else {
        Level::Low
    }
}

/// Counts identifier-looking tokens in the raw (case-preserved) query.
pub fn assess_specificity(raw: &str) -> Level {
    let camel = CAMEL_CASE.find_iter(raw).count();
    let code = CODE_SHAPE.find_iter(raw).count();

    if camel > 2 || code > 1 {
        Level::High
    } else if camel > 0 || code > 0 {
        Level::Medium
    } else {
        Level::Low
    }
}
