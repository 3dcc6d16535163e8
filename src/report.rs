use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub error_list: Vec<ErrorRecord>,
    pub summary: Overall,
    pub pages: Vec<SummaryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub url: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overall {
    pub total: f64,
    pub scores: Vec<TitledScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitledScore {
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryItem {
    /// The page's file key, not the raw URL.
    pub url: String,
    pub avg_score: f64,
    pub scores: Vec<CategoryScore>,
}

impl SummaryItem {
    pub fn category(&self, id: &str) -> Option<&CategoryScore> {
        self.scores.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub id: String,
    pub title: String,
    pub score: f64,
    pub details: IndexMap<String, f64>,
}

/// Bookkeeping written next to the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIndex {
    pub run_id: String,
    pub started: String,
    pub finished: String,
    pub source: String,
    pub items: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub workers: usize,
    pub batch_size: usize,
    pub pages: usize,
    pub errors: usize,
    pub summary: String,
}
