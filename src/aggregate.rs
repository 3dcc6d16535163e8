use crate::{
    report::{CategoryScore, ErrorRecord, Overall, Summary, SummaryItem, TitledScore},
    store::{Report, ReportStore},
    work::WorkItem,
};
use anyhow::Result;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info, warn};

pub const NO_CATEGORIES: &str = "No categories found";

/// Rounds to two decimals.
pub fn round_score(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Rounds a possibly-missing score; missing or non-finite scores count as 0.
pub fn format_score(raw: Option<f64>, what: &str) -> f64 {
    round_score(raw_score(raw, what))
}

/// Category scores are kept unrounded; only the page and overall means are rounded.
fn raw_score(raw: Option<f64>, what: &str) -> f64 {
    match raw {
        Some(x) if x.is_finite() => x,
        other => {
            warn!("undefined score for {what}: {other:?}; using 0");
            0.0
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Scores one parsed report. `Err` carries the message for the page's error record.
pub fn score_report(file_key: &str, report: &Report) -> std::result::Result<SummaryItem, String> {
    if let Some(err) = &report.runtime_error {
        return Err(err.message.clone());
    }
    if report.categories.is_empty() {
        return Err(NO_CATEGORIES.to_string());
    }

    let scores: Vec<CategoryScore> = report
        .categories
        .iter()
        .map(|(key, category)| {
            let id = if category.id.is_empty() { key.clone() } else { category.id.clone() };
            let details = category
                .audit_refs
                .iter()
                .filter(|r| r.weight > 0.0)
                .map(|r| {
                    let raw = report.audits.get(&r.id).and_then(|a| a.score);
                    let what = format!("{file_key} audit {}", r.id);
                    (r.id.clone(), format_score(raw, &what))
                })
                .collect();
            CategoryScore {
                score: raw_score(category.score, &format!("{file_key} category {id}")),
                title: category.title.clone(),
                id,
                details,
            }
        })
        .collect();

    let avg_score = round_score(mean(scores.iter().map(|s| s.score)));
    Ok(SummaryItem {
        url: file_key.to_string(),
        avg_score,
        scores,
    })
}

fn by_avg_score(a: &SummaryItem, b: &SummaryItem) -> Ordering {
    a.avg_score
        .total_cmp(&b.avg_score)
        .then_with(|| a.url.cmp(&b.url))
}

/// Builds the summary from already-scored pages. Pages lacking any category that
/// another page has are moved to the error list.
///
/// Categories keep the order they first appear in, which for Lighthouse reports is the
/// report's own order.
pub fn summarize(outcomes: Vec<(WorkItem, std::result::Result<SummaryItem, String>)>) -> Summary {
    let mut expected: Vec<(String, String)> = Vec::new();
    for page in outcomes.iter().filter_map(|(_, outcome)| outcome.as_ref().ok()) {
        for s in &page.scores {
            if !expected.iter().any(|(id, _)| *id == s.id) {
                expected.push((s.id.clone(), s.title.clone()));
            }
        }
    }

    let mut error_list = Vec::new();
    let mut pages = Vec::new();
    for (item, outcome) in outcomes {
        let page = match outcome {
            Ok(page) => page,
            Err(error) => {
                error_list.push(ErrorRecord { url: item.raw_url, error });
                continue;
            }
        };
        match expected
            .iter()
            .map(|(id, _)| id)
            .find(|id| page.category(id).is_none())
        {
            Some(missing) => {
                warn!("{} lacks category {missing}; excluding from averages", item.raw_url);
                error_list.push(ErrorRecord {
                    url: item.raw_url,
                    error: format!("missing category \"{missing}\""),
                });
            }
            None => pages.push(page),
        }
    }

    pages.sort_by(by_avg_score);

    let mut overall = Overall::default();
    if !pages.is_empty() {
        overall.total = round_score(mean(pages.iter().map(|p| p.avg_score)));
        overall.scores = expected
            .iter()
            .map(|(id, title)| TitledScore {
                title: pages
                    .iter()
                    .find_map(|p| p.category(id).map(|c| c.title.clone()))
                    .unwrap_or_else(|| title.clone()),
                score: round_score(mean(
                    pages.iter().filter_map(|p| p.category(id)).map(|c| c.score),
                )),
            })
            .collect();
    }

    Summary {
        error_list,
        summary: overall,
        pages,
    }
}

pub struct Aggregator {
    store: ReportStore,
}

impl Aggregator {
    pub fn new(store: ReportStore) -> Self {
        Self { store }
    }

    /// Reads every item's report and builds the summary. Per-item problems become
    /// error records; nothing here aborts the pass.
    pub fn aggregate(&self, items: &[WorkItem]) -> Summary {
        let outcomes = items
            .iter()
            .map(|item| {
                let outcome = match self.store.read(&item.file_key) {
                    Ok(report) => score_report(&item.file_key, &report),
                    Err(err) => {
                        debug!("no usable report for {}: {:#}", item.raw_url, err);
                        Err(NO_CATEGORIES.to_string())
                    }
                };
                (item.clone(), outcome)
            })
            .collect();
        summarize(outcomes)
    }

    /// Aggregates and writes the summary to `path`.
    pub fn run(&self, items: &[WorkItem], path: &Path) -> Result<Summary> {
        let summary = self.aggregate(items);
        crate::util::write_pretty_json(path, &summary)?;
        info!(
            "summary written to {} pages={} errors={} total={}",
            path.display(),
            summary.pages.len(),
            summary.error_list.len(),
            summary.summary.total
        );
        Ok(summary)
    }
}
