use crate::util::{clear_json_files, ensure_dir};
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-URL Lighthouse reports, one `<file_key>.json` each.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, file_key: &str) -> PathBuf {
        self.dir.join(format!("{file_key}.json"))
    }

    /// Creates the directory and, when `clean` is set, drops reports left by a previous run.
    pub fn prepare(&self, clean: bool) -> Result<()> {
        ensure_dir(&self.dir)?;
        if clean {
            let removed = clear_json_files(&self.dir)?;
            info!("cleaned {} stale reports in {}", removed, self.dir.display());
        }
        Ok(())
    }

    pub fn read(&self, file_key: &str) -> Result<Report> {
        let path = self.path_for(file_key);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading report: {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing report: {}", path.display()))
    }

    pub fn write(&self, file_key: &str, report: &Report) -> Result<()> {
        crate::util::write_pretty_json(&self.path_for(file_key), report)
    }

    /// Waits until the report for `file_key` exists and is non-empty.
    ///
    /// The audit tool exiting does not guarantee its output is visible yet, so a runner
    /// only reports success once this returns `Ok`.
    pub async fn confirm_written(&self, file_key: &str, wait: Duration) -> Result<u64> {
        let path = self.path_for(file_key);
        let started = Instant::now();
        loop {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_file() && meta.len() > 0 {
                    debug!("report {} visible ({} bytes)", path.display(), meta.len());
                    return Ok(meta.len());
                }
            }
            if started.elapsed() >= wait {
                return Err(anyhow!(
                    "report not written after {:?}: {}",
                    wait,
                    path.display()
                ));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// The parts of a Lighthouse JSON report the aggregator reads. Categories stay in
/// report order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub categories: IndexMap<String, Category>,
    #[serde(default)]
    pub audits: BTreeMap<String, AuditResult>,
    #[serde(rename = "runtimeError", default, skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<RuntimeError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(rename = "auditRefs", default)]
    pub audit_refs: Vec<AuditRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditRef {
    pub id: String,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditResult {
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}
