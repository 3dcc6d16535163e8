use crate::{
    aggregate::Aggregator,
    config::Config,
    dispatch::DispatchStats,
    pool::WorkerPool,
    report::Summary,
    runner::Auditor,
    store::ReportStore,
    util::{clear_json_files, ensure_dir},
    work::WorkItem,
};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct Pipeline<A: Auditor> {
    cfg: Config,
    store: ReportStore,
    auditor: Arc<A>,
}

pub struct RunOutput {
    pub summary: Summary,
    pub stats: DispatchStats,
    pub summary_path: PathBuf,
}

impl<A: Auditor> Pipeline<A> {
    pub fn new(cfg: &Config, store: ReportStore, auditor: A) -> Self {
        Self {
            cfg: cfg.clone(),
            store,
            auditor: Arc::new(auditor),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        PathBuf::from(&self.cfg.paths.summary_dir).join(&self.cfg.output.summary_filename)
    }

    /// Audits every item through the worker pool, then aggregates exactly once.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunOutput> {
        let started = Instant::now();
        let summary_dir = PathBuf::from(&self.cfg.paths.summary_dir);
        ensure_dir(&summary_dir)?;
        self.store.prepare(self.cfg.global.clean_before_run)?;
        if self.cfg.global.clean_before_run {
            clear_json_files(&summary_dir)?;
        }

        info!(
            "auditing {} urls with {} workers, batch size {}",
            items.len(),
            self.cfg.global.workers,
            self.cfg.global.batch_size
        );

        let aggregator = Aggregator::new(self.store.clone());
        let summary_path = self.summary_path();
        let pool = WorkerPool::new(
            self.auditor.clone(),
            self.cfg.global.workers,
            self.cfg.global.batch_size,
        );
        let (summary, stats) = pool
            .run(items.clone(), |stats| {
                info!("audits finished in {:.1?}", started.elapsed());
                let summary = aggregator.run(&items, &summary_path)?;
                Ok((summary, stats.clone()))
            })
            .await?;

        Ok(RunOutput {
            summary,
            stats,
            summary_path,
        })
    }
}
