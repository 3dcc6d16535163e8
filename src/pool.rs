use crate::{
    dispatch::{Assignment, BatchOutcome, DispatchStats, Dispatcher},
    runner::Auditor,
    work::{Batch, WorkItem},
};
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// What a worker sends back after finishing a batch.
#[derive(Debug)]
pub struct WorkerReport {
    pub worker: usize,
    pub batch_id: usize,
    pub outcome: BatchOutcome,
}

/// A fixed set of worker tasks fed batches by a single coordinator.
pub struct WorkerPool<A: Auditor> {
    auditor: Arc<A>,
    workers: usize,
    batch_size: usize,
}

impl<A: Auditor> WorkerPool<A> {
    pub fn new(auditor: Arc<A>, workers: usize, batch_size: usize) -> Self {
        Self {
            auditor,
            workers,
            batch_size,
        }
    }

    /// Audits every item, then calls `on_finished` once the queue is drained and every
    /// worker is idle. Workers are shut down and joined only after it returns.
    pub async fn run<T, F>(&self, items: Vec<WorkItem>, on_finished: F) -> Result<T>
    where
        F: FnOnce(&DispatchStats) -> Result<T>,
    {
        let mut dispatcher = Dispatcher::new(items, self.workers, self.batch_size)?;

        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<WorkerReport>();
        let mut senders = Vec::with_capacity(self.workers);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let (tx, rx) = mpsc::channel::<Batch>(1);
            handles.push(tokio::spawn(worker_loop(
                index,
                rx,
                self.auditor.clone(),
                report_tx.clone(),
            )));
            senders.push(tx);
        }
        drop(report_tx);

        let mut pending: VecDeque<(usize, Assignment)> = dispatcher.start()?.into();
        let mut on_finished = Some(on_finished);
        let result = 'coordinate: loop {
            while let Some((worker, assignment)) = pending.pop_front() {
                match assignment {
                    Assignment::Batch(batch) => {
                        let batch_id = batch.id;
                        if senders[worker].send(batch).await.is_err() {
                            error!("worker {worker} is gone; marking batch {batch_id} failed");
                            let outcome =
                                BatchOutcome::Failed(format!("worker {worker} unavailable"));
                            let next = dispatcher.report(worker, &outcome)?;
                            pending.push_back((worker, next));
                        }
                    }
                    Assignment::Idle => {}
                    Assignment::Finished => {
                        let stats = dispatcher.stats();
                        info!(
                            "all {} batches reported ({} failed); aggregating",
                            stats.batches, stats.failed_batches
                        );
                        let finish = on_finished
                            .take()
                            .ok_or_else(|| anyhow!("run finished twice"))?;
                        break 'coordinate finish(&stats);
                    }
                }
            }

            let Some(report) = report_rx.recv().await else {
                return Err(anyhow!("all workers exited before the run finished"));
            };
            match &report.outcome {
                BatchOutcome::Completed => {
                    info!("worker {} completed batch {}", report.worker, report.batch_id)
                }
                BatchOutcome::Failed(msg) => warn!(
                    "worker {} failed batch {}: {}",
                    report.worker, report.batch_id, msg
                ),
            }
            let next = dispatcher.report(report.worker, &report.outcome)?;
            pending.push_back((report.worker, next));
        };

        drop(senders);
        for (i, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                warn!("worker {} panicked: {:#}", i, e);
            }
        }

        result
    }
}

async fn worker_loop<A: Auditor>(
    index: usize,
    mut batches: mpsc::Receiver<Batch>,
    auditor: Arc<A>,
    reports: mpsc::UnboundedSender<WorkerReport>,
) {
    while let Some(batch) = batches.recv().await {
        let outcome = run_batch(index, &batch, &auditor).await;
        let report = WorkerReport {
            worker: index,
            batch_id: batch.id,
            outcome,
        };
        if reports.send(report).is_err() {
            break;
        }
    }
}

/// Audits every item of `batch` concurrently. Any failure fails the batch; reports from
/// items that succeeded are kept.
pub async fn run_batch<A: Auditor>(worker: usize, batch: &Batch, auditor: &Arc<A>) -> BatchOutcome {
    info!(
        "worker {worker} running batch {} ({} urls)",
        batch.id,
        batch.len()
    );
    let tasks: Vec<_> = batch
        .items
        .iter()
        .cloned()
        .map(|item| {
            let auditor = auditor.clone();
            tokio::spawn(async move { auditor.audit(&item).await })
        })
        .collect();

    let mut failures = Vec::new();
    for (item, joined) in batch
        .items
        .iter()
        .zip(futures::future::join_all(tasks).await)
    {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("audit failed for {}: {:#}", item.raw_url, e);
                failures.push(format!("{}: {:#}", item.raw_url, e));
            }
            Err(e) => {
                error!("audit task for {} panicked: {}", item.raw_url, e);
                failures.push(format!("{}: audit task panicked", item.raw_url));
            }
        }
    }

    if failures.is_empty() {
        BatchOutcome::Completed
    } else {
        BatchOutcome::Failed(failures.join("; "))
    }
}
