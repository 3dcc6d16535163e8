//! Batch assignment and completion detection.
//!
//! The [`Dispatcher`] is a plain state machine with a single owner: the pool's coordinator
//! loop. Workers never touch it; they receive batches and send back reports, and every
//! cursor move or busy flag change happens through the methods below.

use crate::work::{Batch, WorkItem};
use anyhow::{bail, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerState {
    pub index: usize,
    pub busy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Failed(String),
}

impl BatchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, BatchOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// Run this batch, then report back.
    Batch(Batch),
    /// Nothing left to hand out, but other workers are still busy.
    Idle,
    /// The queue is empty and every worker is idle. Yielded once per run.
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub items: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub workers: usize,
    pub batch_size: usize,
}

#[derive(Debug)]
pub struct Dispatcher {
    items: Vec<WorkItem>,
    batch_size: usize,
    cursor: usize,
    workers: Vec<WorkerState>,
    next_batch_id: usize,
    failed_batches: usize,
    finished: bool,
}

impl Dispatcher {
    pub fn new(items: Vec<WorkItem>, worker_count: usize, batch_size: usize) -> Result<Self> {
        if worker_count == 0 {
            bail!("worker count must be at least 1");
        }
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }
        Ok(Self {
            items,
            batch_size,
            cursor: 0,
            workers: (0..worker_count)
                .map(|index| WorkerState { index, busy: false })
                .collect(),
            next_batch_id: 0,
            failed_batches: 0,
            finished: false,
        })
    }

    /// Initial assignment for every worker, in index order.
    pub fn start(&mut self) -> Result<Vec<(usize, Assignment)>> {
        (0..self.workers.len())
            .map(|i| Ok((i, self.assign_batch(i)?)))
            .collect()
    }

    pub fn assign_batch(&mut self, worker: usize) -> Result<Assignment> {
        let state = self.worker(worker)?;
        if state.busy {
            bail!("worker {worker} is already running a batch");
        }

        if self.cursor >= self.items.len() {
            if self.finished || self.workers.iter().any(|w| w.busy) {
                return Ok(Assignment::Idle);
            }
            self.finished = true;
            debug!("queue drained and all workers idle");
            return Ok(Assignment::Finished);
        }

        let end = (self.cursor + self.batch_size).min(self.items.len());
        let batch = Batch {
            id: self.next_batch_id,
            start: self.cursor,
            items: self.items[self.cursor..end].to_vec(),
        };
        self.cursor += self.batch_size;
        self.next_batch_id += 1;
        self.workers[worker].busy = true;
        debug!(
            "batch {} items {}-{} of {} -> worker {worker}",
            batch.id,
            batch.start + 1,
            batch.start + batch.len(),
            self.items.len()
        );
        Ok(Assignment::Batch(batch))
    }

    /// Records a worker's result for its current batch and hands it the next one.
    /// Failed batches are not retried.
    pub fn report(&mut self, worker: usize, outcome: &BatchOutcome) -> Result<Assignment> {
        if !self.worker(worker)?.busy {
            bail!("worker {worker} reported without holding a batch");
        }
        if outcome.is_failed() {
            self.failed_batches += 1;
        }
        self.workers[worker].busy = false;
        self.assign_batch(worker)
    }

    pub fn workers(&self) -> &[WorkerState] {
        &self.workers
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            items: self.items.len(),
            batches: self.next_batch_id,
            failed_batches: self.failed_batches,
            workers: self.workers.len(),
            batch_size: self.batch_size,
        }
    }

    fn worker(&self, worker: usize) -> Result<WorkerState> {
        match self.workers.get(worker) {
            Some(state) => Ok(*state),
            None => bail!("no worker with index {worker}"),
        }
    }
}
