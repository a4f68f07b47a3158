//! Bounded worker pool running one job per partition.
//!
//! Connections are cloned on the calling thread before any worker starts;
//! each worker owns its clone until the pool drains. Workers pull partition
//! indices from a shared channel and send one [`JobOutcome`] back per index.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crate::config::PartitionConfig;
use crate::error::{PartitionError, Result};
use crate::naming::Strategy;
use crate::store::Store;

/// Result of one partition job, as reported by the worker that ran it.
#[derive(Debug)]
pub struct JobOutcome {
    pub partition: usize,
    pub result: std::result::Result<u64, String>,
}

pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn for_jobs(config: &PartitionConfig, jobs: usize) -> Self {
        Self::new(config.worker_count(jobs))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` for every partition in `0..jobs` and wait for all of them.
    ///
    /// Outcomes come back in completion order. A partition whose job never
    /// ran (no worker could be spawned) is reported as failed.
    pub fn run<F>(&self, store: &Store, jobs: usize, job: F) -> Result<Vec<JobOutcome>>
    where
        F: Fn(&Store, usize) -> Result<u64> + Sync,
    {
        let worker_count = self.workers.min(jobs.max(1));
        let mut stores = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            stores.push(store.try_clone()?);
        }

        let (job_tx, job_rx) = unbounded::<usize>();
        for partition in 0..jobs {
            // The receiver is alive in this scope, so send cannot fail.
            let _ = job_tx.send(partition);
        }
        drop(job_tx);

        let (outcome_tx, outcome_rx) = unbounded::<JobOutcome>();
        let job = &job;
        thread::scope(|scope| {
            for (i, worker_store) in stores.into_iter().enumerate() {
                let rx = job_rx.clone();
                let tx = outcome_tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("rpart-worker-{i}"))
                    .spawn_scoped(scope, move || worker_loop(worker_store, rx, tx, job));
                if let Err(e) = spawned {
                    warn!("failed to spawn worker {i}: {e}");
                }
            }
        });
        drop(outcome_tx);

        Ok(fill_missing_outcomes(outcome_rx.iter().collect(), jobs))
    }
}

/// Add a failed outcome for every partition in `0..jobs` nobody reported on.
pub(crate) fn fill_missing_outcomes(mut outcomes: Vec<JobOutcome>, jobs: usize) -> Vec<JobOutcome> {
    let mut seen = vec![false; jobs];
    for outcome in &outcomes {
        seen[outcome.partition] = true;
    }
    for (partition, ran) in seen.into_iter().enumerate() {
        if !ran {
            outcomes.push(JobOutcome {
                partition,
                result: Err("job was never executed".to_string()),
            });
        }
    }
    outcomes
}

fn worker_loop<F>(store: Store, jobs: Receiver<usize>, outcomes: Sender<JobOutcome>, job: &F)
where
    F: Fn(&Store, usize) -> Result<u64>,
{
    while let Ok(partition) = jobs.recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| job(&store, partition)));
        let result = match result {
            Ok(Ok(rows)) => {
                debug!("partition {partition}: {rows} rows");
                Ok(rows)
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic_err) => {
                let msg = extract_panic_message(panic_err);
                Err(format!("job panicked: {msg}"))
            }
        };
        let _ = outcomes.send(JobOutcome { partition, result });
    }
}

fn extract_panic_message(err: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Row counts indexed by partition, or `PartialPartitionFailure` naming every
/// failed partition and carrying the first error reported.
pub fn collect_row_counts(
    strategy: Strategy,
    partitions: usize,
    outcomes: Vec<JobOutcome>,
) -> Result<Vec<u64>> {
    let mut rows = vec![0u64; partitions];
    let mut failed = Vec::new();
    let mut first_error = None;

    for outcome in outcomes {
        match outcome.result {
            Ok(count) => rows[outcome.partition] = count,
            Err(e) => {
                warn!("{strategy} partition {} failed: {e}", outcome.partition);
                failed.push(outcome.partition);
                first_error.get_or_insert(e);
            }
        }
    }

    if failed.is_empty() {
        return Ok(rows);
    }
    failed.sort_unstable();
    Err(PartitionError::PartialPartitionFailure {
        strategy,
        failed,
        first_error: first_error.unwrap_or_default(),
    })
}
