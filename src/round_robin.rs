//! Round-robin partitioning by row position.
//!
//! The coordinator scans the base table in a fixed order and deals rows out
//! by `position % partitions`. Full per-partition batches go to insert
//! workers over bounded channels, so memory stays at roughly one batch per
//! partition plus the channel depth. Worker `w` owns every partition `p`
//! with `p % workers == w` and keeps one appender per owned partition on its
//! own connection.

use crossbeam_channel::{bounded, unbounded, Sender};
use log::{info, warn};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crate::appender::RatingAppender;
use crate::build::{prepare_partition_tables, BuildReport};
use crate::error::Result;
use crate::naming::{partition_table_name, Strategy, RROBIN_INSERT_SEQ};
use crate::pool::{collect_row_counts, fill_missing_outcomes, JobOutcome};
use crate::record::RatingRecord;
use crate::store::Store;

/// Batches in flight per worker before the scan blocks.
const CHANNEL_DEPTH: usize = 4;

struct Batch {
    partition: usize,
    rows: Vec<RatingRecord>,
}

/// Deal `base_table` out to `partitions` round-robin partitions and reset
/// the rotation cursor used by single-record round-robin inserts.
pub fn build_round_robin_partitions(
    store: &Store,
    base_table: &str,
    partitions: usize,
) -> Result<BuildReport> {
    let start = Instant::now();
    prepare_partition_tables(store, Strategy::RoundRobin, base_table, partitions)?;

    let config = store.config();
    store.reset_cursor(&config.partition_schema, RROBIN_INSERT_SEQ, partitions)?;

    let workers = config.worker_count(partitions);
    let mut stores = Vec::with_capacity(workers);
    for _ in 0..workers {
        stores.push(store.try_clone()?);
    }
    info!(
        "round-robin partitioning {}.{} into {} partitions with {} workers",
        config.base_schema, base_table, partitions, workers
    );

    let (outcome_tx, outcome_rx) = unbounded::<JobOutcome>();
    let scanned = thread::scope(|scope| {
        let mut senders = Vec::with_capacity(workers);
        for (w, worker_store) in stores.into_iter().enumerate() {
            let (tx, rx) = bounded::<Batch>(CHANNEL_DEPTH);
            senders.push(tx);
            let owned: Vec<usize> = (w..partitions).step_by(workers).collect();
            let outcomes = outcome_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("rpart-rr-{w}"))
                .spawn_scoped(scope, move || {
                    insert_worker(worker_store, owned, rx, outcomes)
                });
            if let Err(e) = spawned {
                warn!("failed to spawn round-robin worker {w}: {e}");
            }
        }
        // Dropping the senders when the scan returns lets the workers drain.
        scan_and_deal(store, base_table, partitions, senders)
    });
    drop(outcome_tx);
    let scanned = scanned?;

    let outcomes = fill_missing_outcomes(outcome_rx.iter().collect(), partitions);
    let rows_per_partition = collect_row_counts(Strategy::RoundRobin, partitions, outcomes)?;

    let report = BuildReport {
        strategy: Strategy::RoundRobin,
        partitions,
        rows_per_partition,
    };
    info!(
        "round-robin partitioning finished: {} of {} rows in {:.2?}",
        report.total_rows(),
        scanned,
        start.elapsed()
    );
    Ok(report)
}

fn scan_and_deal(
    store: &Store,
    base_table: &str,
    partitions: usize,
    senders: Vec<Sender<Batch>>,
) -> Result<u64> {
    let config = store.config();
    let batch_size = config.batch_size;
    let mut buffers: Vec<Vec<RatingRecord>> = (0..partitions).map(|_| Vec::new()).collect();
    let mut undeliverable = BTreeSet::new();
    let mut position = 0u64;

    let scanned = store.scan_ordered(&config.base_schema, base_table, batch_size, |batch| {
        for record in batch {
            let partition = (position % partitions as u64) as usize;
            position += 1;
            let buffer = &mut buffers[partition];
            buffer.push(record);
            if buffer.len() >= batch_size {
                let rows = std::mem::replace(buffer, Vec::with_capacity(batch_size));
                send_batch(&senders, partition, rows, &mut undeliverable);
            }
        }
        Ok(())
    })?;

    for (partition, rows) in buffers.into_iter().enumerate() {
        if !rows.is_empty() {
            send_batch(&senders, partition, rows, &mut undeliverable);
        }
    }
    if !undeliverable.is_empty() {
        warn!("round-robin rows undeliverable for partitions {undeliverable:?}");
    }
    Ok(scanned)
}

fn send_batch(
    senders: &[Sender<Batch>],
    partition: usize,
    rows: Vec<RatingRecord>,
    undeliverable: &mut BTreeSet<usize>,
) {
    let sender = &senders[partition % senders.len()];
    if sender.send(Batch { partition, rows }).is_err() {
        // Worker is gone; the partition will be reported as never executed.
        undeliverable.insert(partition);
    }
}

fn insert_worker(
    store: Store,
    owned: Vec<usize>,
    batches: crossbeam_channel::Receiver<Batch>,
    outcomes: Sender<JobOutcome>,
) {
    let schema = store.config().partition_schema.clone();
    let mut appenders: HashMap<usize, RatingAppender<'_>> = HashMap::new();
    let mut errors: HashMap<usize, String> = HashMap::new();

    while let Ok(batch) = batches.recv() {
        if errors.contains_key(&batch.partition) {
            continue;
        }
        let appended = panic::catch_unwind(AssertUnwindSafe(|| {
            let appender = match appenders.entry(batch.partition) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => v.insert(store.appender(
                    &schema,
                    &partition_table_name(Strategy::RoundRobin, batch.partition),
                )?),
            };
            appender.append_all(&batch.rows)
        }));
        let failure = match appended {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("insert worker panicked".to_string()),
        };
        if let Some(e) = failure {
            appenders.remove(&batch.partition);
            errors.insert(batch.partition, e);
        }
    }

    for partition in owned {
        let result = match errors.remove(&partition) {
            Some(e) => Err(e),
            None => match appenders.remove(&partition) {
                Some(appender) => appender.close().map_err(|e| e.to_string()),
                None => Ok(0),
            },
        };
        let _ = outcomes.send(JobOutcome { partition, result });
    }
}
