//! Range partitioning on the rating column.

use duckdb::params;
use log::info;
use std::time::Instant;

use crate::build::{prepare_partition_tables, BuildReport};
use crate::error::Result;
use crate::interval::RangeBounds;
use crate::naming::{partition_table_name, qualified_name, Strategy};
use crate::pool::{collect_row_counts, WorkerPool};
use crate::store::Store;

/// Split `base_table` into `partitions` range partitions over [0, 5].
///
/// Re-running with the same count truncates and refills the same tables.
/// The base table is only read. On partial failure the partitions that
/// completed are left in place.
pub fn build_range_partitions(
    store: &Store,
    base_table: &str,
    partitions: usize,
) -> Result<BuildReport> {
    let start = Instant::now();
    prepare_partition_tables(store, Strategy::Range, base_table, partitions)?;

    let config = store.config();
    if config.rating_index {
        store.create_rating_index(&config.base_schema, base_table)?;
    }

    let pool = WorkerPool::for_jobs(config, partitions);
    info!(
        "range partitioning {}.{} into {} partitions with {} workers",
        config.base_schema,
        base_table,
        partitions,
        pool.workers()
    );

    let source = qualified_name(&config.base_schema, base_table);
    let outcomes = pool.run(store, partitions, |worker, index| {
        copy_range(worker, &source, index, partitions)
    })?;
    let rows_per_partition = collect_row_counts(Strategy::Range, partitions, outcomes)?;

    let report = BuildReport {
        strategy: Strategy::Range,
        partitions,
        rows_per_partition,
    };
    info!(
        "range partitioning finished: {} rows in {:.2?}",
        report.total_rows(),
        start.elapsed()
    );
    Ok(report)
}

fn copy_range(store: &Store, source: &str, index: usize, partitions: usize) -> Result<u64> {
    let bounds = RangeBounds::for_partition(index, partitions);
    let target = qualified_name(
        &store.config().partition_schema,
        &partition_table_name(Strategy::Range, index),
    );
    let sql = format!(
        "INSERT INTO {target} (user_id, item_id, rating) \
         SELECT user_id, item_id, rating FROM {source} WHERE {}",
        bounds.sql_predicate("rating")
    );
    let rows = store
        .connection()
        .execute(&sql, params![bounds.lower, bounds.upper])?;
    Ok(rows as u64)
}
