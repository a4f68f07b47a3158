//! Single-record routing into existing partitions.
//!
//! Both routers discover the partition count from the catalog on every
//! call and refuse to write anything when no partitions exist.

use log::debug;

use crate::catalog::partition_count;
use crate::error::{PartitionError, Result};
use crate::interval::partition_for_rating;
use crate::naming::{partition_table_name, Strategy, RROBIN_INSERT_SEQ};
use crate::record::RatingRecord;
use crate::store::Store;

/// Where a routed record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedInsert {
    pub strategy: Strategy,
    pub partition: usize,
    pub table: String,
    pub base_written: bool,
}

/// Insert `record` into the range partition owning its rating.
pub fn route_range_insert(
    store: &Store,
    base_table: &str,
    record: &RatingRecord,
) -> Result<RoutedInsert> {
    record.validate()?;
    let partitions = existing_partitions(store, Strategy::Range)?;
    let partition = partition_for_rating(record.rating, partitions);
    let base_written = write_base(store, base_table, record)?;
    insert_into_partition(store, Strategy::Range, partition, record, base_written)
}

/// Insert `record` into the partition the rotation cursor points at, and
/// advance the cursor.
///
/// The cursor is a store-side sequence, so concurrent callers on separate
/// connections each draw a distinct value.
pub fn route_round_robin_insert(
    store: &Store,
    base_table: &str,
    record: &RatingRecord,
) -> Result<RoutedInsert> {
    record.validate()?;
    let partitions = existing_partitions(store, Strategy::RoundRobin)?;
    let base_written = write_base(store, base_table, record)?;
    let cursor = store.advance_cursor(&store.config().partition_schema, RROBIN_INSERT_SEQ)?;
    let partition = (cursor % partitions as u64) as usize;
    insert_into_partition(store, Strategy::RoundRobin, partition, record, base_written)
}

fn existing_partitions(store: &Store, strategy: Strategy) -> Result<usize> {
    match partition_count(store, strategy)? {
        0 => Err(PartitionError::NoPartitions { strategy }),
        n => Ok(n),
    }
}

/// Dual-write into the base table when configured. Under the uniqueness
/// option an existing (user_id, item_id) aborts the whole insert.
fn write_base(store: &Store, base_table: &str, record: &RatingRecord) -> Result<bool> {
    let config = store.config();
    if !config.dual_write {
        return Ok(false);
    }
    if config.unique_ratings {
        if !store.insert_record_ignore_duplicate(&config.base_schema, base_table, record)? {
            return Err(PartitionError::DuplicateRecord {
                user_id: record.user_id,
                item_id: record.item_id,
            });
        }
    } else {
        store.insert_record(&config.base_schema, base_table, record)?;
    }
    Ok(true)
}

fn insert_into_partition(
    store: &Store,
    strategy: Strategy,
    partition: usize,
    record: &RatingRecord,
    base_written: bool,
) -> Result<RoutedInsert> {
    let table = partition_table_name(strategy, partition);
    store.insert_record(&store.config().partition_schema, &table, record)?;
    debug!(
        "routed ({}, {}, {}) to {table}",
        record.user_id, record.item_id, record.rating
    );
    Ok(RoutedInsert {
        strategy,
        partition,
        table,
        base_written,
    })
}
