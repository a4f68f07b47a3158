//! Partition catalog: which partition tables currently exist.
//!
//! The partition count is never stored; it is always rediscovered from the
//! tables present in the partition schema.

use log::info;

use crate::error::Result;
use crate::naming::{parse_partition_index, Strategy};
use crate::store::Store;

/// Number of tables in the partition schema whose name starts with `prefix`.
pub fn count_partitions(store: &Store, prefix: &str) -> Result<usize> {
    store.count_tables_by_prefix(&store.config().partition_schema, prefix)
}

/// Current partition count for `strategy`.
pub fn partition_count(store: &Store, strategy: Strategy) -> Result<usize> {
    count_partitions(store, strategy.prefix())
}

/// `(index, table name)` for every partition table of `strategy`, by index.
pub fn list_partitions(store: &Store, strategy: Strategy) -> Result<Vec<(usize, String)>> {
    let names = store.list_tables_by_prefix(&store.config().partition_schema, strategy.prefix())?;
    let mut partitions: Vec<(usize, String)> = names
        .into_iter()
        .filter_map(|name| parse_partition_index(strategy, &name).map(|idx| (idx, name)))
        .collect();
    partitions.sort_by_key(|(idx, _)| *idx);
    Ok(partitions)
}

/// Drop partition tables with index >= `keep`, left behind by an earlier
/// run with more partitions. Returns how many were dropped.
pub fn drop_stale_partitions(store: &Store, strategy: Strategy, keep: usize) -> Result<usize> {
    let schema = &store.config().partition_schema;
    let mut dropped = 0;
    for (idx, name) in list_partitions(store, strategy)? {
        if idx >= keep {
            store.drop_table(schema, &name)?;
            dropped += 1;
        }
    }
    if dropped > 0 {
        info!("dropped {dropped} stale {strategy} partition(s)");
    }
    Ok(dropped)
}
