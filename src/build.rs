//! Coordinator steps shared by the range and round-robin builders.

use log::debug;

use crate::catalog::drop_stale_partitions;
use crate::error::{PartitionError, Result};
use crate::naming::{partition_table_name, Strategy};
use crate::store::Store;

/// Outcome of a successful bulk partitioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub strategy: Strategy,
    pub partitions: usize,
    pub rows_per_partition: Vec<u64>,
}

impl BuildReport {
    pub fn total_rows(&self) -> u64 {
        self.rows_per_partition.iter().sum()
    }

    pub fn table_names(&self) -> Vec<String> {
        (0..self.partitions)
            .map(|i| partition_table_name(self.strategy, i))
            .collect()
    }
}

/// Validate the request and leave exactly `partitions` empty partition
/// tables of `strategy` in the partition schema.
///
/// All DDL happens here, on the coordinator's connection, so that workers
/// only ever write rows into tables that already exist.
pub(crate) fn prepare_partition_tables(
    store: &Store,
    strategy: Strategy,
    base_table: &str,
    partitions: usize,
) -> Result<()> {
    if partitions == 0 {
        return Err(PartitionError::InvalidPartitionCount(partitions));
    }
    let config = store.config();
    if !store.table_exists(&config.base_schema, base_table)? {
        return Err(PartitionError::BaseTableMissing {
            table: format!("{}.{}", config.base_schema, base_table),
        });
    }

    store.create_schema(&config.partition_schema)?;
    for i in 0..partitions {
        let name = partition_table_name(strategy, i);
        store.create_or_truncate(&config.partition_schema, &name)?;
        debug!("prepared {}.{}", config.partition_schema, name);
    }
    drop_stale_partitions(store, strategy, partitions)?;
    Ok(())
}
