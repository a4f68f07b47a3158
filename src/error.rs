use thiserror::Error;

use crate::naming::Strategy;

#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("no {strategy} partitions exist; run a bulk partitioning first")]
    NoPartitions { strategy: Strategy },

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("{strategy} partitioning failed for partitions {failed:?}: {first_error}")]
    PartialPartitionFailure {
        strategy: Strategy,
        failed: Vec<usize>,
        first_error: String,
    },

    #[error("partition count must be at least 1, got {0}")]
    InvalidPartitionCount(usize),

    #[error("base table '{table}' does not exist")]
    BaseTableMissing { table: String },

    #[error("rating for user {user_id}, item {item_id} already exists")]
    DuplicateRecord { user_id: i32, item_id: i32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PartitionError>;

impl PartitionError {
    /// Malformed input that did not come from a file line.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line: 0,
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Partition indices a failed bulk build left incomplete, if any.
    pub fn failed_partitions(&self) -> &[usize] {
        match self {
            Self::PartialPartitionFailure { failed, .. } => failed,
            _ => &[],
        }
    }
}
