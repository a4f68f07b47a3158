use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{PartitionError, Result};

pub const CONFIG_ENV_VAR: &str = "RPART_CONFIG";
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Engine settings. Every field has a default, so an empty TOML file or
/// `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// DuckDB database file, or `:memory:`.
    pub database_path: String,
    pub base_schema: String,
    pub partition_schema: String,
    /// Rows per appender flush and per scan batch.
    pub batch_size: usize,
    /// Upper bound on builder worker threads. Defaults to available parallelism.
    pub max_workers: Option<usize>,
    /// Enforce a (user_id, item_id) primary key on the base table.
    pub unique_ratings: bool,
    /// Routed inserts also go into the base table.
    pub dual_write: bool,
    /// Index the base table's rating column before range partitioning.
    pub rating_index: bool,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            base_schema: "movielens".to_string(),
            partition_schema: "partitions".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: None,
            unique_ratings: true,
            dual_write: true,
            rating_index: false,
        }
    }
}

impl PartitionConfig {
    /// Configuration from the JSON in `RPART_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self> {
        match env::var(CONFIG_ENV_VAR) {
            Ok(raw) => Self::from_json(&raw),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: PartitionConfig = serde_json::from_str(json)
            .map_err(|e| PartitionError::config(format!("failed to parse {CONFIG_ENV_VAR}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: PartitionConfig = toml::from_str(raw)
            .map_err(|e| PartitionError::config(format!("failed to parse TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_path.trim().is_empty() {
            return Err(PartitionError::config("database_path must be non-empty"));
        }
        if self.base_schema.trim().is_empty() || self.partition_schema.trim().is_empty() {
            return Err(PartitionError::config("schema names must be non-empty"));
        }
        if self.batch_size == 0 {
            return Err(PartitionError::config("batch_size must be > 0"));
        }
        if self.max_workers == Some(0) {
            return Err(PartitionError::config("max_workers must be > 0 when set"));
        }
        Ok(())
    }

    /// Worker threads for a build over `jobs` partitions.
    pub fn worker_count(&self, jobs: usize) -> usize {
        let limit = self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        limit.min(jobs).max(1)
    }
}
