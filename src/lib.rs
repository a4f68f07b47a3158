//! Range and round-robin partitioning of `(user_id, item_id, rating)` tables
//! stored in DuckDB.
//!
//! Bulk builders split a base table into `range_part{i}` or `rrobin_part{i}`
//! tables in the partition schema, running one job per partition on a
//! bounded worker pool. Routers place single records into whatever
//! partitions currently exist.

pub mod appender;
pub mod build;
pub mod catalog;
pub mod config;
pub mod error;
pub mod interval;
pub mod loader;
pub mod naming;
pub mod pool;
pub mod range;
pub mod record;
pub mod round_robin;
pub mod router;
pub mod store;

pub use build::BuildReport;
pub use catalog::{count_partitions, list_partitions, partition_count};
pub use config::PartitionConfig;
pub use error::{PartitionError, Result};
pub use loader::{load_ratings, LoadReport};
pub use naming::Strategy;
pub use range::build_range_partitions;
pub use record::RatingRecord;
pub use round_robin::build_round_robin_partitions;
pub use router::{route_range_insert, route_round_robin_insert, RoutedInsert};
pub use store::Store;
