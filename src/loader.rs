//! Bulk loading of a ratings file into the base table.

use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use crate::error::{PartitionError, Result};
use crate::record::{parse_rating_line, RatingRecord};
use crate::store::Store;

/// Counts from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows that ended up in the base table.
    pub loaded: u64,
    /// Lines rejected as malformed.
    pub skipped: u64,
    /// Well-formed rows dropped because their key was already present.
    pub duplicates: u64,
}

/// Recreate `base_table` and fill it from the ratings file at `path`.
///
/// Malformed lines are logged and skipped; they never abort the load.
pub fn load_ratings(store: &Store, base_table: &str, path: impl AsRef<Path>) -> Result<LoadReport> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let start = Instant::now();
    let report = load_ratings_from_reader(store, base_table, BufReader::new(file))?;
    info!(
        "loaded {} rows from {} in {:.2?} ({} malformed, {} duplicate)",
        report.loaded,
        path.display(),
        start.elapsed(),
        report.skipped,
        report.duplicates
    );
    Ok(report)
}

pub fn load_ratings_from_reader<R: BufRead>(
    store: &Store,
    base_table: &str,
    reader: R,
) -> Result<LoadReport> {
    let config = store.config();
    let schema = config.base_schema.as_str();
    store.create_rating_table(schema, base_table, config.unique_ratings, true)?;

    let staging = format!("{base_table}__staging");
    if config.unique_ratings {
        store.create_rating_table(schema, &staging, false, true)?;
    }

    let mut report = LoadReport::default();
    let mut batch: Vec<RatingRecord> = Vec::with_capacity(config.batch_size);
    let flush = |batch: &mut Vec<RatingRecord>, report: &mut LoadReport| -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let written = if config.unique_ratings {
            store.bulk_insert_unique(schema, base_table, &staging, batch)?
        } else {
            store.bulk_insert(schema, base_table, batch)?
        };
        report.loaded += written;
        report.duplicates += batch.len() as u64 - written;
        batch.clear();
        Ok(())
    };

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_rating_line(&line, idx + 1) {
            Ok(Some(record)) => batch.push(record),
            Ok(None) => {}
            Err(e @ PartitionError::MalformedRecord { .. }) => {
                warn!("skipping {e}");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
        if batch.len() >= config.batch_size {
            flush(&mut batch, &mut report)?;
        }
    }
    flush(&mut batch, &mut report)?;

    if config.unique_ratings {
        store.drop_table(schema, &staging)?;
    }
    Ok(report)
}
