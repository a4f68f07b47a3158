//! DuckDB-backed storage for rating tables.
//!
//! A [`Store`] owns one connection. Worker threads get their own connection
//! to the same database through [`Store::try_clone`], which must be called on
//! the thread that owns the original.

use std::sync::Arc;

use duckdb::{params, Connection};
use log::debug;

use crate::appender::RatingAppender;
use crate::config::PartitionConfig;
use crate::error::Result;
use crate::naming::{qualified_name, quote_ident};
use crate::record::RatingRecord;

const RATING_COLUMNS: &str = "user_id, item_id, rating";

pub struct Store {
    conn: Connection,
    config: Arc<PartitionConfig>,
}

impl Store {
    pub fn open(config: PartitionConfig) -> Result<Self> {
        config.validate()?;
        let conn = if config.database_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.database_path)?
        };
        debug!("opened database {}", config.database_path);
        Ok(Self {
            conn,
            config: Arc::new(config),
        })
    }

    /// Fresh in-memory database with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(PartitionConfig::default())
    }

    /// New connection to the same database, sharing the configuration.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            conn: self.conn.try_clone()?,
            config: Arc::clone(&self.config),
        })
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // DDL
    // -----------------------------------------------------------------------

    pub fn create_schema(&self, schema: &str) -> Result<()> {
        self.execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
    }

    /// Create a rating table. `unique` adds a (user_id, item_id) primary key;
    /// `replace` drops any existing table of that name first.
    pub fn create_rating_table(
        &self,
        schema: &str,
        table: &str,
        unique: bool,
        replace: bool,
    ) -> Result<()> {
        self.create_schema(schema)?;
        let name = qualified_name(schema, table);
        if replace {
            self.execute(&format!("DROP TABLE IF EXISTS {name}"))?;
        }
        let key = if unique {
            ", PRIMARY KEY (user_id, item_id)"
        } else {
            ""
        };
        self.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {name} (\
                user_id INTEGER NOT NULL, \
                item_id INTEGER NOT NULL, \
                rating DOUBLE NOT NULL{key})"
        ))
    }

    /// Empty the table if it exists, otherwise create it without a key.
    pub fn create_or_truncate(&self, schema: &str, table: &str) -> Result<()> {
        if self.table_exists(schema, table)? {
            self.truncate_table(schema, table)
        } else {
            self.create_rating_table(schema, table, false, false)
        }
    }

    pub fn drop_table(&self, schema: &str, table: &str) -> Result<()> {
        self.execute(&format!("DROP TABLE IF EXISTS {}", qualified_name(schema, table)))
    }

    pub fn truncate_table(&self, schema: &str, table: &str) -> Result<()> {
        self.execute(&format!("TRUNCATE {}", qualified_name(schema, table)))
    }

    pub fn create_rating_index(&self, schema: &str, table: &str) -> Result<()> {
        self.execute(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (rating)",
            quote_ident(&format!("{table}_rating_idx")),
            qualified_name(schema, table)
        ))
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    pub fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM duckdb_tables() \
             WHERE database_name = current_database() \
               AND schema_name = ? AND table_name = ?",
            params![schema, table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_tables_by_prefix(&self, schema: &str, prefix: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM duckdb_tables() \
             WHERE database_name = current_database() \
               AND schema_name = ? AND starts_with(table_name, ?)",
            params![schema, prefix],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn list_tables_by_prefix(&self, schema: &str, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT table_name FROM duckdb_tables() \
             WHERE database_name = current_database() \
               AND schema_name = ? AND starts_with(table_name, ?) \
             ORDER BY table_name",
        )?;
        let names = stmt
            .query_map(params![schema, prefix], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn count_rows(&self, schema: &str, table: &str) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}", qualified_name(schema, table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Stream the table in `(user_id, item_id, rating)` order, handing rows
    /// to `f` in batches of at most `batch_size`. Returns the row count.
    pub fn scan_ordered<F>(
        &self,
        schema: &str,
        table: &str,
        batch_size: usize,
        mut f: F,
    ) -> Result<u64>
    where
        F: FnMut(Vec<RatingRecord>) -> Result<()>,
    {
        let batch_size = batch_size.max(1);
        let sql = format!(
            "SELECT {RATING_COLUMNS} FROM {} ORDER BY user_id, item_id, rating",
            qualified_name(schema, table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut total = 0u64;
        let mut batch = Vec::with_capacity(batch_size);
        while let Some(row) = rows.next()? {
            batch.push(RatingRecord::new(row.get(0)?, row.get(1)?, row.get(2)?));
            if batch.len() >= batch_size {
                total += batch.len() as u64;
                f(std::mem::replace(&mut batch, Vec::with_capacity(batch_size)))?;
            }
        }
        if !batch.is_empty() {
            total += batch.len() as u64;
            f(batch)?;
        }
        Ok(total)
    }

    /// Every row of the table, in scan order.
    pub fn fetch_records(&self, schema: &str, table: &str) -> Result<Vec<RatingRecord>> {
        let mut out = Vec::new();
        self.scan_ordered(schema, table, self.config.batch_size, |batch| {
            out.extend(batch);
            Ok(())
        })?;
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub fn appender(&self, schema: &str, table: &str) -> Result<RatingAppender<'_>> {
        RatingAppender::create(&self.conn, schema, table, self.config.batch_size)
    }

    /// Append `rows`, flushing every `batch_size` rows.
    pub fn bulk_insert(&self, schema: &str, table: &str, rows: &[RatingRecord]) -> Result<u64> {
        let mut appender = self.appender(schema, table)?;
        appender.append_all(rows)?;
        appender.close()
    }

    /// Insert `rows` into a keyed table, skipping keys that already exist or
    /// repeat within `rows` (first occurrence wins). Rows pass through
    /// `staging`, an unkeyed table in the same schema that the caller creates.
    pub fn bulk_insert_unique(
        &self,
        schema: &str,
        table: &str,
        staging: &str,
        rows: &[RatingRecord],
    ) -> Result<u64> {
        let before = self.count_rows(schema, table)?;
        for chunk in rows.chunks(self.config.batch_size) {
            self.truncate_table(schema, staging)?;
            self.bulk_insert(schema, staging, chunk)?;
            self.conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO {} ({RATING_COLUMNS}) \
                     SELECT {RATING_COLUMNS} FROM (\
                         SELECT {RATING_COLUMNS}, row_number() OVER (\
                             PARTITION BY user_id, item_id ORDER BY rowid) AS rn \
                         FROM {}) \
                     WHERE rn = 1",
                    qualified_name(schema, table),
                    qualified_name(schema, staging)
                ),
                [],
            )?;
        }
        Ok(self.count_rows(schema, table)? - before)
    }

    pub fn insert_record(&self, schema: &str, table: &str, record: &RatingRecord) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({RATING_COLUMNS}) VALUES (?, ?, ?)",
                qualified_name(schema, table)
            ),
            params![record.user_id, record.item_id, record.rating],
        )?;
        Ok(())
    }

    /// Returns false when the key already existed and nothing was written.
    pub fn insert_record_ignore_duplicate(
        &self,
        schema: &str,
        table: &str,
        record: &RatingRecord,
    ) -> Result<bool> {
        let written = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({RATING_COLUMNS}) VALUES (?, ?, ?)",
                qualified_name(schema, table)
            ),
            params![record.user_id, record.item_id, record.rating],
        )?;
        Ok(written > 0)
    }

    // -----------------------------------------------------------------------
    // Rotation cursor
    // -----------------------------------------------------------------------

    /// (Re)create a cycling counter yielding 0, 1, .., partitions-1, 0, ...
    ///
    /// DuckDB needs MINVALUE < MAXVALUE, so a single partition gets a 0/1
    /// cycle; readers reduce the value modulo the partition count.
    pub fn reset_cursor(&self, schema: &str, name: &str, partitions: usize) -> Result<()> {
        self.create_schema(schema)?;
        let seq = qualified_name(schema, name);
        let max = partitions.saturating_sub(1).max(1);
        self.execute(&format!(
            "DROP SEQUENCE IF EXISTS {seq}; \
             CREATE SEQUENCE {seq} START WITH 0 MINVALUE 0 MAXVALUE {max} CYCLE;"
        ))
    }

    /// Fetch the current cursor value and advance it, atomically.
    pub fn advance_cursor(&self, schema: &str, name: &str) -> Result<u64> {
        let target = format!("{schema}.{name}").replace('\'', "''");
        let value: i64 = self
            .conn
            .query_row(&format!("SELECT nextval('{target}')"), [], |row| row.get(0))?;
        Ok(value as u64)
    }
}
