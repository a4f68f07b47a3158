use duckdb::{params, Appender, Connection};

use crate::error::Result;
use crate::record::RatingRecord;

/// Appender for one rating table that flushes every `batch_size` rows.
///
/// Borrows the connection it was created on; callers that append from a
/// worker thread create it on that worker's own connection.
pub struct RatingAppender<'conn> {
    inner: Appender<'conn>,
    batch_size: usize,
    pending: usize,
    appended: u64,
}

impl<'conn> RatingAppender<'conn> {
    pub fn create(
        conn: &'conn Connection,
        schema: &str,
        table: &str,
        batch_size: usize,
    ) -> Result<Self> {
        let inner = conn.appender_to_db(table, schema)?;
        Ok(Self {
            inner,
            batch_size: batch_size.max(1),
            pending: 0,
            appended: 0,
        })
    }

    pub fn append(&mut self, record: &RatingRecord) -> Result<()> {
        self.inner
            .append_row(params![record.user_id, record.item_id, record.rating])?;
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn append_all(&mut self, records: &[RatingRecord]) -> Result<()> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        self.inner.flush()?;
        self.appended += self.pending as u64;
        self.pending = 0;
        Ok(())
    }

    /// Rows flushed so far.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Flush the tail and return the total number of rows written.
    pub fn close(mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appender_flushes_in_batches() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE SCHEMA s; \
             CREATE TABLE s.t (user_id INTEGER, item_id INTEGER, rating DOUBLE)",
        )
        .unwrap();

        let mut app = RatingAppender::create(&conn, "s", "t", 2).unwrap();
        app.append(&RatingRecord::new(1, 10, 1.5)).unwrap();
        assert_eq!(app.appended(), 0);
        app.append(&RatingRecord::new(2, 20, 2.5)).unwrap();
        assert_eq!(app.appended(), 2);
        app.append(&RatingRecord::new(3, 30, 3.5)).unwrap();
        assert_eq!(app.close().unwrap(), 3);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM s.t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
