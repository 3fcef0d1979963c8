//! Cache entry operations on [`CacheDb`].
//!
//! Reads, upserts, listing and removal, plus the bulk sweeps used to keep
//! the file from growing without bound.

use chrono::NaiveDateTime;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

use super::connection::CacheDb;
use super::store::{Store, StoredBlob, format_timestamp, parse_timestamp};
use crate::Error;

impl Store for CacheDb {
    fn get(&self, key: &str) -> Result<Option<StoredBlob>, Error> {
        let row = self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT data, create_time FROM cache WHERE request = ?1",
                params![key],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?)),
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;

        row.map(|(data, stamp)| Ok(StoredBlob { data, last_update: parse_timestamp(&stamp)? }))
            .transpose()
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Error> {
        let stamp = format_timestamp(self.clock.now());
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT OR REPLACE INTO cache (request, data, create_time) VALUES (?1, ?2, ?3)",
                params![key, data, stamp],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn query(&self) -> Result<Vec<(String, NaiveDateTime)>, Error> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT CAST(request AS TEXT), create_time FROM cache")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter()
            .map(|(key, stamp)| Ok((key, parse_timestamp(&stamp)?)))
            .collect()
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM cache WHERE request = ?1", params![key])?;
            tx.commit()?;
            Ok(())
        })
    }
}

impl CacheDb {
    /// Number of stored entries.
    pub fn len(&self) -> Result<u64, Error> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Delete every entry last updated strictly before `cutoff`.
    ///
    /// Returns the number of deleted entries.
    pub fn clean_older_than(&self, cutoff: NaiveDateTime) -> Result<u64, Error> {
        // The fixed-width timestamp text sorts chronologically.
        let cutoff = format_timestamp(cutoff);
        let deleted = self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let count = tx.execute("DELETE FROM cache WHERE create_time < ?1", params![cutoff])?;
            tx.commit()?;
            Ok(count as u64)
        })?;
        tracing::info!(deleted, %cutoff, "cleaned old tiles");
        Ok(deleted)
    }

    /// Delete the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    pub fn prune_oldest(&self, max_entries: usize) -> Result<u64, Error> {
        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM cache", [], |row| row.get(0))?;
            if count <= max {
                return Ok(0);
            }

            let to_delete = count - max;
            let deleted = tx.execute(
                "DELETE FROM cache WHERE rowid IN (
                    SELECT rowid FROM cache ORDER BY create_time ASC LIMIT ?1
                )",
                params![to_delete],
            )?;
            tx.commit()?;
            Ok(deleted as u64)
        })
    }
}
