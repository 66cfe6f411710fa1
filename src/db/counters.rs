//! Per-bucket task counters backing identifier allocation.

use super::{Database, now_ms};
use crate::error::AppError;
use crate::identifier::{Bucket, TaskIdentifier};
use crate::types::Role;
use anyhow::Result;
use chrono::FixedOffset;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// Increment the counter of `bucket` and return the new value.
///
/// The upsert runs as a single statement, so concurrent writers never lose an
/// increment. The first call for a bucket yields 1.
pub(crate) fn next_counter(conn: &Connection, bucket: &Bucket) -> Result<u32> {
    let value: i64 = conn.query_row(
        "INSERT INTO task_counters (role_prefix, year, month, counter)
         VALUES (?1, ?2, ?3, 1)
         ON CONFLICT(role_prefix, year, month) DO UPDATE SET counter = counter + 1
         RETURNING counter",
        params![bucket.role_prefix, bucket.year, bucket.month],
        |row| row.get(0),
    )?;
    Ok(u32::try_from(value)?)
}

/// Allocate the identifier for a task assigned to `role`, created at `at_ms`.
///
/// Callers run this inside the transaction that inserts the task, so a failed
/// insert rolls the counter back with it.
pub(crate) fn allocate_identifier(
    conn: &Connection,
    role: &Role,
    at_ms: i64,
    offset: FixedOffset,
) -> Result<TaskIdentifier> {
    let bucket = Bucket::at(role, at_ms, offset).ok_or_else(|| {
        AppError::invalid_value("created_at", "Timestamp is outside the supported range")
            .with_details(at_ms.to_string())
    })?;
    let counter = next_counter(conn, &bucket)?;
    let identifier = bucket.identifier(counter);
    debug!(
        prefix = bucket.role_prefix,
        year = bucket.year,
        month = bucket.month,
        counter,
        identifier = %identifier,
        "Allocated task identifier"
    );
    Ok(identifier)
}

impl Database {
    /// Allocate an identifier outside of task creation, in its own transaction.
    pub fn allocate_identifier(&self, role: &Role, at_ms: Option<i64>) -> Result<TaskIdentifier> {
        let at_ms = at_ms.unwrap_or_else(now_ms);
        let offset = self.utc_offset();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let identifier = allocate_identifier(&tx, role, at_ms, offset)?;
            tx.commit()?;
            Ok(identifier)
        })
    }

    /// Current counter value of a bucket, if any task was allocated in it.
    pub fn counter_value(&self, bucket: &Bucket) -> Result<Option<u32>> {
        self.with_conn(|conn| {
            let value: Option<i64> = conn
                .query_row(
                    "SELECT counter FROM task_counters
                     WHERE role_prefix = ?1 AND year = ?2 AND month = ?3",
                    params![bucket.role_prefix, bucket.year, bucket.month],
                    |row| row.get(0),
                )
                .optional()?;
            value.map(u32::try_from).transpose().map_err(Into::into)
        })
    }
}
