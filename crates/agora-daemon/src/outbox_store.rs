//! SQLite-backed outbox store.
//!
//! [`Outbox::emit`] takes the caller's open [`rusqlite::Transaction`]
//! rather than a connection: the outbox owns no transaction boundary of
//! its own, it only appends within one. That is what ties the durable
//! event log to the domain mutation that produced it: both commit or
//! both roll back.
//!
//! The write-time policy (blacklist, priority resolution) comes from the
//! injected [`DispatchPolicy`]; nothing here deduplicates. Draining is a
//! convenience for the transport loop: unrelayed entries come out in
//! priority-then-age order and are marked relayed once handed off.

use agora_core::outbox::{DispatchPolicy, OutboxEntry, OutboxRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("outbox_schema.sql");

/// Errors from outbox store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OutboxStoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row failed to decode.
    #[error("corrupt outbox row {event_id}: {details}")]
    CorruptRow {
        /// The offending entry id.
        event_id: String,
        /// What failed to decode.
        details: String,
    },
}

/// Durable outbox writer with an injected write-time policy.
#[derive(Debug, Clone)]
pub struct Outbox {
    policy: DispatchPolicy,
}

impl Outbox {
    /// Create an outbox with the given immutable policy.
    #[must_use]
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    /// Create the outbox table and indexes if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if schema execution fails.
    pub fn init_schema(conn: &Connection) -> Result<(), OutboxStoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Apply policy to `records` and insert the survivors as one batch
    /// inside the caller's ambient transaction.
    ///
    /// Returns the number of rows inserted. Blacklisted kinds are
    /// dropped (logged) before insertion; identical records always
    /// produce distinct rows.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; the caller's transaction is
    /// then expected to roll back the whole command.
    pub fn emit(
        &self,
        tx: &Transaction<'_>,
        records: Vec<OutboxRecord>,
    ) -> Result<usize, OutboxStoreError> {
        let entries = self.policy.prepare(records);
        Self::bulk_insert(tx, &entries)?;
        Ok(entries.len())
    }

    /// Insert already-policied entries inside the ambient transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub fn bulk_insert(
        tx: &Transaction<'_>,
        entries: &[OutboxEntry],
    ) -> Result<(), OutboxStoreError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut stmt = tx.prepare_cached(
            "INSERT INTO outbox (event_id, event_name, event_payload, priority, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for entry in entries {
            stmt.execute(params![
                entry.event_id.to_string(),
                entry.event_name,
                entry.event_payload.to_string(),
                entry.priority,
                entry.created_at.to_rfc3339(),
            ])?;
        }
        info!(inserted = entries.len(), "appended outbox entries");
        Ok(())
    }

    /// Fetch up to `limit` unrelayed entries, highest priority first,
    /// oldest first within a priority.
    ///
    /// # Errors
    ///
    /// Returns an error on query failure or if a stored row fails to
    /// decode.
    pub fn drain_unrelayed(
        conn: &Connection,
        limit: usize,
    ) -> Result<Vec<OutboxEntry>, OutboxStoreError> {
        let mut stmt = conn.prepare_cached(
            "SELECT event_id, event_name, event_payload, priority, created_at
             FROM outbox
             WHERE relayed = 0
             ORDER BY priority DESC, created_at ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (event_id, event_name, payload, priority, created_at) = row?;
            let entry = OutboxEntry {
                event_id: Uuid::parse_str(&event_id).map_err(|e| {
                    OutboxStoreError::CorruptRow {
                        event_id: event_id.clone(),
                        details: format!("bad uuid: {e}"),
                    }
                })?,
                event_name,
                event_payload: serde_json::from_str(&payload).map_err(|e| {
                    OutboxStoreError::CorruptRow {
                        event_id: event_id.clone(),
                        details: format!("bad payload json: {e}"),
                    }
                })?,
                priority,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| OutboxStoreError::CorruptRow {
                        event_id: event_id.clone(),
                        details: format!("bad timestamp: {e}"),
                    })?
                    .with_timezone(&Utc),
            };
            entries.push(entry);
        }
        debug!(drained = entries.len(), "drained unrelayed outbox entries");
        Ok(entries)
    }

    /// Mark entries as relayed after the transport has accepted them.
    ///
    /// # Errors
    ///
    /// Returns an error on update failure.
    pub fn mark_relayed(conn: &Connection, event_ids: &[Uuid]) -> Result<usize, OutboxStoreError> {
        let mut stmt = conn.prepare_cached("UPDATE outbox SET relayed = 1 WHERE event_id = ?1")?;
        let mut updated = 0;
        for id in event_ids {
            updated += stmt.execute(params![id.to_string()])?;
        }
        Ok(updated)
    }
}
