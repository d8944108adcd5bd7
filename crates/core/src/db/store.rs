use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use thiserror::Error;

use crate::model::Outcome;

use super::models::SubscriptionRecord;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Error type for subscription store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The database was created with a newer schema version than we support.
    ///
    /// Explicit so callers can surface a clear message instead of silently
    /// clobbering or misinterpreting data.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite-backed subscription store.
///
/// This is a thin wrapper around `rusqlite::Connection` that is responsible
/// for:
/// - Opening/creating the DB file and applying schema migrations.
/// - Providing small, testable helpers for the read-modify-write cycles the
///   watcher performs.
///
/// The database runs in WAL mode and mutations take IMMEDIATE transactions,
/// so a chat frontend sharing the file serializes against the watcher
/// without any in-process lock.
#[derive(Debug)]
pub struct SubscriptionDb {
    conn: Connection,
}

impl SubscriptionDb {
    /// Open (or create) a store at the given path and ensure the schema
    /// exists.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        // journal_mode reports the resulting mode as a row, so it cannot go
        // through execute().
        let _mode: String = conn.query_row("PRAGMA journal_mode = wal", [], |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose a reference to the underlying connection for advanced callers.
    /// For most code, prefer the higher-level helpers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a subscription and return its row id.
    ///
    /// Identity fields may arrive later; the chat frontend collects them
    /// one message at a time.
    pub fn insert(
        &self,
        contact: &str,
        ulss_id: Option<u8>,
        fiscal_code: Option<&str>,
        health_insurance_number: Option<&str>,
    ) -> StoreResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO subscriptions (contact, ulss_id, fiscal_code, health_insurance_number)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![contact, ulss_id.map(i64::from), fiscal_code, health_insurance_number],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Load one subscription by id.
    pub fn by_id(&self, id: i64) -> StoreResult<Option<SubscriptionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, contact, ulss_id, fiscal_code, health_insurance_number,
                   outcome, locations, last_check
            FROM subscriptions
            WHERE id = ?1
            "#,
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(map_subscription(row)?)),
            None => Ok(None),
        }
    }

    /// List all subscriptions (ordered by id).
    pub fn list(&self) -> StoreResult<Vec<SubscriptionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, contact, ulss_id, fiscal_code, health_insurance_number,
                   outcome, locations, last_check
            FROM subscriptions
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], map_subscription)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Subscriptions whose identity is complete, in insertion order.
    ///
    /// Rows still missing identity fields are not errors, just not ready to
    /// check; they never reach the scheduler.
    pub fn select_checkable(&self) -> StoreResult<Vec<SubscriptionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, contact, ulss_id, fiscal_code, health_insurance_number,
                   outcome, locations, last_check
            FROM subscriptions
            WHERE ulss_id IS NOT NULL
              AND fiscal_code IS NOT NULL
              AND health_insurance_number IS NOT NULL
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], map_subscription)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete a subscription. Returns the number of rows affected.
    pub fn delete(&self, id: i64) -> StoreResult<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM subscriptions WHERE id = ?1", params![id])?;
        Ok(affected)
    }

    /// Persist the result of a completed check and stamp `last_check`.
    ///
    /// Runs in an IMMEDIATE transaction: the write lock is taken up front
    /// so the read-modify-write cannot interleave with another process on
    /// the same file.
    pub fn record_check(
        &self,
        id: i64,
        outcome: Outcome,
        locations_json: &str,
        now: i64,
    ) -> StoreResult<usize> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let affected = tx.execute(
            r#"
            UPDATE subscriptions
            SET outcome = ?1, locations = ?2, last_check = ?3
            WHERE id = ?4
            "#,
            params![outcome.as_str(), locations_json, now, id],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    /// Append an operational event (`http-error`, `application-error`,
    /// `notification`) for operator statistics.
    pub fn record_event(&self, name: &str, ulss_id: Option<u8>) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO events (name, ulss_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, ulss_id.map(i64::from), Utc::now().timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Count events with the given name.
    pub fn count_events(&self, name: &str) -> StoreResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_subscription(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriptionRecord> {
    Ok(SubscriptionRecord {
        id: row.get(0)?,
        contact: row.get(1)?,
        ulss_id: row.get::<_, Option<i64>>(2)?.map(|v| v as u8),
        fiscal_code: row.get(3)?,
        health_insurance_number: row.get(4)?,
        outcome: Outcome::parse(row.get::<_, String>(5)?.as_str()),
        locations: row.get(6)?,
        last_check: row.get(7)?,
    })
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: initial schema (subscriptions)
/// - 2: add events table
fn apply_migrations(conn: &Connection) -> StoreResult<()> {
    let mut current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        // Initial schema.
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS subscriptions (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                contact                 TEXT NOT NULL,
                ulss_id                 INTEGER,
                fiscal_code             TEXT,
                health_insurance_number TEXT,
                outcome                 TEXT NOT NULL DEFAULT 'unknown',
                locations               TEXT NOT NULL DEFAULT '[]',
                last_check              INTEGER
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
        current_version = 1;
    }

    if current_version < 2 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS events (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                name       TEXT NOT NULL,
                ulss_id    INTEGER,
                created_at INTEGER NOT NULL
            );

            PRAGMA user_version = 2;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> StoreResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
