//! SQLite-backed store for the canonical schema.
//!
//! [`Store`] owns the connection and the batch lifecycle. Entity reads and
//! writes live in [`queries`] as functions over `&Connection`, so they run the
//! same way on a plain connection, a transaction or a savepoint.

pub mod queries;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::types::{BatchStatus, ImportBatch};

const INITIAL_SCHEMA: &str = include_str!("../../../migrations/001_initial_schema.sql");

pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!("Opened store at {}", path.display());
        Self::configure(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    pub fn run_migrations(&self) -> Result<()> {
        debug!("Applying schema");
        self.conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Starts the run-wide transaction. `IMMEDIATE` takes the write lock up
    /// front, so a second concurrent run waits (then fails) instead of
    /// interleaving with this one.
    pub fn begin_run(&mut self) -> Result<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Records a new `running` batch and commits it immediately, so the
    /// batch stays visible even if the run's data transaction rolls back.
    pub fn create_batch(&self, source_url: &str) -> Result<ImportBatch> {
        let batch = ImportBatch::new(source_url);
        self.conn.execute(
            "INSERT INTO import_batch (id, source_url, status, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                batch.id.to_string(),
                batch.source_url,
                batch.status.as_str(),
                batch.started_at.to_rfc3339()
            ],
        )?;
        Ok(batch)
    }

    pub fn fail_batch(&self, batch_id: Uuid, reason: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE import_batch SET status = ?1, completed_at = ?2, notes = ?3 WHERE id = ?4",
            params![
                BatchStatus::Failed.as_str(),
                Utc::now().to_rfc3339(),
                reason,
                batch_id.to_string()
            ],
        )?;
        if updated == 0 {
            return Err(IngestError::MissingReference(format!("import batch {batch_id}")));
        }
        Ok(())
    }

    pub fn get_batch(&self, batch_id: Uuid) -> Result<Option<ImportBatch>> {
        self.conn
            .query_row(
                "SELECT source_url, status, started_at, completed_at, record_count, notes
                 FROM import_batch WHERE id = ?1",
                params![batch_id.to_string()],
                |row| {
                    let status: String = row.get(1)?;
                    let started_at: String = row.get(2)?;
                    let completed_at: Option<String> = row.get(3)?;
                    Ok(ImportBatch {
                        id: batch_id,
                        source_url: row.get(0)?,
                        status: BatchStatus::parse(&status).unwrap_or(BatchStatus::Failed),
                        started_at: parse_timestamp(&started_at).unwrap_or_else(Utc::now),
                        completed_at: completed_at.as_deref().and_then(parse_timestamp),
                        record_count: row.get(4)?,
                        notes: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(IngestError::from)
    }

    /// Row count of one of the entity tables.
    pub fn count(&self, table: EntityTable) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }
}

/// Tables that [`Store::count`] may be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityTable {
    Site,
    Sample,
    AgeDetermination,
    DataSource,
    ImportBatch,
}

impl EntityTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityTable::Site => "site",
            EntityTable::Sample => "sample",
            EntityTable::AgeDetermination => "age_determination",
            EntityTable::DataSource => "data_source",
            EntityTable::ImportBatch => "import_batch",
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
