//! SQLite store for sampled AI outputs, expert validations and reviewers.
//!
//! One connection per [`Database`]; callers share it behind a mutex. File
//! stores run in WAL mode so the review portal can read while an analysis
//! is being recorded.

mod outputs;
mod reviewers;
mod schema;
mod stats;
mod validations;

pub use schema::*;
pub use stats::*;

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// A stored value no longer decodes into its domain type.
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// A write collided with a unique key held by another record.
    #[error("Conflict: {0}")]
    Conflict(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Writers wait this long for a competing lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the validation store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the store at `path`, creating the file and its directory on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        debug!(journal_mode = %mode, "Validation store journal");

        let db = Self::with_connection(conn)?;
        info!(path = %path.display(), "Validation store ready");
        Ok(db)
    }

    /// Private store that lives as long as the handle.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Create tables and indexes if missing and seed the demo reviewer.
    fn with_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Raw connection for ad-hoc reads.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        // Check that tables exist
        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"ai_outputs".to_string()));
        assert!(tables.contains(&"validations".to_string()));
        assert!(tables.contains(&"reviewers".to_string()));
    }

    #[test]
    fn test_open_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("validation.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_file_store_uses_wal_and_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("validation.db")).unwrap();

        let mode: String = db
            .conn()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let fk: i64 = db
            .conn()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_reopen_keeps_demo_reviewer_single() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();

        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM reviewers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
