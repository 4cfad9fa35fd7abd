//! Database layer for MRN allocation.

mod schema;
mod facilities;
mod patients;
mod sequences;
mod settings;

pub use schema::*;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::CoreConfig;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    /// True when the store could not be reached or its lock could not be
    /// acquired within the busy timeout.
    pub fn is_unavailable(&self) -> bool {
        match self {
            DbError::Sqlite(e) => matches!(
                e.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy)
                    | Some(ErrorCode::DatabaseLocked)
                    | Some(ErrorCode::CannotOpen)
            ),
        }
    }

    /// True for UNIQUE / CHECK / trigger aborts raised by the schema.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DbError::Sqlite(e) => {
                matches!(e.sqlite_error_code(), Some(ErrorCode::ConstraintViolation))
            }
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with_config(path, &CoreConfig::default())
    }

    /// Open database at path with an explicit lock timeout.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: &CoreConfig) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.set_lock_timeout(config.lock_timeout())?;
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// How long to wait for another connection's write lock before failing.
    pub fn set_lock_timeout(&self, timeout: Duration) -> DbResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction that takes the database write lock up front.
    ///
    /// Every statement issued through this `Database` while the returned
    /// transaction is alive runs inside it. Dropping it without `commit`
    /// rolls back.
    pub fn immediate_transaction(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// True while a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Run `f` inside a write transaction.
    ///
    /// Joins the caller's transaction if one is already open (the caller then
    /// owns commit and rollback). Otherwise opens an immediate transaction,
    /// commits when `f` succeeds and rolls back when it fails.
    pub fn write_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<DbError>,
    {
        if self.in_transaction() {
            return f();
        }

        let tx = self.immediate_transaction()?;
        let value = f()?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}
