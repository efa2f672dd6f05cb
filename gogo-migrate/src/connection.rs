//! The contract between the migration engine and a database driver.
//!
//! The engine never talks to a driver directly. It needs to run statements
//! ([Executor]), open one transaction per migration step ([Connection::begin]),
//! finish that transaction ([Transaction]) and, on backends that need it, switch
//! the session out of auto-commit for the duration of a run
//! ([Connection::set_autocommit]). Implementations for `rusqlite`, `postgres`
//! and `mysql` live behind the matching cargo features.

use crate::error::Error;
use crate::value::{Row, Statement, Value};

/// Runs statements against a connection or an open transaction.
///
/// An empty result from [Executor::query] is the "no rows" signal; every other
/// failure is reported as an error.
pub trait Executor {
    /// Execute a statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error>;

    /// Execute a query and collect every row it returns.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error>;

    /// Ask the backend to prepare a statement without running it.
    fn prepare(&mut self, sql: &str) -> Result<Statement, Error>;
}

/// A live database session that migration steps run against.
pub trait Connection: Executor {
    type Transaction<'conn>: Transaction
    where
        Self: 'conn;

    /// Begin a transaction scoped to one migration step.
    fn begin(&mut self) -> Result<Self::Transaction<'_>, Error>;

    /// Enable or disable the session's auto-commit mode.
    ///
    /// Backends whose transactions are always explicit keep the default no-op.
    fn set_autocommit(&mut self, _enabled: bool) -> Result<(), Error> {
        Ok(())
    }
}

/// An open transaction. Dropping it without committing rolls it back.
pub trait Transaction: Executor {
    fn commit(self) -> Result<(), Error>;

    fn rollback(self) -> Result<(), Error>;
}

/// Holds a connection in manual-commit mode and restores auto-commit when released
/// or dropped.
pub(crate) struct ManualCommit<'conn, C: Connection> {
    conn: &'conn mut C,
    released: bool,
}

impl<'conn, C: Connection> ManualCommit<'conn, C> {
    pub(crate) fn enter(conn: &'conn mut C) -> Result<Self, Error> {
        conn.set_autocommit(false)?;
        Ok(Self {
            conn,
            released: false,
        })
    }

    pub(crate) fn conn(&mut self) -> &mut C {
        &mut *self.conn
    }

    /// Restore auto-commit, reporting a failure to do so.
    pub(crate) fn release(mut self) -> Result<(), Error> {
        self.released = true;
        self.conn.set_autocommit(true)
    }
}

impl<C: Connection> Drop for ManualCommit<'_, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(_error) = self.conn.set_autocommit(true) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_error, "Failed to restore auto-commit mode");
        }
    }
}
