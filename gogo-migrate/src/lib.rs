#![cfg_attr(docsrs, feature(doc_cfg))]
//! `gogo-migrate` applies and rolls back numbered database migrations.
//!
//! A migration is a pair of operations, `apply` and `rollback`, that receive a
//! live transaction handle. Migrations are supplied as an ordered list and a
//! migration's version is its position in that list, starting at 1. The
//! database remembers how many migrations have been applied in a single-row
//! version table (`_gogo_migrations` unless configured otherwise).
//!
//! Each migration runs in its own transaction together with the update of the
//! version row, so a failing migration leaves the database at the last
//! version that succeeded. A migration body fails by returning an error or by
//! panicking; the `must_*` helpers on [Tx] panic on a failing statement and the
//! runner turns that panic back into an error.
//!
//! # Example
//!
//! ```
//! use gogo_migrate::{FnMigration, Migration, Migrator, SqliteDialect, Tx};
//! use rusqlite::Connection;
//!
//! let migrations: Vec<Box<dyn Migration>> = vec![
//!     Box::new(FnMigration::new(
//!         |tx: &mut Tx<'_>| tx.exec_all("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"),
//!         |tx: &mut Tx<'_>| tx.exec_all("DROP TABLE users"),
//!     )),
//!     Box::new(FnMigration::new(
//!         |tx: &mut Tx<'_>| {
//!             // Bodies get a live connection: read, transform in Rust, write back.
//!             for row in tx.query("SELECT id, name FROM users", &[])? {
//!                 let name = row.get_string(1)?.trim().to_string();
//!                 tx.exec(
//!                     "UPDATE users SET name = ?1 WHERE id = ?2",
//!                     &[name.into(), row.get_i64(0)?.into()],
//!                 )?;
//!             }
//!             Ok(())
//!         },
//!         |_: &mut Tx<'_>| Ok(()),
//!     )),
//! ];
//! let migrator = Migrator::new(SqliteDialect::default(), migrations);
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let report = migrator.migrate(&mut conn).unwrap();
//! assert_eq!(report.final_version, 2);
//!
//! // Roll back one step; "0" would roll back everything.
//! migrator.rollback(&mut conn, "-1").unwrap();
//! assert_eq!(migrator.current_version(&mut conn).unwrap(), 1);
//! ```
//!
//! # Database support
//!
//! - SQLite through `rusqlite`, with the `sqlite` feature (on by default).
//! - PostgreSQL through `postgres`, with the `postgres` feature.
//! - MySQL through `mysql`, with the `mysql` feature.
//!
//! Other drivers can be plugged in by implementing [Connection], [Transaction]
//! and [Executor]. The SQL for the version table comes from a [Dialect].
//!
//! # Features
//!
//! - `tracing` (default): spans and events for every step and statement.
//! - `testing`: [testing::SqliteTestHarness] for exercising migration lists in tests.

mod config;
pub use config::MigrateConfig;

mod connection;
pub use connection::{Connection, Executor, Transaction};

pub mod dialect;
pub use dialect::{AnsiDialect, Dialect, DialectKind, MysqlDialect, PostgresDialect, SqliteDialect};

mod error;
pub use error::{Error, TxAction};

#[macro_use]
mod macros;

mod migration;
pub use migration::{FnMigration, Migration};

mod migrator;
pub use migrator::{Destination, MigrationReport, Migrator};

mod tx;
pub use tx::{split_script, Tx};

mod value;
pub use value::{Row, Statement, Value};

mod version;
pub use version::{Bootstrap, VersionRecord, VersionStore, DEFAULT_VERSION_TABLE};

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "testing")]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

#[cfg(test)]
mod testing_support;

#[cfg(all(test, feature = "mysql"))]
mod test_mysql;
