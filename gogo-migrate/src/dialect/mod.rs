//! Backend-specific SQL for the version table.
//!
//! The migrator and the [VersionStore](crate::VersionStore) only ever go through
//! the [Dialect] trait. A dialect supplies the handful of statements that differ
//! between backends: the existence check for the version table, the DDL that
//! creates it, the insert/update/select statements with the backend's placeholder
//! syntax, and the hooks that run around a migration run.

mod ansi;
mod mysql;
mod postgres;
mod sqlite;

pub use ansi::AnsiDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::connection::Executor;
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// The SQL that differs between backends.
pub trait Dialect: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> DialectKind;

    /// The schema (or attached database) the version table lives in, if any.
    fn schema(&self) -> Option<&str>;

    /// The placeholder for the 1-based parameter `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Prefix `table` with the configured schema.
    fn qualify(&self, table: &str) -> String {
        match self.schema() {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }

    /// Whether `table` exists in the configured schema. An empty result is
    /// `Ok(false)`; only a failing query is an error.
    fn table_exists(&self, exec: &mut dyn Executor, table: &str) -> Result<bool, Error>;

    fn create_version_table_sql(&self, table: &str) -> String {
        format!(
            "create table {} (version integer not null default 0, migration_date timestamp not null, primary key(version))",
            self.qualify(table)
        )
    }

    fn insert_version_sql(&self, table: &str) -> String {
        format!(
            "insert into {}(version, migration_date) values({}, current_timestamp)",
            self.qualify(table),
            self.placeholder(1)
        )
    }

    fn update_version_sql(&self, table: &str) -> String {
        format!(
            "update {} set version = {}, migration_date = current_timestamp",
            self.qualify(table),
            self.placeholder(1)
        )
    }

    fn select_version_sql(&self, table: &str) -> String {
        format!("select version from {}", self.qualify(table))
    }

    fn select_record_sql(&self, table: &str) -> String {
        format!("select version, migration_date from {}", self.qualify(table))
    }

    /// Runs before the first version lookup of a run.
    fn pre_migrate(&self, _exec: &mut dyn Executor) -> Result<(), Error> {
        Ok(())
    }

    /// Runs after a run has finished successfully.
    fn post_migrate(&self, _exec: &mut dyn Executor) -> Result<(), Error> {
        Ok(())
    }
}

/// Names a [Dialect] implementation, e.g. in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    Ansi,
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl DialectKind {
    /// Build the dialect, optionally bound to a schema.
    pub fn build(self, schema: Option<String>) -> Box<dyn Dialect> {
        match self {
            Self::Ansi => Box::new(AnsiDialect::new(schema)),
            Self::Sqlite => Box::new(SqliteDialect::new(schema)),
            Self::Postgres => Box::new(PostgresDialect::new(schema)),
            Self::Mysql => Box::new(MysqlDialect::new(schema)),
        }
    }
}

impl std::fmt::Display for DialectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ansi => "ansi",
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

// An empty schema name means "no schema".
pub(crate) fn normalize_schema(schema: Option<String>) -> Option<String> {
    schema.filter(|s| !s.trim().is_empty())
}
