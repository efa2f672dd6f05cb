//! The version table: one row holding the number of applied migrations.

use crate::connection::Executor;
use crate::dialect::Dialect;
use crate::error::Error;
use crate::value::Value;
use chrono::NaiveDateTime;

/// The version table name used unless configured otherwise.
pub const DEFAULT_VERSION_TABLE: &str = "_gogo_migrations";

/// The persisted version row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: u32,
    pub migration_date: NaiveDateTime,
}

/// Result of looking up the current version, creating the table if needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bootstrap {
    pub version: u32,
    /// Whether this lookup created the version table.
    pub created: bool,
}

/// Reads and writes the version table through a [Dialect].
#[derive(Debug)]
pub struct VersionStore {
    dialect: Box<dyn Dialect>,
    table: String,
}

impl VersionStore {
    pub fn new(dialect: Box<dyn Dialect>, table: impl Into<String>) -> Self {
        Self {
            dialect,
            table: table.into(),
        }
    }

    /// Use `table` as the version table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the version table exists.
    pub fn exists(&self, exec: &mut dyn Executor) -> Result<bool, Error> {
        self.dialect
            .table_exists(exec, &self.table)
            .map_err(|e| self.bootstrap_error(e))
    }

    /// Return the current version, creating the table and its zero row first if
    /// the table does not exist yet.
    pub fn bootstrap(&self, exec: &mut dyn Executor) -> Result<Bootstrap, Error> {
        if self.exists(exec)? {
            return Ok(Bootstrap {
                version: self.read_version(exec)?,
                created: false,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            table = %self.dialect.qualify(&self.table),
            "Creating migration version table"
        );

        exec.execute(&self.dialect.create_version_table_sql(&self.table), &[])
            .map_err(|e| self.bootstrap_error(e))?;
        exec.execute(
            &self.dialect.insert_version_sql(&self.table),
            &[Value::Integer(0)],
        )
        .map_err(|e| self.bootstrap_error(e))?;

        Ok(Bootstrap {
            version: 0,
            created: true,
        })
    }

    /// The current version, bootstrapping the table on first use.
    /// Repeated calls never change the stored state after the first one.
    pub fn current_version(&self, exec: &mut dyn Executor) -> Result<u32, Error> {
        Ok(self.bootstrap(exec)?.version)
    }

    /// The stored version, or `None` when the table does not exist. Never creates
    /// anything.
    pub fn stored_version(&self, exec: &mut dyn Executor) -> Result<Option<u32>, Error> {
        if !self.exists(exec)? {
            return Ok(None);
        }
        self.read_version(exec).map(Some)
    }

    /// The full version row, or `None` when the table does not exist.
    pub fn record(&self, exec: &mut dyn Executor) -> Result<Option<VersionRecord>, Error> {
        if !self.exists(exec)? {
            return Ok(None);
        }
        let rows = exec.query(&self.dialect.select_record_sql(&self.table), &[])?;
        let row = rows.first().ok_or_else(|| self.missing_row())?;
        Ok(Some(VersionRecord {
            version: to_version(row.get_i64(0)?)?,
            migration_date: row.get_timestamp(1)?,
        }))
    }

    /// Set the stored version and stamp it with the current time. Runs inside the
    /// caller's transaction.
    pub fn record_version(&self, tx: &mut dyn Executor, version: u32) -> Result<(), Error> {
        tx.execute(
            &self.dialect.update_version_sql(&self.table),
            &[Value::from(version)],
        )?;
        Ok(())
    }

    fn read_version(&self, exec: &mut dyn Executor) -> Result<u32, Error> {
        let rows = exec.query(&self.dialect.select_version_sql(&self.table), &[])?;
        let row = rows.first().ok_or_else(|| self.missing_row())?;
        to_version(row.get_i64(0)?)
    }

    fn missing_row(&self) -> Error {
        Error::Generic(format!(
            "version table {} has no version row",
            self.dialect.qualify(&self.table)
        ))
    }

    pub(crate) fn bootstrap_error(&self, source: Error) -> Error {
        Error::Bootstrap {
            table: self.dialect.qualify(&self.table),
            source: Box::new(source),
        }
    }
}

fn to_version(value: i64) -> Result<u32, Error> {
    u32::try_from(value).map_err(|_| Error::Generic(format!("invalid stored version {value}")))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use rusqlite::Connection;

    fn store() -> VersionStore {
        VersionStore::new(Box::new(SqliteDialect::default()), DEFAULT_VERSION_TABLE)
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM _gogo_migrations", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn first_lookup_creates_table_at_zero() {
        let mut conn = Connection::open_in_memory().unwrap();
        let store = store();

        assert_eq!(store.stored_version(&mut conn).unwrap(), None);
        assert_eq!(
            store.bootstrap(&mut conn).unwrap(),
            Bootstrap {
                version: 0,
                created: true
            }
        );
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn current_version_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        let store = store();

        assert_eq!(store.current_version(&mut conn).unwrap(), 0);
        let before = store.record(&mut conn).unwrap().unwrap();
        assert_eq!(store.current_version(&mut conn).unwrap(), 0);
        assert_eq!(
            store.bootstrap(&mut conn).unwrap(),
            Bootstrap {
                version: 0,
                created: false
            }
        );
        assert_eq!(store.record(&mut conn).unwrap().unwrap(), before);
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn record_version_updates_the_single_row() {
        let mut conn = Connection::open_in_memory().unwrap();
        let store = store();
        store.current_version(&mut conn).unwrap();

        store.record_version(&mut conn, 4).unwrap();

        assert_eq!(store.stored_version(&mut conn).unwrap(), Some(4));
        let record = store.record(&mut conn).unwrap().unwrap();
        assert_eq!(record.version, 4);
        let age = chrono::Utc::now().naive_utc() - record.migration_date;
        assert!(age.num_seconds() < 5);
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn schema_qualified_table_in_main_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        let store = VersionStore::new(
            Box::new(SqliteDialect::new(Some("main".to_string()))),
            "versions",
        );
        assert_eq!(store.current_version(&mut conn).unwrap(), 0);
        store.record_version(&mut conn, 2).unwrap();
        let version: i64 = conn
            .query_row("SELECT version FROM main.versions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn existence_check_failure_is_a_bootstrap_error() {
        let mut conn = Connection::open_in_memory().unwrap();
        let store = VersionStore::new(
            Box::new(SqliteDialect::new(Some("missing_db".to_string()))),
            "versions",
        );
        let err = store.current_version(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Bootstrap { ref table, .. } if table == "missing_db.versions"));
    }

    #[test]
    fn empty_table_is_reported() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "create table _gogo_migrations (version integer not null default 0, migration_date timestamp not null, primary key(version))",
        )
        .unwrap();
        let err = store().current_version(&mut conn).unwrap_err();
        assert!(err.to_string().contains("has no version row"));
    }
}
