//! A SQLite test harness for migration lists.
//!
//! The harness owns an in-memory database and the production [Migrator], moves
//! the database to any version, and offers setup and assertion helpers for
//! checking what each migration did to the schema and the data.

use crate::{Error, MigrationReport, Migrator};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A test harness for SQLite migration testing that provides state control and assertion helpers.
///
/// # Example
///
/// ```
/// use gogo_migrate::testing::SqliteTestHarness;
/// use gogo_migrate::{sql_migration, Error, Migrator, SqliteDialect};
///
/// sql_migration!(CreateUsers, "Create users",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
///     down: "DROP TABLE users"
/// );
/// sql_migration!(AddEmail, "Add email",
///     up: "ALTER TABLE users ADD COLUMN email TEXT",
///     down: "ALTER TABLE users DROP COLUMN email"
/// );
///
/// fn migrator() -> Migrator {
///     Migrator::new(
///         SqliteDialect::default(),
///         vec![Box::new(CreateUsers), Box::new(AddEmail)],
///     )
/// }
///
/// # fn main() -> Result<(), Error> {
/// let mut harness = SqliteTestHarness::new(migrator())?;
///
/// harness.migrate_to(1)?;
/// harness.execute("INSERT INTO users VALUES (1, 'alice')")?;
///
/// harness.migrate()?;
/// harness.assert_column_exists("users", "email")?;
/// let name: String = harness.query_one("SELECT name FROM users WHERE id = 1")?;
/// assert_eq!(name, "alice");
///
/// harness.rollback_to(0)?;
/// harness.assert_table_not_exists("users")?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteTestHarness {
    conn: Connection,
    migrator: Migrator,
}

/// A captured database schema for comparison and snapshotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub sql: String,
}

impl SqliteTestHarness {
    /// Create a harness over a fresh in-memory database.
    ///
    /// Pass the same migrator the application uses, so that assertions written
    /// against earlier migrations keep guarding them as the list grows.
    pub fn new(migrator: Migrator) -> Result<Self, Error> {
        Ok(Self::with_connection(Connection::open_in_memory()?, migrator))
    }

    /// Create a harness over an existing connection, e.g. a file-backed database.
    pub fn with_connection(conn: Connection, migrator: Migrator) -> Self {
        Self { conn, migrator }
    }

    pub fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    /// Apply every pending migration.
    pub fn migrate(&mut self) -> Result<MigrationReport, Error> {
        self.migrator.migrate(&mut self.conn)
    }

    /// Move the database to `target`, applying or rolling back as needed.
    pub fn migrate_to(&mut self, target: u32) -> Result<(), Error> {
        let current = self.current_version()?;
        if target > current {
            self.migrator.migrate_to(&mut self.conn, target)?;
        } else if target < current {
            self.rollback_to(target)?;
        }
        Ok(())
    }

    /// Apply exactly the next migration.
    pub fn migrate_up_one(&mut self) -> Result<(), Error> {
        let current = self.current_version()?;
        self.migrator.migrate_to(&mut self.conn, current + 1)?;
        Ok(())
    }

    /// Roll back exactly the last applied migration.
    pub fn migrate_down_one(&mut self) -> Result<(), Error> {
        self.migrator.rollback(&mut self.conn, "-1")?;
        Ok(())
    }

    pub fn rollback_to(&mut self, target: u32) -> Result<MigrationReport, Error> {
        self.migrator
            .rollback_to(&mut self.conn, crate::Destination::Absolute(target))
    }

    pub fn current_version(&mut self) -> Result<u32, Error> {
        self.migrator.current_version(&mut self.conn)
    }

    /// Execute SQL, e.g. to set up test data. Several `;`-separated statements
    /// are allowed.
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Query a single value.
    pub fn query_one<T>(&mut self, sql: &str) -> Result<T, Error>
    where
        T: rusqlite::types::FromSql,
    {
        Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
    }

    /// Query every value of a single-column result.
    pub fn query_all<T>(&mut self, sql: &str) -> Result<Vec<T>, Error>
    where
        T: rusqlite::types::FromSql,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<T>, _>>()?;
        Ok(values)
    }

    pub fn assert_table_exists(&mut self, table: &str) -> Result<(), Error> {
        if !self.has_object("table", table)? {
            return Err(Error::Generic(format!("table '{table}' does not exist")));
        }
        Ok(())
    }

    pub fn assert_table_not_exists(&mut self, table: &str) -> Result<(), Error> {
        if self.has_object("table", table)? {
            return Err(Error::Generic(format!(
                "table '{table}' exists but should not"
            )));
        }
        Ok(())
    }

    pub fn assert_column_exists(&mut self, table: &str, column: &str) -> Result<(), Error> {
        if !self.columns(table)?.iter().any(|c| c.name == column) {
            return Err(Error::Generic(format!(
                "column '{column}' does not exist in table '{table}'"
            )));
        }
        Ok(())
    }

    pub fn assert_index_exists(&mut self, index: &str) -> Result<(), Error> {
        if !self.has_object("index", index)? {
            return Err(Error::Generic(format!("index '{index}' does not exist")));
        }
        Ok(())
    }

    /// Capture the schema of every user table. The version table is left out.
    pub fn capture_schema(&mut self) -> Result<SchemaSnapshot, Error> {
        let version_table = self.migrator.version_store().table().to_string();
        let names: Vec<String> = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != ?1",
            )?
            .query_map([&version_table], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut tables = BTreeMap::new();
        for name in names {
            let schema = TableSchema {
                columns: self.columns(&name)?,
                indexes: self.indexes(&name)?,
            };
            tables.insert(name, schema);
        }
        Ok(SchemaSnapshot { tables })
    }

    /// Fail with a list of differences if the schema does not match `expected`.
    pub fn assert_schema_matches(&mut self, expected: &SchemaSnapshot) -> Result<(), Error> {
        let actual = self.capture_schema()?;
        let differences = diff_schemas(expected, &actual);
        if differences.is_empty() {
            return Ok(());
        }
        Err(Error::Generic(format!(
            "schema mismatch:\n{}",
            differences.join("\n")
        )))
    }

    /// Apply each pending migration, roll it back and check the schema returns to
    /// what it was before, then apply it again. Leaves the database fully migrated.
    pub fn assert_reversible(&mut self) -> Result<(), Error> {
        let latest = self.migrator.latest_version();
        let mut version = self.current_version()?;
        while version < latest {
            let before = self.capture_schema()?;
            self.migrate_to(version + 1)?;
            self.rollback_to(version)?;
            let after = self.capture_schema()?;
            let differences = diff_schemas(&before, &after);
            if !differences.is_empty() {
                return Err(Error::Generic(format!(
                    "rolling back version {} does not restore the schema:\n{}",
                    version + 1,
                    differences.join("\n")
                )));
            }
            self.migrate_to(version + 1)?;
            version += 1;
        }
        Ok(())
    }

    /// The underlying connection, for anything the helpers do not cover.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn has_object(&mut self, kind: &str, name: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type=?1 AND name=?2",
            [kind, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, Error> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    type_name: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT name, sql FROM sqlite_master WHERE type='index' AND tbl_name=?1 AND sql IS NOT NULL ORDER BY name",
        )?;
        let indexes = stmt
            .query_map([table], |row| {
                let sql: String = row.get(1)?;
                Ok(IndexInfo {
                    name: row.get(0)?,
                    unique: sql.to_uppercase().contains("UNIQUE"),
                    sql,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(indexes)
    }
}

fn diff_schemas(expected: &SchemaSnapshot, actual: &SchemaSnapshot) -> Vec<String> {
    let mut differences = Vec::new();
    for name in expected.tables.keys() {
        if !actual.tables.contains_key(name) {
            differences.push(format!("  - table '{name}' is missing"));
        }
    }
    for name in actual.tables.keys() {
        if !expected.tables.contains_key(name) {
            differences.push(format!("  - unexpected table '{name}'"));
        }
    }
    for (name, expected_table) in &expected.tables {
        let Some(actual_table) = actual.tables.get(name) else {
            continue;
        };
        if expected_table.columns != actual_table.columns {
            differences.push(format!(
                "  - table '{name}' columns differ:\n    expected: {:?}\n    actual:   {:?}",
                expected_table.columns, actual_table.columns
            ));
        }
        if expected_table.indexes != actual_table.indexes {
            let expected_names: Vec<_> = expected_table.indexes.iter().map(|i| &i.name).collect();
            let actual_names: Vec<_> = actual_table.indexes.iter().map(|i| &i.name).collect();
            differences.push(format!(
                "  - table '{name}' indexes differ:\n    expected: {expected_names:?}\n    actual:   {actual_names:?}"
            ));
        }
    }
    differences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FnMigration, Migration, SqliteDialect, Tx};

    fn migrator() -> Migrator {
        let migrations: Vec<Box<dyn Migration>> = vec![
            Box::new(FnMigration::new(
                |tx: &mut Tx<'_>| tx.exec_all("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"),
                |tx: &mut Tx<'_>| tx.exec_all("DROP TABLE users"),
            )),
            Box::new(FnMigration::new(
                |tx: &mut Tx<'_>| {
                    tx.exec_all(
                        "ALTER TABLE users ADD COLUMN email TEXT; CREATE UNIQUE INDEX idx_users_email ON users(email)",
                    )
                },
                |tx: &mut Tx<'_>| {
                    tx.exec_all("DROP INDEX idx_users_email; ALTER TABLE users DROP COLUMN email")
                },
            )),
        ];
        Migrator::new(SqliteDialect::default(), migrations)
    }

    #[test]
    fn migrate_to_moves_in_both_directions() {
        let mut harness = SqliteTestHarness::new(migrator()).unwrap();

        harness.migrate_to(1).unwrap();
        assert_eq!(harness.current_version().unwrap(), 1);
        harness.assert_table_exists("users").unwrap();
        assert!(harness.assert_column_exists("users", "email").is_err());

        harness.migrate_to(2).unwrap();
        harness.assert_index_exists("idx_users_email").unwrap();

        harness.migrate_to(0).unwrap();
        harness.assert_table_not_exists("users").unwrap();
        assert_eq!(harness.current_version().unwrap(), 0);
    }

    #[test]
    fn migrate_to_unknown_version_fails() {
        let mut harness = SqliteTestHarness::new(migrator()).unwrap();
        assert!(matches!(
            harness.migrate_to(3),
            Err(Error::UnknownVersion { version: 3, known: 2 })
        ));
    }

    #[test]
    fn single_steps() {
        let mut harness = SqliteTestHarness::new(migrator()).unwrap();
        harness.migrate_up_one().unwrap();
        harness.migrate_up_one().unwrap();
        assert_eq!(harness.current_version().unwrap(), 2);
        harness.migrate_down_one().unwrap();
        assert_eq!(harness.current_version().unwrap(), 1);
    }

    #[test]
    fn data_survives_later_migrations() {
        let mut harness = SqliteTestHarness::new(migrator()).unwrap();
        harness.migrate_to(1).unwrap();
        harness
            .execute("INSERT INTO users (name) VALUES ('alice'); INSERT INTO users (name) VALUES ('bob')")
            .unwrap();

        harness.migrate().unwrap();

        let names: Vec<String> = harness.query_all("SELECT name FROM users ORDER BY id").unwrap();
        assert_eq!(names, vec!["alice", "bob"]);
        let emails: i64 = harness
            .query_one("SELECT COUNT(*) FROM users WHERE email IS NULL")
            .unwrap();
        assert_eq!(emails, 2);
    }

    #[test]
    fn schema_snapshots_compare() {
        let mut harness = SqliteTestHarness::new(migrator()).unwrap();
        harness.migrate_to(1).unwrap();
        let at_one = harness.capture_schema().unwrap();
        assert_eq!(at_one.tables.len(), 1);
        assert_eq!(at_one.tables["users"].columns.len(), 2);

        harness.migrate().unwrap();
        let err = harness.assert_schema_matches(&at_one).unwrap_err();
        assert!(err.to_string().contains("table 'users' columns differ"));

        harness.migrate_to(1).unwrap();
        harness.assert_schema_matches(&at_one).unwrap();
    }

    #[test]
    fn reversible_migrations_pass() {
        let mut harness = SqliteTestHarness::new(migrator()).unwrap();
        harness.assert_reversible().unwrap();
        assert_eq!(harness.current_version().unwrap(), 2);
    }

    #[test]
    fn lossy_rollback_is_detected() {
        let migrations: Vec<Box<dyn Migration>> = vec![Box::new(FnMigration::new(
            |tx: &mut Tx<'_>| tx.exec_all("CREATE TABLE a (id INTEGER); CREATE TABLE b (id INTEGER)"),
            |tx: &mut Tx<'_>| tx.exec_all("DROP TABLE a"),
        ))];
        let mut harness =
            SqliteTestHarness::new(Migrator::new(SqliteDialect::default(), migrations)).unwrap();

        let err = harness.assert_reversible().unwrap_err();
        assert!(err.to_string().contains("unexpected table 'b'"));
    }
}
