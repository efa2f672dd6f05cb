//! Convenience macros for defining migrations.

/// Define a SQL-only migration.
///
/// Expands to a unit struct implementing [`Migration`](crate::Migration). Its
/// version is still its position in the list handed to the
/// [`Migrator`](crate::Migrator).
///
/// ```
/// use gogo_migrate::sql_migration;
///
/// sql_migration!(CreateUsersTable, "Create users table",
///     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
///     down: "DROP TABLE users"
/// );
/// ```
///
/// Several statements run in order; the step stops at the first failure:
///
/// ```
/// use gogo_migrate::sql_migration;
///
/// sql_migration!(InitialSchema, "Create initial schema",
///     up: [
///         "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
///         "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
///         "CREATE INDEX idx_posts_user ON posts(user_id)"
///     ],
///     down: [
///         "DROP INDEX idx_posts_user",
///         "DROP TABLE posts",
///         "DROP TABLE users"
///     ]
/// );
/// ```
///
/// Leave out `down` for a migration that cannot be rolled back. Rolling back
/// past it fails with [`Error::Irreversible`](crate::Error::Irreversible).
///
/// ```
/// use gogo_migrate::sql_migration;
///
/// sql_migration!(BackfillNames, "Backfill names",
///     up: "UPDATE users SET name = 'unknown' WHERE name IS NULL"
/// );
/// ```
///
/// For migrations that read data and transform it in Rust, implement
/// [`Migration`](crate::Migration) directly or use
/// [`FnMigration`](crate::FnMigration).
#[macro_export]
macro_rules! sql_migration {
    ($name:ident, $description:expr,
        up: [$($up_sql:expr),* $(,)?],
        down: [$($down_sql:expr),* $(,)?]
    ) => {
        $crate::__sql_migration_impl!($name, $description,
            up: [$($up_sql),*],
            down: [$($down_sql),*]
        );
    };

    ($name:ident, $description:expr,
        up: $up_sql:expr,
        down: $down_sql:expr
    ) => {
        $crate::__sql_migration_impl!($name, $description,
            up: [$up_sql],
            down: [$down_sql]
        );
    };

    ($name:ident, $description:expr,
        up: [$($up_sql:expr),* $(,)?]
    ) => {
        $crate::__sql_migration_impl!($name, $description, up: [$($up_sql),*]);
    };

    ($name:ident, $description:expr,
        up: $up_sql:expr
    ) => {
        $crate::__sql_migration_impl!($name, $description, up: [$up_sql]);
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __sql_migration_impl {
    ($name:ident, $description:expr,
        up: [$($up_sql:expr),*],
        down: [$($down_sql:expr),*]
    ) => {
        pub struct $name;

        impl $crate::Migration for $name {
            fn apply(&self, tx: &mut $crate::Tx<'_>) -> Result<(), $crate::Error> {
                tx.exec_each(&[$($up_sql),*])
            }

            fn rollback(&self, tx: &mut $crate::Tx<'_>) -> Result<(), $crate::Error> {
                tx.exec_each(&[$($down_sql),*])
            }

            fn description(&self) -> Option<&str> {
                Some($description)
            }
        }
    };

    ($name:ident, $description:expr,
        up: [$($up_sql:expr),*]
    ) => {
        pub struct $name;

        impl $crate::Migration for $name {
            fn apply(&self, tx: &mut $crate::Tx<'_>) -> Result<(), $crate::Error> {
                tx.exec_each(&[$($up_sql),*])
            }

            fn description(&self) -> Option<&str> {
                Some($description)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::Migration;

    #[test]
    fn macro_sets_description() {
        sql_migration!(CreateTest, "Create test table",
            up: "CREATE TABLE test (id INTEGER PRIMARY KEY)",
            down: "DROP TABLE test"
        );

        assert_eq!(CreateTest.description(), Some("Create test table"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn macro_migrations_apply_and_roll_back() {
        use crate::{Migrator, SqliteDialect};
        use rusqlite::Connection;

        sql_migration!(CreateUsers, "Create users",
            up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
            down: "DROP TABLE users"
        );
        sql_migration!(CreatePosts, "Create posts",
            up: [
                "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT)",
                "CREATE INDEX idx_posts_user ON posts(user_id)",
            ],
            down: [
                "DROP INDEX idx_posts_user",
                "DROP TABLE posts",
            ]
        );

        let migrator = Migrator::new(
            SqliteDialect::default(),
            vec![Box::new(CreateUsers), Box::new(CreatePosts)],
        );
        let mut conn = Connection::open_in_memory().unwrap();

        let report = migrator.migrate(&mut conn).unwrap();
        assert_eq!(report.versions, vec![1, 2]);

        let index_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name='idx_posts_user'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(index_count, 1);

        let report = migrator.rollback(&mut conn, "0").unwrap().unwrap();
        assert_eq!(report.versions, vec![2, 1]);

        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('users', 'posts')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 0);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn up_only_macro_migration_is_irreversible() {
        use crate::{Error, Migrator, SqliteDialect};
        use rusqlite::Connection;

        sql_migration!(CreateLog, "Create log",
            up: "CREATE TABLE log (line TEXT)"
        );

        let migrator = Migrator::new(SqliteDialect::default(), vec![Box::new(CreateLog)]);
        let mut conn = Connection::open_in_memory().unwrap();
        migrator.migrate(&mut conn).unwrap();

        assert!(matches!(
            migrator.rollback(&mut conn, "0"),
            Err(Error::Rollback { version: 1, .. })
        ));
    }
}
