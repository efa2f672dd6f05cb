//! Migrate a SQLite database at application startup.
//!
//! ```sh
//! cargo run --example sqlite_basic -- app.db        # migrate to the latest version
//! cargo run --example sqlite_basic -- app.db -1     # then roll back one step
//! ```

use gogo_migrate::{sql_migration, Error, FnMigration, Migration, Migrator, SqliteDialect, Tx};
use rusqlite::Connection;

sql_migration!(CreateUsers, "Create users table",
    up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    down: "DROP TABLE users"
);

sql_migration!(CreatePosts, "Create posts table",
    up: [
        "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, title TEXT)",
        "CREATE INDEX idx_posts_user ON posts(user_id)"
    ],
    down: [
        "DROP INDEX idx_posts_user",
        "DROP TABLE posts"
    ]
);

fn migrator() -> Migrator {
    let migrations: Vec<Box<dyn Migration>> = vec![
        Box::new(CreateUsers),
        Box::new(CreatePosts),
        Box::new(
            FnMigration::new(
                |tx: &mut Tx<'_>| {
                    tx.must_exec("ALTER TABLE users ADD COLUMN display_name TEXT", &[]);
                    for row in tx.must_query("SELECT id, name FROM users", &[]) {
                        let display = row.get_string(1)?.to_uppercase();
                        tx.must_exec(
                            "UPDATE users SET display_name = ?1 WHERE id = ?2",
                            &[display.into(), row.get_i64(0)?.into()],
                        );
                    }
                    Ok(())
                },
                |tx: &mut Tx<'_>| tx.exec_all("ALTER TABLE users DROP COLUMN display_name"),
            )
            .with_description("Backfill display names"),
        ),
    ];
    Migrator::new(SqliteDialect::default(), migrations)
}

fn main() -> Result<(), Error> {
    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| ":memory:".to_string());
    let destination = args.next().unwrap_or_default();

    let mut conn = Connection::open(&path)?;
    let migrator = migrator();

    let report = migrator.migrate(&mut conn)?;
    println!(
        "{path}: version {} -> {} (applied {:?})",
        report.starting_version, report.final_version, report.versions
    );

    if let Some(report) = migrator.rollback(&mut conn, &destination)? {
        println!(
            "{path}: rolled back {:?}, now at version {}",
            report.versions, report.final_version
        );
    }
    Ok(())
}
