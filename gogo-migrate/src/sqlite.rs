//! SQLite support through `rusqlite`.
//!
//! [rusqlite::Connection] implements [Connection] and [rusqlite::Transaction]
//! implements [Transaction], so a connection can be handed straight to a
//! [Migrator](crate::Migrator). SQLite transactions are always explicit, so the
//! auto-commit toggle is a no-op here.
//!
//! # Example
//!
//! ```
//! use gogo_migrate::{sql_migration, Migration, Migrator, SqliteDialect};
//! use rusqlite::Connection;
//!
//! sql_migration!(CreateUsers, "Create users table",
//!     up: "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
//!     down: "DROP TABLE users"
//! );
//! sql_migration!(AddEmail, "Add email column",
//!     up: "ALTER TABLE users ADD COLUMN email TEXT"
//! );
//!
//! let migrations: Vec<Box<dyn Migration>> = vec![Box::new(CreateUsers), Box::new(AddEmail)];
//! let migrator = Migrator::new(SqliteDialect::default(), migrations);
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let report = migrator.migrate(&mut conn).unwrap();
//! assert_eq!(report.versions, vec![1, 2]);
//! assert_eq!(migrator.current_version(&mut conn).unwrap(), 2);
//! ```

use crate::connection::{Connection, Executor, Transaction};
use crate::error::Error;
use crate::value::{Row, Statement, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, ToSql};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(v) => ToSqlOutput::from(*v),
            Value::Real(v) => ToSqlOutput::from(*v),
            Value::Text(v) => ToSqlOutput::from(v.as_str()),
            Value::Blob(v) => ToSqlOutput::from(v.as_slice()),
            Value::Bool(v) => ToSqlOutput::from(*v),
            Value::Timestamp(v) => ToSqlOutput::from(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        })
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

// rusqlite runs statements through `&Connection`, and a transaction derefs to
// its connection, so both impls share these.
fn execute(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> Result<u64, Error> {
    let changed = conn.execute(sql, params_from_iter(params))?;
    Ok(changed as u64)
}

fn query(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns)
            .map(|i| row.get_ref(i).map(from_sqlite))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(Row::new(values));
    }
    Ok(out)
}

fn prepare(conn: &rusqlite::Connection, sql: &str) -> Result<Statement, Error> {
    let stmt = conn.prepare_cached(sql)?;
    Ok(Statement::new(sql, stmt.parameter_count()))
}

impl Executor for rusqlite::Connection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        execute(self, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        query(self, sql, params)
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, Error> {
        prepare(self, sql)
    }
}

impl Executor for rusqlite::Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        execute(self, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        query(self, sql, params)
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, Error> {
        prepare(self, sql)
    }
}

impl Connection for rusqlite::Connection {
    type Transaction<'conn> = rusqlite::Transaction<'conn>;

    fn begin(&mut self) -> Result<rusqlite::Transaction<'_>, Error> {
        Ok(self.transaction()?)
    }
}

impl Transaction for rusqlite::Transaction<'_> {
    fn commit(self) -> Result<(), Error> {
        Ok(rusqlite::Transaction::commit(self)?)
    }

    fn rollback(self) -> Result<(), Error> {
        Ok(rusqlite::Transaction::rollback(self)?)
    }
}
