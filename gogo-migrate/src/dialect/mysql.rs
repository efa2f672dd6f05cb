use super::{normalize_schema, Dialect, DialectKind};
use crate::connection::Executor;
use crate::error::Error;
use crate::value::Value;

/// MySQL / MariaDB. The schema is a database; the existence check counts rows
/// in `information_schema.tables`, and the timestamp column is a `datetime`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MysqlDialect {
    schema: Option<String>,
}

impl MysqlDialect {
    pub fn new(schema: Option<String>) -> Self {
        Self {
            schema: normalize_schema(schema),
        }
    }
}

impl Dialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn table_exists(&self, exec: &mut dyn Executor, table: &str) -> Result<bool, Error> {
        // `SHOW TABLES ... LIKE` only takes a literal, so it cannot be prepared.
        let schema = self.schema.as_deref().map_or(Value::Null, Value::from);
        let rows = exec.query(
            "select count(*) from information_schema.tables where table_schema = coalesce(?, database()) and table_name = ?",
            &[schema, Value::from(table)],
        )?;
        match rows.first() {
            Some(row) => Ok(row.get_i64(0)? > 0),
            None => Ok(false),
        }
    }

    fn create_version_table_sql(&self, table: &str) -> String {
        format!(
            "create table {} (version integer not null default 0, migration_date datetime not null, primary key(version))",
            self.qualify(table)
        )
    }

    fn pre_migrate(&self, exec: &mut dyn Executor) -> Result<(), Error> {
        if let Some(schema) = &self.schema {
            exec.execute(&format!("create database if not exists {schema}"), &[])?;
        }
        Ok(())
    }
}
