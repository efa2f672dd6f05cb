use super::{normalize_schema, Dialect, DialectKind};
use crate::connection::Executor;
use crate::error::Error;
use crate::value::Value;

/// PostgreSQL: `$n` placeholders and a real schema namespace, created on demand
/// before the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostgresDialect {
    schema: Option<String>,
}

impl PostgresDialect {
    pub fn new(schema: Option<String>) -> Self {
        Self {
            schema: normalize_schema(schema),
        }
    }
}

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn table_exists(&self, exec: &mut dyn Executor, table: &str) -> Result<bool, Error> {
        let rows = match &self.schema {
            Some(schema) => exec.query(
                "select 1 from information_schema.tables where table_schema = $2 and table_name = $1",
                &[Value::from(table), Value::from(schema.as_str())],
            )?,
            None => exec.query(
                "select 1 from information_schema.tables where table_schema = current_schema() and table_name = $1",
                &[Value::from(table)],
            )?,
        };
        Ok(!rows.is_empty())
    }

    fn pre_migrate(&self, exec: &mut dyn Executor) -> Result<(), Error> {
        if let Some(schema) = &self.schema {
            exec.execute(&format!("create schema if not exists {schema}"), &[])?;
        }
        Ok(())
    }
}
