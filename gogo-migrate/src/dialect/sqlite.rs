use super::{normalize_schema, Dialect, DialectKind};
use crate::connection::Executor;
use crate::error::Error;
use crate::value::Value;

/// SQLite. The schema, when set, names an attached database (`main`, `temp`, or
/// an `ATTACH`ed alias) rather than a namespace inside one database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqliteDialect {
    schema: Option<String>,
}

impl SqliteDialect {
    pub fn new(schema: Option<String>) -> Self {
        Self {
            schema: normalize_schema(schema),
        }
    }
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }

    fn table_exists(&self, exec: &mut dyn Executor, table: &str) -> Result<bool, Error> {
        let sql = format!(
            "select name from {} where type = 'table' and name = ?1",
            self.qualify("sqlite_master")
        );
        let rows = exec.query(&sql, &[Value::from(table)])?;
        Ok(!rows.is_empty())
    }
}
