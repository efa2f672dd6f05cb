use super::{normalize_schema, Dialect, DialectKind};
use crate::connection::Executor;
use crate::error::Error;
use crate::value::Value;

/// Standard SQL: `information_schema` lookups and `?` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnsiDialect {
    schema: Option<String>,
}

impl AnsiDialect {
    pub fn new(schema: Option<String>) -> Self {
        Self {
            schema: normalize_schema(schema),
        }
    }
}

impl Dialect for AnsiDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Ansi
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn table_exists(&self, exec: &mut dyn Executor, table: &str) -> Result<bool, Error> {
        let rows = match &self.schema {
            Some(schema) => exec.query(
                "select table_name from information_schema.tables where table_name = ? and table_schema = ?",
                &[Value::from(table), Value::from(schema.as_str())],
            )?,
            None => exec.query(
                "select table_name from information_schema.tables where table_name = ? and table_schema = current_schema",
                &[Value::from(table)],
            )?,
        };
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_support::RecordingConnection;
    use crate::Row;

    #[test]
    fn table_exists_filters_on_schema_when_configured() {
        let mut conn = RecordingConnection::default();
        conn.push_rows(vec![Row::new(vec![Value::from("versions")])]);
        let dialect = AnsiDialect::new(Some("meta".to_string()));
        assert!(dialect.table_exists(&mut conn, "versions").unwrap());
        assert!(conn.statements[0].ends_with("table_name = ? and table_schema = ?"));
        assert_eq!(
            conn.params[0],
            vec![Value::from("versions"), Value::from("meta")]
        );
    }

    #[test]
    fn table_exists_defaults_to_the_current_schema() {
        let mut conn = RecordingConnection::default();
        AnsiDialect::default()
            .table_exists(&mut conn, "versions")
            .unwrap();
        assert!(conn.statements[0].ends_with("table_name = ? and table_schema = current_schema"));
        assert_eq!(conn.params[0], vec![Value::from("versions")]);
    }

    #[test]
    fn no_rows_means_missing() {
        let mut conn = RecordingConnection::default();
        let dialect = AnsiDialect::default();
        assert!(!dialect.table_exists(&mut conn, "versions").unwrap());
    }

    #[test]
    fn query_failure_is_an_error() {
        let mut conn = RecordingConnection::failing_on("information_schema");
        let dialect = AnsiDialect::default();
        assert!(dialect.table_exists(&mut conn, "versions").is_err());
    }
}
