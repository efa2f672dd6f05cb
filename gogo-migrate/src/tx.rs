//! The handle migration bodies receive.
//!
//! [Tx] is a thin wrapper around the step's open transaction. Every statement
//! is logged, and every failure is logged and annotated with the statement text
//! and its parameters before being returned.
//!
//! Each operation comes in two flavours:
//! - fail-soft (`exec`, `query`, `prepare`, `exec_each`, `exec_all`) returns a
//!   `Result` and leaves control flow to the caller;
//! - fail-fast (`must_exec`, `must_query`, `must_prepare`, `must_exec_each`,
//!   `must_exec_all`) panics with the annotated [Error] as payload. The migrator
//!   catches that panic at the step boundary, rolls the step back and reports the
//!   error, so a failing `must_*` call never escapes a migration run.

use crate::connection::Executor;
use crate::error::Error;
use crate::value::{Row, Statement, Value};

/// Split a script into statements on `;`.
///
/// The split is purely lexical: a `;` inside a string literal or a trigger body
/// also ends a statement. Issue such statements with [Tx::exec] instead.
pub fn split_script(script: &str) -> impl Iterator<Item = &str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
}

/// The transaction handle passed to [Migration](crate::Migration) bodies.
pub struct Tx<'t> {
    inner: &'t mut dyn Executor,
}

impl<'t> Tx<'t> {
    pub fn new(inner: &'t mut dyn Executor) -> Self {
        Self { inner }
    }

    /// The underlying executor, for statements that should bypass logging.
    pub fn executor(&mut self) -> &mut dyn Executor {
        &mut *self.inner
    }

    /// Execute a statement, returning the number of affected rows.
    pub fn exec(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, params = ?params, "Exec");
        self.inner
            .execute(sql, params)
            .map_err(|e| annotate(e, sql, params))
    }

    /// Execute a query and return its rows. No rows is an empty vector, not an error.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, params = ?params, "Query");
        self.inner
            .query(sql, params)
            .map_err(|e| annotate(e, sql, params))
    }

    pub fn prepare(&mut self, sql: &str) -> Result<Statement, Error> {
        #[cfg(feature = "tracing")]
        tracing::debug!(sql, "Prepare");
        self.inner.prepare(sql).map_err(|e| annotate(e, sql, &[]))
    }

    /// Execute a previously prepared statement.
    pub fn exec_statement(
        &mut self,
        statement: &Statement,
        params: &[Value],
    ) -> Result<u64, Error> {
        self.exec(statement.sql(), params)
    }

    /// Run a previously prepared query.
    pub fn query_statement(
        &mut self,
        statement: &Statement,
        params: &[Value],
    ) -> Result<Vec<Row>, Error> {
        self.query(statement.sql(), params)
    }

    /// Execute each statement in order, stopping at the first failure.
    pub fn exec_each(&mut self, statements: &[&str]) -> Result<(), Error> {
        for statement in statements {
            self.exec(statement, &[])?;
        }
        Ok(())
    }

    /// Execute a `;`-delimited script. See [split_script] for its limitation.
    pub fn exec_all(&mut self, script: &str) -> Result<(), Error> {
        for statement in split_script(script) {
            self.exec(statement, &[])?;
        }
        Ok(())
    }

    /// Like [Tx::exec], but aborts the migration step on failure.
    pub fn must_exec(&mut self, sql: &str, params: &[Value]) -> u64 {
        self.exec(sql, params).unwrap_or_else(|e| fail(e))
    }

    /// Like [Tx::query], but aborts the migration step on failure.
    pub fn must_query(&mut self, sql: &str, params: &[Value]) -> Vec<Row> {
        self.query(sql, params).unwrap_or_else(|e| fail(e))
    }

    /// Like [Tx::prepare], but aborts the migration step on failure.
    pub fn must_prepare(&mut self, sql: &str) -> Statement {
        self.prepare(sql).unwrap_or_else(|e| fail(e))
    }

    /// Like [Tx::exec_each], but aborts the migration step on failure.
    pub fn must_exec_each(&mut self, statements: &[&str]) {
        if let Err(e) = self.exec_each(statements) {
            fail(e)
        }
    }

    /// Like [Tx::exec_all], but aborts the migration step on failure.
    pub fn must_exec_all(&mut self, script: &str) {
        if let Err(e) = self.exec_all(script) {
            fail(e)
        }
    }
}

fn annotate(error: Error, sql: &str, params: &[Value]) -> Error {
    let error = Error::statement(error, sql, params);
    #[cfg(feature = "tracing")]
    tracing::error!(error = %error, "Statement failed");
    error
}

// The payload is recovered by the migrator's step boundary.
fn fail(error: Error) -> ! {
    std::panic::panic_any(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing_support::RecordingConnection;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn split_script_drops_empty_statements() {
        let script = "create table a (id int);\n\n  create table b (id int) ;;";
        assert_eq!(
            split_script(script).collect::<Vec<_>>(),
            vec!["create table a (id int)", "create table b (id int)"]
        );
    }

    #[test]
    fn split_script_is_lexical() {
        let script = "insert into t values ('a;b')";
        assert_eq!(
            split_script(script).collect::<Vec<_>>(),
            vec!["insert into t values ('a", "b')"]
        );
    }

    #[test]
    fn exec_wraps_errors_with_statement_and_params() {
        let mut conn = RecordingConnection::failing_on("bad");
        let mut tx = Tx::new(&mut conn);
        let err = tx.exec("bad sql", &[Value::Integer(1)]).unwrap_err();
        match err {
            Error::Statement { sql, params, .. } => {
                assert_eq!(sql, "bad sql");
                assert_eq!(params, vec![Value::Integer(1)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn exec_all_stops_at_first_failure() {
        let mut conn = RecordingConnection::failing_on("broken");
        let mut tx = Tx::new(&mut conn);
        let result = tx.exec_all("create table a (id int); broken; create table b (id int)");
        assert!(result.is_err());
        assert_eq!(
            conn.statements,
            vec!["create table a (id int)".to_string(), "broken".to_string()]
        );
    }

    #[test]
    fn exec_each_runs_in_order() {
        let mut conn = RecordingConnection::default();
        let mut tx = Tx::new(&mut conn);
        tx.exec_each(&["one", "two", "three"]).unwrap();
        assert_eq!(conn.statements, vec!["one", "two", "three"]);
    }

    #[test]
    fn must_exec_panics_with_annotated_error() {
        let mut conn = RecordingConnection::failing_on("bad");
        let payload = panic::catch_unwind(AssertUnwindSafe(|| {
            Tx::new(&mut conn).must_exec("bad", &[]);
        }))
        .unwrap_err();
        let error = payload.downcast::<Error>().unwrap();
        assert!(matches!(*error, Error::Statement { ref sql, .. } if sql == "bad"));
    }

    #[test]
    fn must_query_returns_rows_on_success() {
        let mut conn = RecordingConnection::default();
        conn.push_rows(vec![crate::Row::new(vec![Value::Integer(4)])]);
        let rows = Tx::new(&mut conn).must_query("select 4", &[]);
        assert_eq!(rows[0].get_i64(0).unwrap(), 4);
    }

    #[test]
    fn must_prepare_returns_statement() {
        let mut conn = RecordingConnection::default();
        let statement = Tx::new(&mut conn).must_prepare("select ?");
        assert_eq!(statement.sql(), "select ?");
        assert_eq!(statement.parameter_count(), 1);
    }
}
