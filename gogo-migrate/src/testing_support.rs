//! In-crate test doubles for exercising the engine without a database.

use crate::connection::{Connection, Executor, Transaction};
use crate::error::Error;
use crate::value::{Row, Statement, Value};
use std::collections::VecDeque;

/// Records every statement it is given and answers queries from a queue.
#[derive(Debug, Default)]
pub(crate) struct RecordingConnection {
    pub statements: Vec<String>,
    pub params: Vec<Vec<Value>>,
    pub autocommit_changes: Vec<bool>,
    pub fail_autocommit_restore: bool,
    pub fail_on: Option<String>,
    /// Zero-based index of the first commit that fails.
    pub fail_commit_at: Option<usize>,
    pub commits: usize,
    /// Zero-based index of the first `begin` that fails.
    pub fail_begin_at: Option<usize>,
    pub begins: usize,
    pub fail_rollback: bool,
    responses: VecDeque<Vec<Row>>,
}

impl RecordingConnection {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Default::default()
        }
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&mut self, rows: Vec<Row>) {
        self.responses.push_back(rows);
    }

    fn record(&mut self, sql: &str, params: &[Value]) -> Result<(), Error> {
        self.statements.push(sql.to_string());
        self.params.push(params.to_vec());
        match &self.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(Error::Generic(format!("rejected: {sql}")))
            }
            _ => Ok(()),
        }
    }
}

impl Executor for RecordingConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        self.record(sql, params)?;
        Ok(0)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        self.record(sql, params)?;
        Ok(self.responses.pop_front().unwrap_or_default())
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, Error> {
        self.record(sql, &[])?;
        Ok(Statement::new(sql, sql.matches('?').count()))
    }
}

impl Connection for RecordingConnection {
    type Transaction<'conn> = RecordingTransaction<'conn>;

    fn begin(&mut self) -> Result<RecordingTransaction<'_>, Error> {
        let index = self.begins;
        self.begins += 1;
        if matches!(self.fail_begin_at, Some(at) if index >= at) {
            return Err(Error::Generic("begin refused".to_string()));
        }
        self.statements.push("BEGIN".to_string());
        Ok(RecordingTransaction { conn: self })
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<(), Error> {
        self.autocommit_changes.push(enabled);
        if enabled && self.fail_autocommit_restore {
            return Err(Error::Generic("cannot restore autocommit".to_string()));
        }
        Ok(())
    }
}

pub(crate) struct RecordingTransaction<'conn> {
    conn: &'conn mut RecordingConnection,
}

impl Executor for RecordingTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        self.conn.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        self.conn.query(sql, params)
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement, Error> {
        self.conn.prepare(sql)
    }
}

impl Transaction for RecordingTransaction<'_> {
    fn commit(self) -> Result<(), Error> {
        self.conn.statements.push("COMMIT".to_string());
        let index = self.conn.commits;
        self.conn.commits += 1;
        match self.conn.fail_commit_at {
            Some(at) if index >= at => Err(Error::Generic("commit refused".to_string())),
            _ => Ok(()),
        }
    }

    fn rollback(self) -> Result<(), Error> {
        self.conn.statements.push("ROLLBACK".to_string());
        if self.conn.fail_rollback {
            return Err(Error::Generic("rollback refused".to_string()));
        }
        Ok(())
    }
}
