//! Backend-neutral parameter and result values.

use crate::error::Error;
use chrono::NaiveDateTime;

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// A single SQL parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Read the value as an integer. Text cells holding a number are accepted,
    /// since some drivers return every column as text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Read the value as a timestamp, parsing the textual forms SQLite and MySQL
    /// produce for `current_timestamp`.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(v) => Some(*v),
            Self::Text(v) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(v, format).ok()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row returned by a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn get_i64(&self, column: usize) -> Result<i64, Error> {
        let value = self.get(column).unwrap_or(&Value::Null);
        value.as_i64().ok_or_else(|| Error::ColumnType {
            column,
            expected: "integer",
            found: value.clone(),
        })
    }

    pub fn get_string(&self, column: usize) -> Result<String, Error> {
        let value = self.get(column).unwrap_or(&Value::Null);
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::ColumnType {
                column,
                expected: "text",
                found: value.clone(),
            })
    }

    pub fn get_timestamp(&self, column: usize) -> Result<NaiveDateTime, Error> {
        let value = self.get(column).unwrap_or(&Value::Null);
        value.as_timestamp().ok_or_else(|| Error::ColumnType {
            column,
            expected: "timestamp",
            found: value.clone(),
        })
    }
}

/// A statement the backend has accepted for execution.
///
/// Preparing validates the SQL against the server and reports how many
/// parameters it expects; executing it goes through [Tx::exec_statement](crate::Tx::exec_statement).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    parameter_count: usize,
}

impl Statement {
    pub fn new(sql: impl Into<String>, parameter_count: usize) -> Self {
        Self {
            sql: sql.into(),
            parameter_count,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }
}
