//! Testing utilities for migration development.

pub mod sqlite;

pub use sqlite::{ColumnInfo, IndexInfo, SchemaSnapshot, SqliteTestHarness, TableSchema};
