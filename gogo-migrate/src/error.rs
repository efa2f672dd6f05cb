use crate::value::Value;

/// Error type for the gogo-migrate crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[cfg(feature = "mysql")]
    #[error("{0}")]
    Mysql(String),

    /// A statement failed; carries the statement text and its parameters.
    #[error("{source}: {sql} {params:?}")]
    Statement {
        source: Box<Error>,
        sql: String,
        params: Vec<Value>,
    },

    /// The version table could not be checked, created or seeded.
    #[error("bootstrapping version table {table}: {source}")]
    Bootstrap { table: String, source: Box<Error> },

    /// A migration's apply step failed.
    #[error("migrating to version {version}: {source}")]
    Apply { version: u32, source: Box<Error> },

    /// A migration's rollback step failed.
    #[error("rolling back version {version}: {source}")]
    Rollback { version: u32, source: Box<Error> },

    /// Writing the version row after a successful step failed.
    #[error("updating version to {version}: {source}")]
    VersionUpdate { version: u32, source: Box<Error> },

    /// Beginning or committing a step's transaction failed.
    #[error("{action} transaction for version {version}: {source}")]
    Transaction {
        action: TxAction,
        version: u32,
        source: Box<Error>,
    },

    #[error("invalid rollback destination {input:?}: {reason}")]
    InvalidDestination { input: String, reason: String },

    #[error("cannot roll back to negative version {destination} from current version {current}")]
    OutOfRange { destination: i64, current: u32 },

    #[error("cannot roll back: currently at version {0}")]
    NothingToRollBack(u32),

    #[error("unknown version {version}: only {known} migrations were supplied")]
    UnknownVersion { version: u32, known: usize },

    #[error("migration does not support rollback")]
    Irreversible,

    /// A migration body panicked with a message or an error of another crate.
    #[error("migration panicked: {0}")]
    Panicked(String),

    /// A migration body panicked with a payload that is neither an error nor a message.
    #[error("unexpected panic type in migration body")]
    UnexpectedPanic,

    #[error("expected {expected} in column {column}, found {found:?}")]
    ColumnType {
        column: usize,
        expected: &'static str,
        found: Value,
    },

    #[error("{0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// The migration version a step error refers to, if any.
    pub fn failed_version(&self) -> Option<u32> {
        match self {
            Self::Apply { version, .. }
            | Self::Rollback { version, .. }
            | Self::VersionUpdate { version, .. }
            | Self::Transaction { version, .. } => Some(*version),
            _ => None,
        }
    }

    pub(crate) fn statement(source: Error, sql: &str, params: &[Value]) -> Self {
        Self::Statement {
            source: Box::new(source),
            sql: sql.to_string(),
            params: params.to_vec(),
        }
    }
}

/// The transaction lifecycle operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Begin,
    Commit,
}

impl std::fmt::Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => f.write_str("starting"),
            Self::Commit => f.write_str("committing"),
        }
    }
}

#[cfg(feature = "mysql")]
impl From<mysql::Error> for Error {
    fn from(value: mysql::Error) -> Self {
        Self::Mysql(value.to_string())
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}
