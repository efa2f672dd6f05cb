use crate::dialect::{Dialect, DialectKind};
use crate::error::Error;
use crate::version::DEFAULT_VERSION_TABLE;
use serde::{Deserialize, Serialize};

/// Settings for building a [Migrator](crate::Migrator), typically read from a
/// TOML file:
///
/// ```toml
/// dialect = "postgres"          # ansi | sqlite | postgres | mysql
/// schema = "app"                # optional
/// version_table = "_gogo_migrations"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateConfig {
    #[serde(default)]
    pub dialect: DialectKind,
    /// Schema (or MySQL database, or attached SQLite database) holding the version table.
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_version_table")]
    pub version_table: String,
}

fn default_version_table() -> String {
    DEFAULT_VERSION_TABLE.to_string()
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            schema: None,
            version_table: default_version_table(),
        }
    }
}

impl MigrateConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// Build the configured dialect.
    pub fn dialect(&self) -> Box<dyn Dialect> {
        self.dialect.build(self.schema.clone())
    }
}
