//! `quarry.toml` configuration.
//!
//! ```toml
//! [database]
//! url = "postgres://localhost/app"
//! dialect = "postgres"   # optional, otherwise taken from the URL scheme
//!
//! [query]
//! case_insensitive_fields = false
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{QueryError, QueryResult};
use crate::transpiler::Dialect;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "quarry.toml";

/// Environment variable overriding `database.url`.
pub const DATABASE_URL_ENV: &str = "QUARRY_DATABASE_URL";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,

    /// Dialect, when the URL scheme does not say
    pub dialect: Option<Dialect>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct QueryConfig {
    /// Match result columns to fields ignoring case
    #[serde(default)]
    pub case_insensitive_fields: bool,
}

impl Config {
    /// Load from the working directory, then the user config directory;
    /// defaults when neither has a file. The environment URL wins.
    pub fn load() -> QueryResult<Self> {
        let mut config = match Self::locate() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.database.url = Some(url);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> QueryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| QueryError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn parse(content: &str) -> QueryResult<Self> {
        toml::from_str(content).map_err(|e| QueryError::Config(e.to_string()))
    }

    /// First existing configuration file.
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("quarry").join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    /// Dialect to compile for: the configured one, else the URL's, else the default.
    pub fn dialect(&self) -> Dialect {
        self.database
            .dialect
            .or_else(|| self.database.url.as_deref().and_then(Dialect::from_url))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
            [database]
            url = "mysql://root@localhost/app"
            dialect = "mysql"

            [query]
            case_insensitive_fields = true
            "#,
        )
        .unwrap();
        assert_eq!(config.database.url.as_deref(), Some("mysql://root@localhost/app"));
        assert_eq!(config.dialect(), Dialect::MySQL);
        assert!(config.query.case_insensitive_fields);
    }

    #[test]
    fn test_dialect_from_url() {
        let config = Config::parse("[database]\nurl = \"sqlite::memory:\"\n").unwrap();
        assert_eq!(config.dialect(), Dialect::SQLite);
        assert!(!config.query.case_insensitive_fields);
        assert_eq!(Config::default().dialect(), Dialect::Postgres);
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(Config::parse("[database]\ndialect = \"oracle\"\n"), Err(QueryError::Config(_))));
        assert!(matches!(Config::parse("database = 3"), Err(QueryError::Config(_))));
    }
}
