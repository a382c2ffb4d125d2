//! Application configuration.
//!
//! Loaded from YAML files and `LRSQL`-prefixed environment variables, then
//! validated against a [`DriverRegistry`].

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::driver::{url_scheme, Dialect, DriverRegistry};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "letarette-sql.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LRSQL_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "LRSQL";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LRSQL_LOG";

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(String),

    #[error("No index space configured")]
    MissingSpace,

    #[error("No database driver configured, supported drivers: {supported}")]
    MissingDriver { supported: String },

    #[error("No such driver: \"{driver}\", supported drivers: {supported}")]
    UnsupportedDriver { driver: String, supported: String },

    #[error("No database connection configured")]
    MissingConnection,

    #[error("Connection scheme {scheme:?} is not served by driver \"{driver}\"")]
    SchemeMismatch { driver: String, scheme: String },
}

impl From<::config::ConfigError> for ConfigError {
    fn from(err: ::config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index space configuration.
    pub index: IndexConfig,
    /// Database configuration.
    pub db: DbConfig,
    /// Query template configuration.
    pub sql: SqlConfig,
}

/// Index space served by the adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub space: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            space: "docs".to_string(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Registered driver name.
    pub driver: String,
    /// Connection URL, e.g. `sqlite://docs.db?mode=ro`.
    pub connection: String,
    /// Bound on connecting and on acquiring a pooled connection.
    pub connect_timeout_secs: u64,
    /// Pool size. Driver default when unset.
    pub max_connections: Option<u32>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: String::new(),
            connection: String::new(),
            connect_timeout_secs: 10,
            max_connections: None,
        }
    }
}

impl DbConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Query template settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    /// Change-feed query file.
    pub index_sql_file: PathBuf,
    /// Document fetch query file.
    pub document_sql_file: PathBuf,
    /// Drop comment lines from both templates after loading.
    pub strip_comments: bool,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            index_sql_file: PathBuf::from("indexrequest.sql"),
            document_sql_file: PathBuf::from("documentrequest.sql"),
            strip_comments: false,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `DEFAULT_CONFIG_FILE` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, `__` separated
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the configuration against the registered drivers.
    ///
    /// Returns the dialect selected by `db.driver`.
    pub fn validate<'r>(&self, registry: &'r DriverRegistry) -> Result<&'r Dialect, ConfigError> {
        if self.index.space.trim().is_empty() {
            return Err(ConfigError::MissingSpace);
        }

        let supported = registry.supported().join(", ");
        if self.db.driver.is_empty() {
            return Err(ConfigError::MissingDriver { supported });
        }

        let dialect = registry
            .get(&self.db.driver)
            .ok_or_else(|| ConfigError::UnsupportedDriver {
                driver: self.db.driver.clone(),
                supported,
            })?;

        if self.db.connection.trim().is_empty() {
            return Err(ConfigError::MissingConnection);
        }

        if !dialect.accepts_url(&self.db.connection) {
            return Err(ConfigError::SchemeMismatch {
                driver: dialect.name.to_string(),
                scheme: url_scheme(&self.db.connection).unwrap_or_default().to_string(),
            });
        }

        Ok(dialect)
    }
}

/// Configuration keys with their defaults, for usage output.
pub fn usage_rows() -> Vec<(String, &'static str, String)> {
    let defaults = Config::default();
    let key = |path: &str| format!("{}__{}", CONFIG_ENV_PREFIX, path);
    vec![
        (LOG_ENV_VAR.to_string(), "String", "info".to_string()),
        (CONFIG_ENV_VAR.to_string(), "Path", String::new()),
        (key("INDEX__SPACE"), "String", defaults.index.space),
        (key("DB__DRIVER"), "String", String::new()),
        (key("DB__CONNECTION"), "String", String::new()),
        (
            key("DB__CONNECT_TIMEOUT_SECS"),
            "Integer",
            defaults.db.connect_timeout_secs.to_string(),
        ),
        (key("DB__MAX_CONNECTIONS"), "Integer", String::new()),
        (
            key("SQL__INDEX_SQL_FILE"),
            "Path",
            defaults.sql.index_sql_file.display().to_string(),
        ),
        (
            key("SQL__DOCUMENT_SQL_FILE"),
            "Path",
            defaults.sql.document_sql_file.display().to_string(),
        ),
        (
            key("SQL__STRIP_COMMENTS"),
            "Boolean",
            defaults.sql.strip_comments.to_string(),
        ),
    ]
}
