//! Database dialects and the registry of drivers the adapter may use.
//!
//! Each dialect module exposes a `register` function. Callers build a
//! [`DriverRegistry`] up front and pass it to configuration validation and
//! adapter construction; there is no process-wide driver list.

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod pool;

pub use pool::DbPool;

/// How a dialect spells bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?`, optionally numbered as `?N` (SQLite, MySQL).
    Question,
    /// `$1`, `$2`, ... (PostgreSQL).
    Dollar,
}

/// Static description of one SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Driver name used in configuration.
    pub name: &'static str,
    /// Connection URL schemes served by this driver.
    pub schemes: &'static [&'static str],
    /// Bound parameter syntax.
    pub placeholders: PlaceholderStyle,
    /// Line comment marker.
    pub line_comment: &'static str,
    /// Backslash escapes the next character inside quoted text.
    pub backslash_escapes: bool,
}

impl Dialect {
    /// Whether `connection` is a URL this dialect can open.
    pub fn accepts_url(&self, connection: &str) -> bool {
        match url_scheme(connection) {
            Some(scheme) => self.schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)),
            None => false,
        }
    }
}

/// Scheme part of a connection URL (`sqlite::memory:` -> `sqlite`).
pub fn url_scheme(connection: &str) -> Option<&str> {
    connection
        .split_once(':')
        .map(|(scheme, _)| scheme)
        .filter(|scheme| !scheme.is_empty())
}

/// Append-only set of dialects, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    dialects: Vec<Dialect>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every dialect compiled into this build.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        sqlite::register(&mut registry);
        #[cfg(feature = "postgres")]
        postgres::register(&mut registry);
        #[cfg(feature = "mysql")]
        mysql::register(&mut registry);
        registry
    }

    /// Add a dialect. Registering the same name again is a no-op.
    pub fn register(&mut self, dialect: Dialect) {
        if !self.is_supported(dialect.name) {
            self.dialects.push(dialect);
        }
    }

    pub fn is_supported(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Dialect> {
        self.dialects.iter().find(|d| d.name == name)
    }

    /// Registered driver names, in registration order.
    pub fn supported(&self) -> Vec<&'static str> {
        self.dialects.iter().map(|d| d.name).collect()
    }
}
