//! SQLite dialect.
//!
//! sqlite://path/to/file.db?mode=ro
//! Bound parameters are `?` or `?N`.

use super::{Dialect, DriverRegistry, PlaceholderStyle};

pub const DIALECT: Dialect = Dialect {
    name: "sqlite",
    schemes: &["sqlite"],
    placeholders: PlaceholderStyle::Question,
    line_comment: "--",
    backslash_escapes: false,
};

pub fn register(registry: &mut DriverRegistry) {
    registry.register(DIALECT);
}
