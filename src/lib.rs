//! letarette-sql - SQL document manager
//!
//! Serves index change feeds and full documents to a search indexer from any
//! relational database, driven by two externally supplied SQL templates.

pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod handler;
pub mod manager;
pub mod protocol;
pub mod query;
pub mod utils;

pub use adapter::Adapter;
pub use config::Config;
pub use driver::DriverRegistry;
pub use error::{AdapterError, Result};
pub use handler::{AdapterState, SqlHandler};
pub use manager::{DocumentHandler, DocumentManager, ErrorHandler, RequestScope};
