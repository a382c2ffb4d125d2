//! Row mapping for the two query shapes.
//!
//! Rows are read by position through [`ColumnReader`], implemented for the
//! row type of every enabled dialect. Decoding uses each driver's native
//! types, so a `boolean` column and an integer flag both read as `alive`.

use chrono::{DateTime, TimeZone, Utc};
#[cfg(any(feature = "sqlite", feature = "postgres", feature = "mysql"))]
use sqlx::Row;

use crate::error::{AdapterError, Result};
use crate::protocol::{Document, DocumentReference};

/// Column count of the change-feed query: id, updatedNanos.
pub const REFERENCE_COLUMNS: usize = 2;
/// Column count of the document query: id, updatedNanos, title, text, alive.
pub const DOCUMENT_COLUMNS: usize = 5;

/// Positional access to one result row.
pub trait ColumnReader {
    fn column_count(&self) -> usize;
    fn text(&self, index: usize) -> std::result::Result<String, sqlx::Error>;
    fn integer(&self, index: usize) -> std::result::Result<i64, sqlx::Error>;
    /// Boolean, or an integer where non-zero is true.
    fn flag(&self, index: usize) -> std::result::Result<bool, sqlx::Error>;
}

macro_rules! column_reader {
    ($row:ty) => {
        impl ColumnReader for $row {
            fn column_count(&self) -> usize {
                self.len()
            }

            fn text(&self, index: usize) -> std::result::Result<String, sqlx::Error> {
                self.try_get::<String, _>(index)
            }

            fn integer(&self, index: usize) -> std::result::Result<i64, sqlx::Error> {
                match self.try_get::<i64, _>(index) {
                    Ok(value) => Ok(value),
                    Err(err) => self
                        .try_get::<i32, _>(index)
                        .map(i64::from)
                        .map_err(|_| err),
                }
            }

            fn flag(&self, index: usize) -> std::result::Result<bool, sqlx::Error> {
                match self.try_get::<bool, _>(index) {
                    Ok(value) => Ok(value),
                    Err(err) => ColumnReader::integer(self, index)
                        .map(|value| value != 0)
                        .map_err(|_| err),
                }
            }
        }
    };
}

#[cfg(feature = "sqlite")]
column_reader!(sqlx::sqlite::SqliteRow);
#[cfg(feature = "postgres")]
column_reader!(sqlx::postgres::PgRow);
#[cfg(feature = "mysql")]
column_reader!(sqlx::mysql::MySqlRow);

/// Convert nanoseconds since the epoch.
pub fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

/// Nanoseconds since the epoch, if representable.
pub fn to_nanos(time: &DateTime<Utc>) -> Result<i64> {
    time.timestamp_nanos_opt().ok_or_else(|| {
        AdapterError::QueryBuild(format!("time {time} is out of range for nanosecond binding"))
    })
}

pub fn document_reference<R: ColumnReader>(row: &R) -> Result<DocumentReference> {
    expect_columns(row, REFERENCE_COLUMNS)?;
    Ok(DocumentReference {
        id: row.text(0).map_err(|e| decode_error("id", e))?,
        updated_at: from_nanos(row.integer(1).map_err(|e| decode_error("updatedNanos", e))?),
    })
}

pub fn document<R: ColumnReader>(row: &R) -> Result<Document> {
    expect_columns(row, DOCUMENT_COLUMNS)?;
    Ok(Document {
        id: row.text(0).map_err(|e| decode_error("id", e))?,
        updated_at: from_nanos(row.integer(1).map_err(|e| decode_error("updatedNanos", e))?),
        title: row.text(2).map_err(|e| decode_error("title", e))?,
        text: row.text(3).map_err(|e| decode_error("text", e))?,
        alive: row.flag(4).map_err(|e| decode_error("alive", e))?,
    })
}

fn expect_columns<R: ColumnReader>(row: &R, expected: usize) -> Result<()> {
    let found = row.column_count();
    if found != expected {
        return Err(AdapterError::RowDecode(format!(
            "expected {expected} columns, got {found}"
        )));
    }
    Ok(())
}

fn decode_error(column: &str, err: sqlx::Error) -> AdapterError {
    AdapterError::RowDecode(format!("column {column}: {err}"))
}
