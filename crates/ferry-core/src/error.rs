//! Error types for `ferry-core`.

use thiserror::Error;

use crate::record::Key;

#[derive(Debug, Error)]
pub enum Error {
  #[error("table {table:?} has no declared schema")]
  UndeclaredTable { table: String },

  #[error("table {table:?}: expected {expected} fields, found {found}")]
  FieldCount {
    table:    String,
    expected: usize,
    found:    usize,
  },

  #[error("no row with key {key} in table {table:?}")]
  MissingKey { table: String, key: Key },

  #[error("table {0:?} is not indexed")]
  UnindexedTable(String),

  #[error("row in {table:?} lacks required field {field:?}")]
  MissingField { table: String, field: String },

  #[error("invalid timestamp in {table}.{field}: {value:?}")]
  InvalidTimestamp {
    table: String,
    field: String,
    value: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
