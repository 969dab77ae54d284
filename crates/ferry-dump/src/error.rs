//! Error types for the dump reader and feed loaders.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("line {line}: {reason}")]
  MalformedLine { line: usize, reason: String },

  #[error("line {line}: invalid JSON: {source}")]
  Json {
    line:   usize,
    #[source]
    source: serde_json::Error,
  },

  #[error("line {line}: {source}")]
  Row {
    line:   usize,
    #[source]
    source: ferry_core::Error,
  },

  #[error("invalid feed: {0}")]
  Feed(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
