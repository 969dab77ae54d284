//! Error types for the ferry-markup translator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid URL rule pattern {pattern:?}: {source}")]
  InvalidUrlRule {
    pattern: String,
    #[source]
    source:  regex::Error,
  },

  #[error("invalid source host {0:?}")]
  InvalidSourceHost(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
