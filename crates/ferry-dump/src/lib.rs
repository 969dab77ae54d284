//! Readers for the inputs of a ferry run.
//!
//! The dump is a line-oriented export: `table:fields, [..]` declares a
//! table's schema and `table, [..]` appends a row to it. [`load`] turns it
//! into a [`ferry_core::record::Dataset`], logging and skipping bad lines.
//! The [`feed`] module reads the optional JSON documents that enrich users
//! and supply wiki page content.
//!
//! ```no_run
//! let dump = "users:fields, [\"id\", \"login\"]\nusers, [\"u1\", \"ann\"]\n";
//! let (dataset, report) = ferry_dump::load_str(dump);
//! assert_eq!(dataset.rows("users").len(), 1);
//! assert_eq!(report.rows, 1);
//! ```

pub mod error;
pub mod feed;
mod reader;

pub use error::{Error, Result};
pub use reader::{Line, LoadReport, load, load_str, parse_line};
