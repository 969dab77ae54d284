//! Line tokenizer and dataset loader.
//!
//! Pipeline:
//!   raw line
//!     └─ clean()       → trailing whitespace and control characters removed
//!          └─ parse_line() → Line::Schema | Line::Row
//!               └─ Loader::feed() → Dataset::declare / Dataset::push

use std::{
  borrow::Cow,
  collections::BTreeMap,
  io::BufRead,
};

use ferry_core::{Error as CoreError, record::Dataset};
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

const SCHEMA_SUFFIX: &str = ":fields";
const SCHEMA_SEPARATOR: &str = ":fields, ";
const ROW_SEPARATOR: &str = ", [";

// ─── Lines ───────────────────────────────────────────────────────────────────

/// One meaningful line of a dump.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
  Schema { table: String, fields: Vec<String> },
  Row { table: String, values: Vec<Value> },
}

/// Right-trim `raw` and drop control characters. Borrows when there was
/// nothing to drop.
fn clean(raw: &str) -> Cow<'_, str> {
  let trimmed = raw.trim_end();
  if trimmed.chars().any(char::is_control) {
    Cow::Owned(trimmed.chars().filter(|c| !c.is_control()).collect())
  } else {
    Cow::Borrowed(trimmed)
  }
}

fn malformed(line: usize, reason: impl Into<String>) -> Error {
  Error::MalformedLine {
    line,
    reason: reason.into(),
  }
}

/// Tokenize one dump line. `line` is the 1-based line number used in
/// errors. Blank lines yield `None`.
pub fn parse_line(raw: &str, line: usize) -> Result<Option<Line>> {
  let text = clean(raw);
  if text.is_empty() {
    return Ok(None);
  }
  let Some((head, _)) = text.split_once(ROW_SEPARATOR) else {
    return Err(malformed(line, "missing `, [` separator"));
  };
  // Keep the `[` that opens the JSON array.
  let json = &text[head.len() + ROW_SEPARATOR.len() - 1..];

  if let Some(table) = head.strip_suffix(SCHEMA_SUFFIX) {
    if table.contains(SCHEMA_SEPARATOR) {
      return Err(malformed(line, "more than one `:fields, ` separator"));
    }
    let table = table_name(table, line)?;
    let fields: Vec<String> = serde_json::from_str(json)
      .map_err(|source| Error::Json { line, source })?;
    return Ok(Some(Line::Schema { table, fields }));
  }

  let table = table_name(head, line)?;
  let values: Vec<Value> =
    serde_json::from_str(json).map_err(|source| Error::Json { line, source })?;
  Ok(Some(Line::Row { table, values }))
}

fn table_name(raw: &str, line: usize) -> Result<String> {
  let name = raw.trim();
  if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == ',' || c == ':') {
    return Err(malformed(line, format!("invalid table name {name:?}")));
  }
  Ok(name.to_string())
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// What happened while loading a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
  pub lines:     usize,
  pub schemas:   usize,
  pub rows:      usize,
  /// Lines that had control characters removed.
  pub sanitized: usize,
  /// Lines rejected as malformed.
  pub rejected:  usize,
  /// Tables whose rows appeared before their schema, with the number of rows
  /// skipped for each.
  pub aborted:   BTreeMap<String, usize>,
}

#[derive(Default)]
struct Loader {
  dataset: Dataset,
  report:  LoadReport,
}

impl Loader {
  fn feed(&mut self, raw: &str, line: usize) {
    self.report.lines += 1;
    let text = clean(raw);
    if let Cow::Owned(cleaned) = &text {
      self.report.sanitized += 1;
      tracing::debug!(line, text = %cleaned, "removed unprintable characters");
    }

    match parse_line(&text, line) {
      Ok(None) => {}
      Ok(Some(Line::Schema { table, fields })) => {
        if self.report.aborted.contains_key(&table) {
          tracing::warn!(line, table = %table, "schema declared after rows; table stays aborted");
        }
        tracing::debug!(line, table = %table, fields = fields.len(), "schema");
        self.dataset.declare(&table, fields);
        self.report.schemas += 1;
      }
      Ok(Some(Line::Row { table, values })) => self.push(table, values, line),
      Err(err) => {
        tracing::warn!(%err, "skipping dump line");
        self.report.rejected += 1;
      }
    }
  }

  fn push(&mut self, table: String, values: Vec<Value>, line: usize) {
    if let Some(skipped) = self.report.aborted.get_mut(&table) {
      *skipped += 1;
      return;
    }
    match self.dataset.push(&table, values) {
      Ok(_) => self.report.rows += 1,
      Err(source @ CoreError::UndeclaredTable { .. }) => {
        let err = Error::Row { line, source };
        tracing::warn!(%err, table = %table, "row before schema; skipping the rest of the table");
        self.report.aborted.insert(table, 1);
      }
      Err(source) => {
        let err = Error::Row { line, source };
        tracing::warn!(%err, "skipping dump row");
        self.report.rejected += 1;
      }
    }
  }

  fn finish(self) -> (Dataset, LoadReport) {
    for (table, skipped) in &self.report.aborted {
      tracing::warn!(table = %table, skipped, "table aborted: rows appeared before its schema");
    }
    tracing::info!(
      lines = self.report.lines,
      tables = self.dataset.tables().count(),
      rows = self.report.rows,
      rejected = self.report.rejected,
      "dump loaded"
    );
    (self.dataset, self.report)
  }
}

/// Load a whole dump. Bad lines are logged and skipped; only I/O failures
/// are errors. Invalid UTF-8 is replaced rather than rejected.
pub fn load<R: BufRead>(mut input: R) -> Result<(Dataset, LoadReport)> {
  let mut loader = Loader::default();
  let mut buf = Vec::new();
  let mut line = 0;
  loop {
    buf.clear();
    if input.read_until(b'\n', &mut buf)? == 0 {
      break;
    }
    line += 1;
    loader.feed(&String::from_utf8_lossy(&buf), line);
  }
  Ok(loader.finish())
}

/// [`load`] over an in-memory dump.
pub fn load_str(text: &str) -> (Dataset, LoadReport) {
  let mut loader = Loader::default();
  for (i, raw) in text.lines().enumerate() {
    loader.feed(raw, i + 1);
  }
  loader.finish()
}
