//! Raw dump rows and the tables that own them.
//!
//! A [`Dataset`] is filled in dump order: a table's schema is declared once,
//! then every row of that table is zipped against it into a [`Record`].
//! Records are never deleted; typed views over them live in
//! [`crate::model`].

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// A primary or foreign key. Dumps mix integer ids and opaque string ids;
/// numeric strings are normalised to [`Key::Int`] so `"7"` and `7` resolve to
/// the same row.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum Key {
  Int(i64),
  Text(String),
}

impl Key {
  /// Interpret a JSON scalar as a key. Null, booleans, floats and empty
  /// strings are not keys.
  pub fn from_value(value: &Value) -> Option<Self> {
    match value {
      Value::Number(n) => n.as_i64().map(Key::Int),
      Value::String(s) => Self::parse(s),
      _ => None,
    }
  }

  pub fn parse(raw: &str) -> Option<Self> {
    let raw = raw.trim();
    if raw.is_empty() {
      return None;
    }
    Some(match raw.parse::<i64>() {
      Ok(n) => Key::Int(n),
      Err(_) => Key::Text(raw.to_string()),
    })
  }
}

impl fmt::Display for Key {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Key::Int(n) => write!(f, "{n}"),
      Key::Text(s) => f.write_str(s),
    }
  }
}

impl From<i64> for Key {
  fn from(n: i64) -> Self { Key::Int(n) }
}

impl From<&str> for Key {
  fn from(s: &str) -> Self {
    Key::parse(s).unwrap_or_else(|| Key::Text(String::new()))
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

static NULL: Value = Value::Null;

/// One row of a table: field name → JSON scalar.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
  fields: BTreeMap<String, Value>,
}

impl Record {
  /// Zip a row against its declared schema. The caller has already checked
  /// that the lengths agree.
  fn zip(schema: &[String], values: Vec<Value>) -> Self {
    Self {
      fields: schema.iter().cloned().zip(values).collect(),
    }
  }

  /// The raw value of `field`; absent fields read as `null`.
  pub fn value(&self, field: &str) -> &Value {
    self.fields.get(field).unwrap_or(&NULL)
  }

  pub fn has_field(&self, field: &str) -> bool {
    self.fields.contains_key(field)
  }

  pub fn key(&self, field: &str) -> Option<Key> {
    Key::from_value(self.value(field))
  }

  /// A non-blank string field, with numbers rendered as text.
  pub fn text(&self, field: &str) -> Option<String> {
    match self.value(field) {
      Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }

  pub fn int(&self, field: &str) -> Option<i64> {
    match self.value(field) {
      Value::Number(n) => n.as_i64(),
      Value::String(s) => s.trim().parse().ok(),
      Value::Bool(b) => Some(i64::from(*b)),
      _ => None,
    }
  }

  pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
    self.text(field).and_then(|s| parse_timestamp(&s))
  }

  /// Like [`Record::timestamp`], but a missing or unparseable value is an
  /// error naming `table`.
  pub fn required_timestamp(
    &self,
    table: &str,
    field: &str,
  ) -> Result<DateTime<Utc>> {
    let raw = self.text(field).ok_or_else(|| Error::MissingField {
      table: table.to_string(),
      field: field.to_string(),
    })?;
    parse_timestamp(&raw).ok_or_else(|| Error::InvalidTimestamp {
      table: table.to_string(),
      field: field.to_string(),
      value: raw,
    })
  }

  pub fn required_int(&self, table: &str, field: &str) -> Result<i64> {
    self.int(field).ok_or_else(|| Error::MissingField {
      table: table.to_string(),
      field: field.to_string(),
    })
  }

  pub fn required_key(&self, table: &str, field: &str) -> Result<Key> {
    self.key(field).ok_or_else(|| Error::MissingField {
      table: table.to_string(),
      field: field.to_string(),
    })
  }
}

/// Parse the timestamp shapes seen in tracker dumps: RFC 3339 with offset,
/// naive `T`- or space-separated date-times (taken as UTC), and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.with_timezone(&Utc));
  }
  for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
      return Some(naive.and_utc());
    }
  }
  if let Ok(with_offset) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f %z") {
    return Some(with_offset.with_timezone(&Utc));
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|naive| naive.and_utc())
}

/// Tables whose name starts with `_` are derived bookkeeping, never indexed
/// or scanned for user references.
pub fn is_derived(table: &str) -> bool { table.starts_with('_') }

// ─── Dataset ─────────────────────────────────────────────────────────────────

/// Every table of a dump: declared schemas plus rows in dump order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
  schemas: BTreeMap<String, Vec<String>>,
  tables:  BTreeMap<String, Vec<Record>>,
}

impl Dataset {
  pub fn new() -> Self { Self::default() }

  /// Declare (or re-declare) the field list for `table`. Rows already pushed
  /// keep the schema they were zipped with.
  pub fn declare(&mut self, table: &str, fields: Vec<String>) {
    if let Some(previous) = self.schemas.get(table)
      && previous != &fields
    {
      tracing::debug!(table, "schema re-declared with a different field list");
    }
    self.schemas.insert(table.to_string(), fields);
    self.tables.entry(table.to_string()).or_default();
  }

  /// Append a row to `table`, zipping it against the declared schema.
  pub fn push(&mut self, table: &str, values: Vec<Value>) -> Result<&Record> {
    let schema =
      self.schemas.get(table).ok_or_else(|| Error::UndeclaredTable {
        table: table.to_string(),
      })?;
    if schema.len() != values.len() {
      return Err(Error::FieldCount {
        table:    table.to_string(),
        expected: schema.len(),
        found:    values.len(),
      });
    }
    let record = Record::zip(schema, values);
    let rows = self.tables.entry(table.to_string()).or_default();
    rows.push(record);
    Ok(&rows[rows.len() - 1])
  }

  /// Rows of `table` in dump order; unknown tables are empty.
  pub fn rows(&self, table: &str) -> &[Record] {
    self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn has_table(&self, table: &str) -> bool {
    self.tables.contains_key(table)
  }

  pub fn tables(&self) -> impl Iterator<Item = (&str, &[Record])> {
    self
      .tables
      .iter()
      .map(|(name, rows)| (name.as_str(), rows.as_slice()))
  }

  pub fn row_count(&self) -> usize { self.tables.values().map(Vec::len).sum() }
}
