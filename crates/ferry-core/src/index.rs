//! Relational index: id-keyed lookup over the tables of a [`Dataset`].
//!
//! The index stores row positions, not copies; every lookup hands back a
//! reference into the dataset it was built from.

use std::collections::{BTreeMap, HashMap};

use crate::{
  config::IndexConfig,
  error::{Error, Result},
  record::{Dataset, Key, Record, is_derived},
};

/// A table whose key column is not unique. The last row with a given key
/// wins; the rest stay reachable only through [`Dataset::rows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKeys {
  pub table:  String,
  pub unique: usize,
  pub total:  usize,
}

pub struct Index<'a> {
  dataset:    &'a Dataset,
  tables:     BTreeMap<String, HashMap<Key, usize>>,
  duplicates: Vec<DuplicateKeys>,
}

impl<'a> Index<'a> {
  /// Index every non-derived, non-excluded table of `dataset` by the key
  /// field `config` selects for it.
  pub fn build(dataset: &'a Dataset, config: &IndexConfig) -> Self {
    let mut tables = BTreeMap::new();
    let mut duplicates = Vec::new();

    for (table, rows) in dataset.tables() {
      if is_derived(table) {
        continue;
      }
      let Some(key_field) = config.key_for(table) else {
        tracing::debug!(table, rows = rows.len(), "table left unindexed");
        continue;
      };

      let mut map = HashMap::with_capacity(rows.len());
      let mut keyed = 0usize;
      for (position, row) in rows.iter().enumerate() {
        let Some(key) = row.key(key_field) else {
          tracing::warn!(
            table,
            field = key_field,
            row = position,
            "row has no usable key; not indexed"
          );
          continue;
        };
        keyed += 1;
        map.insert(key, position);
      }

      if map.len() != keyed {
        tracing::warn!(
          table,
          unique = map.len(),
          total = keyed,
          "non-unique keys; last row wins"
        );
        duplicates.push(DuplicateKeys {
          table:  table.to_string(),
          unique: map.len(),
          total:  keyed,
        });
      }
      tables.insert(table.to_string(), map);
    }

    Self {
      dataset,
      tables,
      duplicates,
    }
  }

  pub fn dataset(&self) -> &'a Dataset { self.dataset }

  pub fn duplicates(&self) -> &[DuplicateKeys] { &self.duplicates }

  pub fn is_indexed(&self, table: &str) -> bool {
    self.tables.contains_key(table)
  }

  /// Number of distinct keys in `table`.
  pub fn len(&self, table: &str) -> usize {
    self.tables.get(table).map_or(0, HashMap::len)
  }

  /// Soft lookup: `None` when the table is unindexed or the key is absent,
  /// leaving the caller to pick its default.
  pub fn get(&self, table: &str, key: &Key) -> Option<&'a Record> {
    let position = *self.tables.get(table)?.get(key)?;
    self.dataset.rows(table).get(position)
  }

  /// Hard lookup: the key must exist.
  pub fn find(&self, table: &str, key: &Key) -> Result<&'a Record> {
    let map = self
      .tables
      .get(table)
      .ok_or_else(|| Error::UnindexedTable(table.to_string()))?;
    map
      .get(key)
      .and_then(|&position| self.dataset.rows(table).get(position))
      .ok_or_else(|| Error::MissingKey {
        table: table.to_string(),
        key:   key.clone(),
      })
  }

  /// Foreign-key resolution: like [`Index::get`], but a dangling reference is
  /// reported as a warning naming `owner`.
  pub fn resolve(
    &self,
    table: &str,
    key: &Key,
    owner: &str,
  ) -> Option<&'a Record> {
    let found = self.get(table, key);
    if found.is_none() {
      tracing::warn!(table, %key, owner, "unresolved reference");
    }
    found
  }
}
