//! Tracked field groups and the tri-state values the reconstruction engine
//! folds over.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

// ─── Field groups ────────────────────────────────────────────────────────────

/// A ticket attribute whose history the audit log records.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldGroup {
  Status,
  Milestone,
  Assignee,
  Priority,
  Tags,
  Keywords,
  Component,
}

impl FieldGroup {
  /// Set-valued groups record full replacement sets per change.
  pub fn is_set_valued(self) -> bool {
    matches!(self, Self::Tags | Self::Keywords | Self::Component)
  }

  /// Map an audit-log `subject` to the group it changes.
  pub fn from_subject(subject: &str) -> Option<Self> {
    match subject.trim().to_ascii_lowercase().as_str() {
      "status" | "ticket_status_id" => Some(Self::Status),
      "milestone" | "milestone_id" => Some(Self::Milestone),
      "assignee" | "assigned_to_id" | "assigned_to" => Some(Self::Assignee),
      "priority" => Some(Self::Priority),
      "tags" | "tag" => Some(Self::Tags),
      "keywords" => Some(Self::Keywords),
      "component" | "component_id" => Some(Self::Component),
      _ => None,
    }
  }
}

// ─── Values ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Scalar(String),
  Set(BTreeSet<String>),
}

impl FieldValue {
  pub fn scalar(value: impl Into<String>) -> Self { Self::Scalar(value.into()) }

  pub fn set<I, S>(items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::Set(items.into_iter().map(Into::into).collect())
  }

  /// Split an audit-log set value (`"a, b,c"`) into its members.
  pub fn parse_set(raw: &str) -> BTreeSet<String> {
    raw
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(String::from)
      .collect()
  }

  pub fn as_scalar(&self) -> Option<&str> {
    match self {
      Self::Scalar(s) => Some(s),
      Self::Set(_) => None,
    }
  }
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Scalar(s) => f.write_str(s),
      Self::Set(items) => {
        let joined: Vec<&str> = items.iter().map(String::as_str).collect();
        write!(f, "{{{}}}", joined.join(", "))
      }
    }
  }
}

// ─── Tracked ─────────────────────────────────────────────────────────────────

/// "No evidence yet" is distinct from "legitimately null".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tracked<T> {
  #[default]
  Unset,
  Null,
  Value(T),
}

impl<T> Tracked<T> {
  pub fn is_unset(&self) -> bool { matches!(self, Self::Unset) }

  /// Keep `self` unless it is [`Tracked::Unset`].
  pub fn or(self, fallback: Self) -> Self {
    match self {
      Self::Unset => fallback,
      known => known,
    }
  }

  /// `None` for unset, `Some(None)` for null.
  pub fn known(self) -> Option<Option<T>> {
    match self {
      Self::Unset => None,
      Self::Null => Some(None),
      Self::Value(v) => Some(Some(v)),
    }
  }

  pub fn value(&self) -> Option<&T> {
    match self {
      Self::Value(v) => Some(v),
      _ => None,
    }
  }
}

impl<T> From<Option<T>> for Tracked<T> {
  fn from(value: Option<T>) -> Self {
    match value {
      Some(v) => Self::Value(v),
      None => Self::Null,
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// A full or sparse set of known field values. Absent groups are unset;
/// present-but-`None` groups are null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(BTreeMap<FieldGroup, Option<FieldValue>>);

impl State {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, group: FieldGroup) -> Tracked<FieldValue> {
    match self.0.get(&group) {
      None => Tracked::Unset,
      Some(value) => value.clone().into(),
    }
  }

  /// Record a value; [`Tracked::Unset`] removes the group.
  pub fn set(&mut self, group: FieldGroup, value: Tracked<FieldValue>) {
    match value.known() {
      None => {
        self.0.remove(&group);
      }
      Some(known) => {
        self.0.insert(group, known);
      }
    }
  }

  /// Overlay every group known in `delta`.
  pub fn apply(&mut self, delta: &State) {
    for (group, value) in &delta.0 {
      self.0.insert(*group, value.clone());
    }
  }

  pub fn contains(&self, group: FieldGroup) -> bool {
    self.0.contains_key(&group)
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn iter(
    &self,
  ) -> impl Iterator<Item = (FieldGroup, Option<&FieldValue>)> {
    self.0.iter().map(|(g, v)| (*g, v.as_ref()))
  }
}

impl FromIterator<(FieldGroup, Option<FieldValue>)> for State {
  fn from_iter<I>(iter: I) -> Self
  where
    I: IntoIterator<Item = (FieldGroup, Option<FieldValue>)>,
  {
    Self(iter.into_iter().collect())
  }
}
