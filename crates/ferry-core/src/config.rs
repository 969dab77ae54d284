//! Configuration consumed by the core stages.
//!
//! Each struct deserialises from its own section of `ferry.toml`; every field
//! defaults to the layout of a stock tracker dump.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{identity::ExternalIdentity, timeline::PLACEHOLDER_STATUS};

// ─── Index ───────────────────────────────────────────────────────────────────

/// Which field keys each table in the [`crate::index::Index`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Key field for every table not listed in `keys`.
  pub default_key: String,
  /// Per-table key field overrides.
  pub keys:        BTreeMap<String, String>,
  /// Tables left as plain row lists.
  pub exclude:     BTreeSet<String>,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      default_key: "id".to_string(),
      keys:        BTreeMap::from([(
        "wiki_page_blobs".to_string(),
        "version_id".to_string(),
      )]),
      exclude:     [
        "merge_requests",
        "merge_request_versions",
        "merge_request_votes",
        "tickets_merge_requests",
        "test_plan_tickets",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
    }
  }
}

impl IndexConfig {
  /// The key field for `table`, or `None` when the table is excluded.
  pub fn key_for(&self, table: &str) -> Option<&str> {
    if self.exclude.contains(table) {
      return None;
    }
    Some(self.keys.get(table).unwrap_or(&self.default_key))
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
  /// Email values that stand for "redacted"; they never overwrite anything.
  pub redacted_emails: Vec<String>,
  /// Login values that stand for "redacted"; mentions fall back to the name.
  pub redacted_logins: Vec<String>,
  /// Manually pinned identities, seeded before the dump is scanned.
  pub pinned:          Vec<ExternalIdentity>,
}

impl Default for IdentityConfig {
  fn default() -> Self {
    Self {
      redacted_emails: vec!["name@domain".to_string()],
      redacted_logins: Vec::new(),
      pinned:          Vec::new(),
    }
  }
}

// ─── Statuses ────────────────────────────────────────────────────────────────

/// Target-side state of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
  Open,
  Closed,
}

/// Source status name → target issue state. Lookups ignore ASCII case.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct StatusMap(BTreeMap<String, IssueState>);

impl Default for StatusMap {
  fn default() -> Self {
    use IssueState::*;
    Self(
      [
        ("New", Open),
        ("Accepted", Open),
        ("Test", Open),
        ("Invalid", Closed),
        ("Fixed", Closed),
        ("Demo", Closed),
        ("Review / Estimation", Open),
      ]
      .into_iter()
      .map(|(name, state)| (name.to_string(), state))
      .collect(),
    )
  }
}

impl StatusMap {
  pub fn new(entries: BTreeMap<String, IssueState>) -> Self { Self(entries) }

  /// The configured state for `status`, if any. The placeholder status of
  /// injected tickets is always closed.
  pub fn get(&self, status: &str) -> Option<IssueState> {
    if status == PLACEHOLDER_STATUS {
      return Some(IssueState::Closed);
    }
    self
      .0
      .iter()
      .find(|(name, _)| name.eq_ignore_ascii_case(status))
      .map(|(_, state)| *state)
  }

  /// Like [`StatusMap::get`], defaulting unknown statuses to open.
  pub fn state_of(&self, status: &str) -> IssueState {
    self.get(status).unwrap_or_else(|| {
      tracing::warn!(status, "unmapped ticket status; treating as open");
      IssueState::Open
    })
  }

  pub fn is_closed(&self, status: &str) -> bool {
    self.get(status) == Some(IssueState::Closed)
  }
}
