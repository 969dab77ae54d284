//! Identity resolver: a deduplicated directory of every user the dump
//! mentions.
//!
//! Other records never hold a user directly; they store a [`UserId`] and
//! dereference it through the [`UserDirectory`], so enrichment merged in
//! later is visible everywhere at once.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
  config::IdentityConfig,
  record::{Dataset, Key, is_derived},
};

/// Fields that reference a user in any table.
pub const USER_REFERENCE_FIELDS: [&str; 5] = [
  "reporter_id",
  "assigned_to_id",
  "created_by",
  "updated_by",
  "user_id",
];

/// Optional dump table carrying descriptive user columns.
pub const USERS_TABLE: &str = "users";

// ─── Identifiers ─────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&Key> for UserId {
  fn from(key: &Key) -> Self { Self(key.to_string()) }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Descriptive identity fields, as supplied by a feed or a pinned mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityFields {
  pub login:   Option<String>,
  pub name:    Option<String>,
  pub email:   Option<String>,
  /// Handle on the target system.
  #[serde(alias = "github")]
  pub mention: Option<String>,
}

/// One externally supplied identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
  pub id:     UserId,
  #[serde(flatten)]
  pub fields: IdentityFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
  pub id:       UserId,
  pub login:    Option<String>,
  pub name:     Option<String>,
  pub email:    Option<String>,
  pub mention:  Option<String>,
  /// Tables in which this user is referenced. Diagnostics only.
  pub tables:   BTreeSet<String>,
  /// Seeded from a manual mapping.
  pub pinned:   bool,
  /// Touched by at least one external merge.
  pub enriched: bool,
}

impl User {
  fn skeleton(id: UserId) -> Self {
    Self {
      id,
      login: None,
      name: None,
      email: None,
      mention: None,
      tables: BTreeSet::new(),
      pinned: false,
      enriched: false,
    }
  }
}

/// Outcome of [`UserDirectory::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
  pub merged:              usize,
  /// Feed records naming users the dump never references.
  pub unknown:             Vec<UserId>,
  /// Redacted placeholder emails that were discarded.
  pub dropped_emails:      usize,
  /// Users no merge touched.
  pub missing_enrichment:  Vec<UserId>,
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Arena of users addressed by [`UserId`]; at most one record per id.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
  users:           BTreeMap<UserId, User>,
  redacted_emails: BTreeSet<String>,
  redacted_logins: BTreeSet<String>,
}

impl UserDirectory {
  /// Build the directory: pinned identities first, then every user reference
  /// in every non-derived table, then the descriptive columns of the optional
  /// `users` table.
  pub fn scrape(dataset: &Dataset, config: &IdentityConfig) -> Self {
    let mut dir = Self {
      users:           BTreeMap::new(),
      redacted_emails: config.redacted_emails.iter().cloned().collect(),
      redacted_logins: config.redacted_logins.iter().cloned().collect(),
    };

    for pinned in &config.pinned {
      let user = dir.ensure(pinned.id.clone());
      user.pinned = true;
      let fields = pinned.fields.clone();
      dir.fill(&pinned.id, fields);
    }

    for (table, rows) in dataset.tables() {
      if is_derived(table) {
        continue;
      }
      for row in rows {
        for field in USER_REFERENCE_FIELDS {
          if let Some(key) = row.key(field) {
            dir.ensure(UserId::from(&key)).tables.insert(table.to_string());
          }
        }
      }
    }

    for row in dataset.rows(USERS_TABLE) {
      let Some(key) = row.key("id") else { continue };
      let id = UserId::from(&key);
      dir.ensure(id.clone());
      dir.fill(&id, IdentityFields {
        login:   row.text("login"),
        name:    row.text("name"),
        email:   row.text("email"),
        mention: None,
      });
    }

    tracing::debug!(users = dir.users.len(), "scraped user directory");
    dir
  }

  /// Overlay external identity records. Only unset fields are filled, so
  /// pinned and dump-supplied values survive; redacted placeholder emails
  /// are dropped outright.
  pub fn merge<I>(&mut self, external: I) -> MergeReport
  where
    I: IntoIterator<Item = ExternalIdentity>,
  {
    let mut report = MergeReport::default();

    for record in external {
      if !self.users.contains_key(&record.id) {
        tracing::debug!(id = %record.id, "identity record for unreferenced user");
        report.unknown.push(record.id);
        continue;
      }
      let mut fields = record.fields;
      if fields
        .email
        .as_deref()
        .is_some_and(|e| self.redacted_emails.contains(e))
      {
        tracing::debug!(id = %record.id, "dropping redacted placeholder email");
        fields.email = None;
        report.dropped_emails += 1;
      }
      self.fill(&record.id, fields);
      if let Some(user) = self.users.get_mut(&record.id) {
        user.enriched = true;
      }
      report.merged += 1;
    }

    for user in self.users.values().filter(|u| !u.enriched) {
      tracing::warn!(id = %user.id, tables = ?user.tables, "user missing enrichment");
      report.missing_enrichment.push(user.id.clone());
    }
    report
  }

  fn ensure(&mut self, id: UserId) -> &mut User {
    self
      .users
      .entry(id.clone())
      .or_insert_with(|| User::skeleton(id))
  }

  fn fill(&mut self, id: &UserId, fields: IdentityFields) {
    let redacted_email = fields
      .email
      .as_deref()
      .is_some_and(|e| self.redacted_emails.contains(e));
    let Some(user) = self.users.get_mut(id) else { return };
    fill_unset(&mut user.login, fields.login);
    fill_unset(&mut user.name, fields.name);
    if !redacted_email {
      fill_unset(&mut user.email, fields.email);
    }
    fill_unset(&mut user.mention, fields.mention);
  }

  pub fn get(&self, id: &UserId) -> Option<&User> { self.users.get(id) }

  pub fn contains(&self, id: &UserId) -> bool { self.users.contains_key(id) }

  pub fn len(&self) -> usize { self.users.len() }

  pub fn is_empty(&self) -> bool { self.users.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &User> { self.users.values() }

  /// Find a user by login or display name, for audit-log values that name a
  /// user instead of carrying an id.
  pub fn find_by_handle(&self, handle: &str) -> Option<&UserId> {
    self
      .users
      .values()
      .find(|u| {
        u.login.as_deref() == Some(handle) || u.name.as_deref() == Some(handle)
      })
      .map(|u| &u.id)
  }

  /// Human-readable name: explicit name, else the raw id.
  pub fn display_name(&self, id: &UserId) -> String {
    self
      .get(id)
      .and_then(|u| u.name.clone())
      .unwrap_or_else(|| id.to_string())
  }

  /// Mention string for the target system: `@handle` from the mapped
  /// handle, else `@login` unless the login is redacted, else the name,
  /// else the raw id.
  pub fn mention(&self, id: &UserId) -> String {
    let Some(user) = self.get(id) else {
      return id.to_string();
    };
    if let Some(handle) = &user.mention {
      return format!("@{}", handle.trim_start_matches('@'));
    }
    if let Some(login) = &user.login
      && !self.redacted_logins.contains(login)
    {
      return format!("@{login}");
    }
    user.name.clone().unwrap_or_else(|| id.to_string())
  }

  pub fn email(&self, id: &UserId) -> Option<&str> {
    self.get(id).and_then(|u| u.email.as_deref())
  }
}

fn fill_unset(slot: &mut Option<String>, value: Option<String>) {
  if slot.is_none()
    && let Some(value) = value.filter(|v| !v.trim().is_empty())
  {
    *slot = Some(value);
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn dataset() -> Dataset {
    let mut data = Dataset::new();
    data.declare("tickets", vec![
      "id".into(),
      "reporter_id".into(),
      "assigned_to_id".into(),
    ]);
    data
      .push("tickets", vec![json!(1), json!("alice"), json!(null)])
      .unwrap();
    data
      .push("tickets", vec![json!(2), json!("bob"), json!("alice")])
      .unwrap();
    data.declare("ticket_comments", vec!["id".into(), "user_id".into()]);
    data
      .push("ticket_comments", vec![json!(5), json!("carol")])
      .unwrap();
    data.declare("users", vec![
      "id".into(),
      "login".into(),
      "name".into(),
      "email".into(),
    ]);
    data
      .push("users", vec![
        json!("alice"),
        json!("alice"),
        json!("Alice A."),
        json!("alice@example.com"),
      ])
      .unwrap();
    data.declare("_derived", vec!["user_id".into()]);
    data.push("_derived", vec![json!("mallory")]).unwrap();
    data
  }

  fn external(id: &str, fields: IdentityFields) -> ExternalIdentity {
    ExternalIdentity {
      id: UserId::new(id),
      fields,
    }
  }

  #[test]
  fn scrape_deduplicates_and_tracks_tables() {
    let dir = UserDirectory::scrape(&dataset(), &IdentityConfig::default());
    assert_eq!(dir.len(), 3);
    let alice = dir.get(&UserId::new("alice")).unwrap();
    assert_eq!(
      alice.tables,
      BTreeSet::from(["tickets".to_string()])
    );
    assert_eq!(alice.email.as_deref(), Some("alice@example.com"));
    assert!(!dir.contains(&UserId::new("mallory")));
  }

  #[test]
  fn placeholder_email_never_clobbers_dump_email() {
    let mut dir = UserDirectory::scrape(&dataset(), &IdentityConfig::default());
    let report = dir.merge([external("alice", IdentityFields {
      email: Some("name@domain".into()),
      mention: Some("alice-gh".into()),
      ..Default::default()
    })]);
    let alice = dir.get(&UserId::new("alice")).unwrap();
    assert_eq!(alice.email.as_deref(), Some("alice@example.com"));
    assert_eq!(alice.mention.as_deref(), Some("alice-gh"));
    assert_eq!(report.dropped_emails, 1);
  }

  #[test]
  fn placeholder_email_is_not_stored_even_when_unset() {
    let mut dir = UserDirectory::scrape(&dataset(), &IdentityConfig::default());
    dir.merge([external("bob", IdentityFields {
      email: Some("name@domain".into()),
      ..Default::default()
    })]);
    assert_eq!(dir.email(&UserId::new("bob")), None);
  }

  #[test]
  fn merge_reports_untouched_and_unknown_users() {
    let mut dir = UserDirectory::scrape(&dataset(), &IdentityConfig::default());
    let report = dir.merge([
      external("bob", IdentityFields {
        name: Some("Bob B.".into()),
        ..Default::default()
      }),
      external("zed", IdentityFields::default()),
    ]);
    assert_eq!(report.merged, 1);
    assert_eq!(report.unknown, vec![UserId::new("zed")]);
    assert_eq!(report.missing_enrichment, vec![
      UserId::new("alice"),
      UserId::new("carol")
    ]);
  }

  #[test]
  fn pinned_values_win_over_later_merges() {
    let config = IdentityConfig {
      pinned: vec![external("carol", IdentityFields {
        name: Some("Carol Pinned".into()),
        ..Default::default()
      })],
      ..Default::default()
    };
    let mut dir = UserDirectory::scrape(&dataset(), &config);
    dir.merge([external("carol", IdentityFields {
      name: Some("Carol Feed".into()),
      ..Default::default()
    })]);
    let carol = dir.get(&UserId::new("carol")).unwrap();
    assert!(carol.pinned);
    assert_eq!(carol.name.as_deref(), Some("Carol Pinned"));
    assert!(carol.tables.contains("ticket_comments"));
  }

  #[test]
  fn display_name_and_mention_fallbacks() {
    let config = IdentityConfig {
      redacted_logins: vec!["redacted".into()],
      ..Default::default()
    };
    let mut dir = UserDirectory::scrape(&dataset(), &config);
    dir.merge([
      external("bob", IdentityFields {
        login: Some("redacted".into()),
        name: Some("Bob B.".into()),
        ..Default::default()
      }),
      external("carol", IdentityFields {
        mention: Some("@carol-gh".into()),
        ..Default::default()
      }),
    ]);

    assert_eq!(dir.display_name(&UserId::new("alice")), "Alice A.");
    assert_eq!(dir.display_name(&UserId::new("carol")), "carol");
    assert_eq!(dir.mention(&UserId::new("alice")), "@alice");
    assert_eq!(dir.mention(&UserId::new("bob")), "Bob B.");
    assert_eq!(dir.mention(&UserId::new("carol")), "@carol-gh");
    assert_eq!(dir.mention(&UserId::new("nobody")), "nobody");
  }

  #[test]
  fn find_by_handle_matches_login_or_name() {
    let dir = UserDirectory::scrape(&dataset(), &IdentityConfig::default());
    assert_eq!(dir.find_by_handle("Alice A."), Some(&UserId::new("alice")));
    assert_eq!(dir.find_by_handle("alice"), Some(&UserId::new("alice")));
    assert_eq!(dir.find_by_handle("nobody"), None);
  }
}
