//! Tickets, their comments, and the field changes each comment carries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
  identity::UserId,
  record::Key,
  timeline::{
    FieldGroup, FieldValue, PLACEHOLDER_REPORTER, PLACEHOLDER_STATUS,
    PLACEHOLDER_SUMMARY, State, Tracked,
  },
};

pub const TICKETS: &str = "tickets";
pub const TICKET_COMMENTS: &str = "ticket_comments";
pub const TICKET_CHANGES: &str = "ticket_changes";
pub const TICKET_STATUSES: &str = "ticket_statuses";
pub const TICKET_TAGS: &str = "ticket_tags";
pub const TAG_NAMES: &str = "tag_names";
pub const MILESTONES: &str = "milestones";
pub const COMPONENTS: &str = "components";

/// What a [`Change`] is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChangeSubject {
  Group(FieldGroup),
  /// An audit-log subject outside the tracked groups; kept for diagnostics.
  Other(String),
}

/// One audit-log entry. Immutable once built; `before`/`after` are already
/// interpreted (ids resolved to names, priorities normalised).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
  pub id:      Key,
  pub subject: ChangeSubject,
  pub before:  Tracked<FieldValue>,
  pub after:   Tracked<FieldValue>,
  pub at:      DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
  pub id:         Key,
  pub user:       Option<UserId>,
  pub created_at: DateTime<Utc>,
  pub body:       Option<String>,
  pub changes:    Vec<Change>,
}

impl Comment {
  /// Changes touching tracked groups, in audit-log order.
  pub fn group_changes(&self) -> impl Iterator<Item = (FieldGroup, &Change)> {
    self.changes.iter().filter_map(|c| match c.subject {
      ChangeSubject::Group(g) => Some((g, c)),
      ChangeSubject::Other(_) => None,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
  /// Row id in the dump; `None` for injected placeholders.
  pub id:           Option<Key>,
  pub number:       i64,
  pub summary:      String,
  pub description:  Option<String>,
  pub reporter:     Option<UserId>,
  pub created_at:   DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  /// Present-day values of every tracked group the dump records.
  pub final_state:  State,
  /// Sorted by creation time, then id.
  pub comments:     Vec<Comment>,
  pub placeholder:  bool,
}

impl Ticket {
  /// A stand-in for a ticket number missing from the export: sentinel
  /// reporter, closed from the start, no comments.
  pub fn placeholder(number: i64, created_at: DateTime<Utc>) -> Self {
    let mut final_state = State::new();
    final_state.set(
      FieldGroup::Status,
      Tracked::Value(FieldValue::scalar(PLACEHOLDER_STATUS)),
    );
    Self {
      id: None,
      number,
      summary: PLACEHOLDER_SUMMARY.to_string(),
      description: None,
      reporter: Some(UserId::new(PLACEHOLDER_REPORTER)),
      created_at,
      completed_at: Some(created_at),
      final_state,
      comments: Vec::new(),
      placeholder: true,
    }
  }

  /// `[#<number>] - <summary>`
  pub fn title(&self) -> String {
    format!("[#{}] - {}", self.number, self.summary)
  }

  /// Human-readable owner label for diagnostics.
  pub fn label(&self) -> String { format!("ticket #{}", self.number) }
}

/// Audit-log priority names → the numeric levels tickets store.
pub fn priority_level(raw: &str) -> String {
  match raw.trim().to_ascii_lowercase().as_str() {
    "highest" => "1".to_string(),
    "high" => "2".to_string(),
    "normal" | "medium" => "3".to_string(),
    "low" => "4".to_string(),
    "lowest" => "5".to_string(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn placeholder_is_closed_and_empty() {
    let at = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
    let t = Ticket::placeholder(3, at);
    assert!(t.placeholder);
    assert!(t.comments.is_empty());
    assert_eq!(t.reporter, Some(UserId::new(PLACEHOLDER_REPORTER)));
    assert_eq!(
      t.final_state.get(FieldGroup::Status),
      Tracked::Value(FieldValue::scalar(PLACEHOLDER_STATUS))
    );
    assert_eq!(t.title(), format!("[#3] - {PLACEHOLDER_SUMMARY}"));
  }

  #[test]
  fn priority_names_normalise_to_levels() {
    assert_eq!(priority_level("High"), "2");
    assert_eq!(priority_level("3"), "3");
  }
}
