//! Typed views over indexed dump rows.
//!
//! [`Catalog::build`] enriches tables in dependency order: lookup tables
//! (statuses, milestones, tags, components), then comments and their
//! changes, then tickets, then wiki pages, then wiki revisions. Foreign keys
//! are resolved through the [`Index`]; users stay as [`UserId`] handles into
//! the [`UserDirectory`].

pub mod ticket;
pub mod wiki;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

pub use ticket::{ChangeSubject, Change, Comment, Ticket};
pub use wiki::{WikiPage, WikiPageVersion, WikiTree};

use crate::{
  error::Result,
  identity::{UserDirectory, UserId},
  index::Index,
  record::{Key, Record},
  timeline::{FieldGroup, FieldValue, State, Tracked},
};
use ticket::{
  COMPONENTS, MILESTONES, TAG_NAMES, TICKET_CHANGES, TICKET_COMMENTS,
  TICKET_STATUSES, TICKET_TAGS, TICKETS, priority_level,
};
use wiki::{WIKI_PAGE_BLOBS, WIKI_PAGE_VERSIONS, WIKI_PAGES};

/// Everything the timeline engine and changeset generator consume.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
  /// Keyed by ticket number.
  pub tickets: BTreeMap<i64, Ticket>,
  pub wiki:    WikiTree,
  /// Rows skipped because a required field was missing or malformed.
  pub skipped: usize,
}

/// Name lookups shared by final-state extraction and change interpretation.
struct Lookups<'a> {
  statuses:   BTreeMap<Key, String>,
  milestones: BTreeMap<Key, String>,
  components: BTreeMap<Key, String>,
  tags:       BTreeMap<Key, BTreeSet<String>>,
  users:      &'a UserDirectory,
}

impl Lookups<'_> {
  /// Interpret a raw audit-log value for `group`.
  fn interpret(&self, group: FieldGroup, raw: Option<String>) -> Tracked<FieldValue> {
    let Some(raw) = raw.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
    else {
      return if group.is_set_valued() {
        Tracked::Value(FieldValue::Set(BTreeSet::new()))
      } else {
        Tracked::Null
      };
    };
    let value = match group {
      FieldGroup::Status => {
        FieldValue::Scalar(name_of(&self.statuses, &raw).unwrap_or(raw))
      }
      FieldGroup::Milestone => {
        FieldValue::Scalar(name_of(&self.milestones, &raw).unwrap_or(raw))
      }
      FieldGroup::Assignee => {
        let id = UserId::new(raw.as_str());
        let resolved = if self.users.contains(&id) {
          id
        } else {
          self.users.find_by_handle(&raw).cloned().unwrap_or(id)
        };
        FieldValue::Scalar(resolved.to_string())
      }
      FieldGroup::Priority => FieldValue::Scalar(priority_level(&raw)),
      FieldGroup::Component => match name_of(&self.components, &raw) {
        Some(name) => FieldValue::set([name]),
        None => FieldValue::Set(FieldValue::parse_set(&raw)),
      },
      FieldGroup::Tags | FieldGroup::Keywords => {
        FieldValue::Set(FieldValue::parse_set(&raw))
      }
    };
    Tracked::Value(value)
  }
}

/// Resolve a raw value that may be an id into the name it stands for.
fn name_of(names: &BTreeMap<Key, String>, raw: &str) -> Option<String> {
  Key::parse(raw).and_then(|k| names.get(&k).cloned())
}

impl Catalog {
  pub fn build(index: &Index<'_>, users: &UserDirectory) -> Self {
    let data = index.dataset();
    let mut catalog = Catalog::default();

    // Lookup tables.
    let names = |table: &str, field: &str| -> BTreeMap<Key, String> {
      data
        .rows(table)
        .iter()
        .filter_map(|r| Some((r.key("id")?, r.text(field)?)))
        .collect()
    };
    let tag_names = names(TAG_NAMES, "name");
    let mut tags: BTreeMap<Key, BTreeSet<String>> = BTreeMap::new();
    for row in data.rows(TICKET_TAGS) {
      let (Some(ticket), Some(tag)) = (row.key("ticket_id"), row.key("tag_name_id"))
      else {
        continue;
      };
      match tag_names.get(&tag) {
        Some(name) => {
          tags.entry(ticket).or_default().insert(name.clone());
        }
        None => tracing::warn!(%tag, %ticket, "unresolved tag reference"),
      }
    }
    let lookups = Lookups {
      statuses: names(TICKET_STATUSES, "name"),
      milestones: names(MILESTONES, "title"),
      components: names(COMPONENTS, "name"),
      tags,
      users,
    };

    // Changes, grouped by owning comment.
    let mut changes: BTreeMap<Key, Vec<Change>> = BTreeMap::new();
    for row in data.rows(TICKET_CHANGES) {
      match build_change(row, &lookups) {
        Ok(Some((comment, change))) => {
          if index.resolve(TICKET_COMMENTS, &comment, "ticket change").is_some() {
            changes.entry(comment).or_default().push(change);
          }
        }
        Ok(None) => {}
        Err(e) => {
          tracing::warn!(error = %e, "skipping ticket change");
          catalog.skipped += 1;
        }
      }
    }

    // Comments, grouped by owning ticket id.
    let mut comments: BTreeMap<Key, Vec<Comment>> = BTreeMap::new();
    for row in data.rows(TICKET_COMMENTS) {
      match build_comment(row, &mut changes) {
        Ok((ticket, comment)) => comments.entry(ticket).or_default().push(comment),
        Err(e) => {
          tracing::warn!(error = %e, "skipping ticket comment");
          catalog.skipped += 1;
        }
      }
    }
    for orphaned in changes.keys() {
      tracing::warn!(comment = %orphaned, "changes for a comment that was skipped");
    }

    // Tickets.
    for row in data.rows(TICKETS) {
      match build_ticket(row, index, &lookups, &mut comments) {
        Ok(ticket) => {
          if let Some(previous) = catalog.tickets.insert(ticket.number, ticket) {
            tracing::warn!(number = previous.number, "duplicate ticket number; last row wins");
          }
        }
        Err(e) => {
          tracing::warn!(error = %e, "skipping ticket");
          catalog.skipped += 1;
        }
      }
    }
    for (ticket, orphans) in &comments {
      tracing::warn!(%ticket, comments = orphans.len(), "comments for an unknown ticket");
    }

    // Wiki pages, then their revisions.
    let mut pages = Vec::new();
    for row in data.rows(WIKI_PAGES) {
      match build_page(row) {
        Ok(page) => pages.push(page),
        Err(e) => {
          tracing::warn!(error = %e, "skipping wiki page");
          catalog.skipped += 1;
        }
      }
    }
    let mut versions: BTreeMap<Key, Vec<WikiPageVersion>> = BTreeMap::new();
    for row in data.rows(WIKI_PAGE_VERSIONS) {
      match build_version(row, index) {
        Ok(version) => {
          if index.resolve(WIKI_PAGES, &version.page, "wiki page version").is_some() {
            versions.entry(version.page.clone()).or_default().push(version);
          }
        }
        Err(e) => {
          tracing::warn!(error = %e, "skipping wiki page version");
          catalog.skipped += 1;
        }
      }
    }
    for page in &mut pages {
      page.versions = versions.remove(&page.id).unwrap_or_default();
    }
    catalog.wiki = WikiTree::build(pages);

    tracing::info!(
      tickets = catalog.tickets.len(),
      wiki_pages = catalog.wiki.len(),
      skipped = catalog.skipped,
      "catalog built"
    );
    catalog
  }
}

fn user_ref(row: &Record, field: &str) -> Option<UserId> {
  row.key(field).map(|k| UserId::from(&k))
}

fn build_change(
  row: &Record,
  lookups: &Lookups<'_>,
) -> Result<Option<(Key, Change)>> {
  let id = row.required_key(TICKET_CHANGES, "id")?;
  let comment = row.required_key(TICKET_CHANGES, "ticket_comment_id")?;
  let at = row.required_timestamp(TICKET_CHANGES, "created_at")?;
  let Some(subject) = row.text("subject") else {
    tracing::warn!(change = %id, "ticket change without a subject");
    return Ok(None);
  };
  let change = match FieldGroup::from_subject(&subject) {
    Some(group) => Change {
      id,
      subject: ChangeSubject::Group(group),
      before: lookups.interpret(group, row.text("before")),
      after: lookups.interpret(group, row.text("after")),
      at,
    },
    None => {
      tracing::debug!(change = %id, subject, "untracked change subject");
      Change {
        id,
        subject: ChangeSubject::Other(subject),
        before: row.text("before").map(FieldValue::Scalar).into(),
        after: row.text("after").map(FieldValue::Scalar).into(),
        at,
      }
    }
  };
  Ok(Some((comment, change)))
}

fn build_comment(
  row: &Record,
  changes: &mut BTreeMap<Key, Vec<Change>>,
) -> Result<(Key, Comment)> {
  let id = row.required_key(TICKET_COMMENTS, "id")?;
  let ticket = row.required_key(TICKET_COMMENTS, "ticket_id")?;
  let created_at = row.required_timestamp(TICKET_COMMENTS, "created_on")?;
  let mut own = changes.remove(&id).unwrap_or_default();
  own.sort_by(|a, b| a.at.cmp(&b.at).then_with(|| a.id.cmp(&b.id)));
  Ok((ticket, Comment {
    id,
    user: user_ref(row, "user_id"),
    created_at,
    body: row.text("comment").map(|b| b.trim().to_string()),
    changes: own,
  }))
}

fn build_ticket(
  row: &Record,
  index: &Index<'_>,
  lookups: &Lookups<'_>,
  comments: &mut BTreeMap<Key, Vec<Comment>>,
) -> Result<Ticket> {
  let id = row.required_key(TICKETS, "id")?;
  let number = row.required_int(TICKETS, "number")?;
  let created_at = row.required_timestamp(TICKETS, "created_on")?;
  let owner = format!("ticket #{number}");

  let mut final_state = State::new();
  let mut reference = |group: FieldGroup, field: &str, table: &str, names: &BTreeMap<Key, String>| {
    if !row.has_field(field) {
      return;
    }
    let value = match row.key(field) {
      None => Tracked::Null,
      Some(key) => {
        let name = index
          .resolve(table, &key, &owner)
          .and_then(|_| names.get(&key).cloned())
          .unwrap_or_else(|| key.to_string());
        Tracked::Value(if group.is_set_valued() {
          FieldValue::set([name])
        } else {
          FieldValue::Scalar(name)
        })
      }
    };
    let value = match value {
      Tracked::Null if group.is_set_valued() => {
        Tracked::Value(FieldValue::Set(BTreeSet::new()))
      }
      other => other,
    };
    final_state.set(group, value);
  };
  reference(FieldGroup::Status, "ticket_status_id", TICKET_STATUSES, &lookups.statuses);
  reference(FieldGroup::Milestone, "milestone_id", MILESTONES, &lookups.milestones);
  reference(FieldGroup::Component, "component_id", COMPONENTS, &lookups.components);

  if row.has_field("assigned_to_id") {
    final_state.set(
      FieldGroup::Assignee,
      user_ref(row, "assigned_to_id")
        .map(|u| FieldValue::Scalar(u.to_string()))
        .into(),
    );
  }
  if row.has_field("priority") {
    final_state.set(
      FieldGroup::Priority,
      row.text("priority").map(|p| FieldValue::Scalar(priority_level(&p))).into(),
    );
  }
  if row.has_field("keywords") {
    let keywords = row.text("keywords").unwrap_or_default();
    final_state.set(
      FieldGroup::Keywords,
      Tracked::Value(FieldValue::Set(FieldValue::parse_set(&keywords))),
    );
  }
  if index.dataset().has_table(TICKET_TAGS) {
    let tags = lookups.tags.get(&id).cloned().unwrap_or_default();
    final_state.set(FieldGroup::Tags, Tracked::Value(FieldValue::Set(tags)));
  }

  let mut own = comments.remove(&id).unwrap_or_default();
  own.sort_by(|a, b| {
    a.created_at
      .cmp(&b.created_at)
      .then_with(|| a.id.cmp(&b.id))
  });

  Ok(Ticket {
    id: Some(id),
    number,
    summary: row.text("summary").unwrap_or_default(),
    description: row.text("description"),
    reporter: user_ref(row, "reporter_id"),
    created_at,
    completed_at: row.timestamp("completed_date"),
    final_state,
    comments: own,
    placeholder: false,
  })
}

fn build_page(row: &Record) -> Result<WikiPage> {
  let id = row.required_key(WIKI_PAGES, "id")?;
  let name = row
    .text("page_name")
    .ok_or_else(|| crate::Error::MissingField {
      table: WIKI_PAGES.to_string(),
      field: "page_name".to_string(),
    })?;
  let created_at = row.required_timestamp(WIKI_PAGES, "created_at")?;
  let updated_at: DateTime<Utc> = row.timestamp("updated_at").unwrap_or(created_at);
  Ok(WikiPage {
    id,
    parent: row.key("parent_id"),
    name,
    position: row.int("position").unwrap_or(0),
    status: row.int("status").unwrap_or(wiki::ACTIVE_STATUS),
    user: user_ref(row, "user_id"),
    created_at,
    updated_at,
    contents: row.text("contents"),
    level: 0,
    children: Vec::new(),
    versions: Vec::new(),
  })
}

fn build_version(row: &Record, index: &Index<'_>) -> Result<WikiPageVersion> {
  let id = row.required_key(WIKI_PAGE_VERSIONS, "id")?;
  let page = row.required_key(WIKI_PAGE_VERSIONS, "wiki_page_id")?;
  let updated_at = row.required_timestamp(WIKI_PAGE_VERSIONS, "updated_at")?;
  let created_at = row.timestamp("created_at").unwrap_or(updated_at);
  let blob = if index.is_indexed(WIKI_PAGE_BLOBS) {
    index
      .resolve(WIKI_PAGE_BLOBS, &id, "wiki page version")
      .and_then(|b| b.key("blob_id"))
  } else {
    None
  };
  Ok(WikiPageVersion {
    id,
    page,
    version: row.int("version").unwrap_or(0),
    user: user_ref(row, "user_id"),
    contents: row.text("contents"),
    change_comment: row.text("change_comment"),
    created_at,
    updated_at,
    blob,
  })
}
