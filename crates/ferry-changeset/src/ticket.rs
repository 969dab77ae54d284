//! Ticket changesets: one per timeline snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ferry_core::{
  config::{IssueState, StatusMap},
  identity::{UserDirectory, UserId},
  model::Ticket,
  record::Key,
  timeline::{FieldGroup, FieldValue, Snapshot, SnapshotKind, Timeline},
};
use serde::Serialize;

use crate::{Actor, Sources, Translator, digest::ContentDigest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketChangeset {
  pub ticket:   i64,
  /// Position in the ticket's history, from 0 for the creation.
  pub sequence: usize,
  pub kind:     SnapshotKind,
  pub at:       DateTime<Utc>,
  pub actor:    Actor,
  pub comment:  Option<Key>,
  /// Set on the creation changeset only.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title:    Option<String>,
  /// Translated description or comment text.
  pub body:     Option<String>,
  /// Groups that changed, with target values. Assignees are mentions.
  pub fields:   BTreeMap<FieldGroup, Option<FieldValue>>,
  /// Issue state after this changeset, when the status changed.
  pub state:    Option<IssueState>,
  pub digest:   String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketHistory {
  pub number:      i64,
  pub title:       String,
  pub placeholder: bool,
  /// No inconsistencies were found while reconstructing.
  pub consistent:  bool,
  pub changesets:  Vec<TicketChangeset>,
}

pub(crate) fn histories(
  sources: &Sources<'_>,
  translator: &mut Translator<'_>,
) -> Vec<TicketHistory> {
  let mut timelines: Vec<&Timeline> = sources.timelines.iter().collect();
  timelines.sort_by_key(|t| t.number);
  timelines
    .into_iter()
    .filter_map(|timeline| {
      let Some(ticket) = sources.catalog.tickets.get(&timeline.number) else {
        tracing::warn!(ticket = timeline.number, "timeline without a ticket; skipping");
        return None;
      };
      Some(history(ticket, timeline, sources, translator))
    })
    .collect()
}

fn history(
  ticket: &Ticket,
  timeline: &Timeline,
  sources: &Sources<'_>,
  translator: &mut Translator<'_>,
) -> TicketHistory {
  let changesets = timeline
    .snapshots
    .iter()
    .enumerate()
    .map(|(sequence, snapshot)| {
      let owner = match &snapshot.comment {
        Some(comment) => format!("{} comment {comment}", ticket.label()),
        None => ticket.label(),
      };
      let body = snapshot
        .body
        .as_deref()
        .map(|text| translator.translate(text, &owner));
      changeset(ticket, sequence, snapshot, body, sources.users, sources.statuses)
    })
    .collect();

  TicketHistory {
    number: ticket.number,
    title: ticket.title(),
    placeholder: ticket.placeholder,
    consistent: timeline.is_consistent(),
    changesets,
  }
}

fn changeset(
  ticket: &Ticket,
  sequence: usize,
  snapshot: &Snapshot,
  body: Option<String>,
  users: &UserDirectory,
  statuses: &StatusMap,
) -> TicketChangeset {
  let fields: BTreeMap<FieldGroup, Option<FieldValue>> = snapshot
    .changes
    .iter()
    .map(|(group, value)| (group, value.map(|v| target_value(group, v, users))))
    .collect();

  let state = snapshot
    .changes
    .get(FieldGroup::Status)
    .value()
    .and_then(FieldValue::as_scalar)
    .map(|status| statuses.state_of(status));

  let title = (snapshot.kind == SnapshotKind::Creation).then(|| ticket.title());
  let actor = Actor::resolve(users, snapshot.actor.as_ref());

  let mut digest = ContentDigest::new("ticket");
  digest
    .part(ticket.number.to_le_bytes())
    .part(sequence.to_le_bytes())
    .time(snapshot.at)
    .optional(actor.id.as_ref().map(UserId::as_str))
    .optional(title.as_deref())
    .optional(body.as_deref());
  for (group, value) in &fields {
    digest
      .part(group.to_string())
      .optional(value.as_ref().map(ToString::to_string));
  }

  TicketChangeset {
    ticket: ticket.number,
    sequence,
    kind: snapshot.kind,
    at: snapshot.at,
    actor,
    comment: snapshot.comment.clone(),
    title,
    body,
    fields,
    state,
    digest: digest.finish(),
  }
}

/// Assignees become mentions; everything else is already in target form.
fn target_value(group: FieldGroup, value: &FieldValue, users: &UserDirectory) -> FieldValue {
  match (group, value) {
    (FieldGroup::Assignee, FieldValue::Scalar(id)) => {
      FieldValue::Scalar(users.mention(&UserId::new(id.as_str())))
    }
    _ => value.clone(),
  }
}
