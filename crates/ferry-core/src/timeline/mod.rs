//! Timeline reconstruction.
//!
//! The audit log only records forward transitions, and the dump only records
//! present-day values. [`reconstruct`] recovers each tracked group's value at
//! creation time and produces an ordered list of sparse [`Snapshot`]s whose
//! replay reproduces the final state. Disagreements between the log and the
//! final state are reported as [`Inconsistency`] values, never corrected.

pub mod gaps;
pub mod state;

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;

pub use gaps::{
  MAX_GAP, PLACEHOLDER_REPORTER, PLACEHOLDER_STATUS, PLACEHOLDER_SUMMARY, fill_gaps,
};
pub use state::{FieldGroup, FieldValue, State, Tracked};

use crate::{
  config::StatusMap,
  identity::UserId,
  model::Ticket,
  record::Key,
};

/// How far, in seconds, the recorded completion time of a closed ticket may
/// drift from the last turn that closed it before it is reported.
pub const CLOSE_TIME_SLACK_SECS: i64 = 60;

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
  Creation,
  Turn,
}

/// One step of a ticket's history. `changes` is sparse: it holds only the
/// groups that changed at this step, except for the creation snapshot, which
/// holds every group with a resolvable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
  pub kind:    SnapshotKind,
  pub at:      DateTime<Utc>,
  pub actor:   Option<UserId>,
  /// The comment this turn came from.
  pub comment: Option<Key>,
  pub body:    Option<String>,
  pub changes: State,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Inconsistency {
  /// Replaying the log ends somewhere other than the recorded final value.
  FinalMismatch {
    group:    FieldGroup,
    replayed: Option<FieldValue>,
    expected: Option<FieldValue>,
  },
  /// A change's `before` disagrees with the value the replay had reached.
  BrokenChain {
    comment:  Key,
    group:    FieldGroup,
    replayed: Option<FieldValue>,
    recorded: Option<FieldValue>,
  },
  /// The recorded completion time is far from the turn that closed the
  /// ticket.
  CloseTime {
    recorded: DateTime<Utc>,
    replayed: DateTime<Utc>,
  },
}

fn show(value: &Option<FieldValue>) -> String {
  match value {
    Some(v) => v.to_string(),
    None => "null".to_string(),
  }
}

impl fmt::Display for Inconsistency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::FinalMismatch {
        group,
        replayed,
        expected,
      } => write!(
        f,
        "{group}: log replays to {}, final value is {}",
        show(replayed),
        show(expected)
      ),
      Self::BrokenChain {
        comment,
        group,
        replayed,
        recorded,
      } => write!(
        f,
        "{group} at comment {comment}: change starts from {}, replay had {}",
        show(recorded),
        show(replayed)
      ),
      Self::CloseTime { recorded, replayed } => write!(
        f,
        "completed at {recorded}, but closed by a turn at {replayed}"
      ),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
  pub number:          i64,
  /// Creation snapshot first, then one per turn in order.
  pub snapshots:       Vec<Snapshot>,
  pub inconsistencies: Vec<Inconsistency>,
}

impl Timeline {
  pub fn initial(&self) -> Option<&Snapshot> { self.snapshots.first() }

  /// Apply every snapshot in order.
  pub fn replay(&self) -> State {
    let mut state = State::new();
    for snapshot in &self.snapshots {
      state.apply(&snapshot.changes);
    }
    state
  }

  pub fn is_consistent(&self) -> bool { self.inconsistencies.is_empty() }

  /// Groups flagged by a final-state mismatch.
  pub fn mismatched_groups(&self) -> impl Iterator<Item = FieldGroup> + '_ {
    self.inconsistencies.iter().filter_map(|i| match i {
      Inconsistency::FinalMismatch { group, .. } => Some(*group),
      _ => None,
    })
  }
}

// ─── Reconstruction ──────────────────────────────────────────────────────────

/// Rebuild the history of `ticket` from its final state and audit log.
pub fn reconstruct(ticket: &Ticket, statuses: &StatusMap) -> Timeline {
  let mut initial = State::new();
  let mut current = State::new();
  for comment in &ticket.comments {
    for (group, change) in comment.group_changes() {
      if !initial.contains(group) {
        initial.set(group, change.before.clone());
      }
      current.set(group, change.after.clone());
    }
  }

  let creation: State = FieldGroup::iter()
    .filter_map(|g| {
      let value = initial.get(g).or(current.get(g)).or(ticket.final_state.get(g));
      value.known().map(|v| (g, v))
    })
    .collect();

  let mut inconsistencies = Vec::new();
  let mut running = creation.clone();
  let mut snapshots = vec![Snapshot {
    kind:    SnapshotKind::Creation,
    at:      ticket.created_at,
    actor:   ticket.reporter.clone(),
    comment: None,
    body:    ticket.description.clone(),
    changes: creation,
  }];

  for comment in &ticket.comments {
    let start = running.clone();
    for (group, change) in comment.group_changes() {
      let reached = running.get(group);
      if !change.before.is_unset() && reached != change.before {
        inconsistencies.push(Inconsistency::BrokenChain {
          comment:  comment.id.clone(),
          group,
          replayed: reached.known().flatten(),
          recorded: change.before.clone().known().flatten(),
        });
      }
      running.set(group, change.after.clone());
    }

    let delta: State = FieldGroup::iter()
      .filter(|g| running.get(*g) != start.get(*g))
      .filter_map(|g| running.get(g).known().map(|v| (g, v)))
      .collect();
    if delta.is_empty() && comment.body.is_none() {
      continue;
    }
    snapshots.push(Snapshot {
      kind:    SnapshotKind::Turn,
      at:      comment.created_at,
      actor:   comment.user.clone(),
      comment: Some(comment.id.clone()),
      body:    comment.body.clone(),
      changes: delta,
    });
  }

  for group in FieldGroup::iter() {
    let (Some(replayed), Some(expected)) =
      (current.get(group).known(), ticket.final_state.get(group).known())
    else {
      continue;
    };
    if replayed != expected {
      inconsistencies.push(Inconsistency::FinalMismatch {
        group,
        replayed,
        expected,
      });
    }
  }

  if let Some(recorded) = ticket.completed_at
    && let Some(replayed) = last_closing_turn(&snapshots, statuses)
    && drift(recorded, replayed) > TimeDelta::seconds(CLOSE_TIME_SLACK_SECS)
  {
    inconsistencies.push(Inconsistency::CloseTime { recorded, replayed });
  }

  for inconsistency in &inconsistencies {
    tracing::warn!(
      ticket = ticket.number,
      %inconsistency,
      "audit log disagrees with recorded state"
    );
  }

  Timeline {
    number: ticket.number,
    snapshots,
    inconsistencies,
  }
}

fn drift(a: DateTime<Utc>, b: DateTime<Utc>) -> TimeDelta {
  if a > b { a - b } else { b - a }
}

/// When the last turn that moved the status into a closed state happened.
fn last_closing_turn(
  snapshots: &[Snapshot],
  statuses: &StatusMap,
) -> Option<DateTime<Utc>> {
  snapshots
    .iter()
    .filter(|s| s.kind == SnapshotKind::Turn)
    .filter(|s| {
      s.changes
        .get(FieldGroup::Status)
        .value()
        .and_then(FieldValue::as_scalar)
        .is_some_and(|status| statuses.is_closed(status))
    })
    .map(|s| s.at)
    .next_back()
}

/// Reconstruct every ticket, in number order.
pub fn reconstruct_all<'a, I>(tickets: I, statuses: &StatusMap) -> Vec<Timeline>
where
  I: IntoIterator<Item = &'a Ticket>,
{
  tickets
    .into_iter()
    .map(|ticket| reconstruct(ticket, statuses))
    .collect()
}
