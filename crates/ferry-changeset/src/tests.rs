//! End-to-end generation over a small hand-built catalog.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use ferry_core::{
  config::{IdentityConfig, IssueState, StatusMap},
  identity::{UserDirectory, UserId},
  model::{
    Catalog, Change, ChangeSubject, Comment, Ticket, WikiPage, WikiPageVersion,
    WikiTree, wiki::ACTIVE_STATUS,
  },
  record::{Dataset, Key},
  timeline::{FieldGroup, FieldValue, SnapshotKind, State, Tracked, fill_gaps, reconstruct_all},
};
use ferry_markup::{DiagnosticKind, MarkupConfig};
use serde_json::json;

use crate::{
  NO_EMAIL, Plan, Sources, UNKNOWN_ACTOR, WikiChangeKind, WikiConfig, generate, wiki::sidebar,
};

fn at(day: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2012, 3, day, 12, 0, 0).unwrap()
}

fn users() -> UserDirectory {
  let mut data = Dataset::new();
  data.declare("users", vec!["id".into(), "login".into(), "name".into(), "email".into()]);
  data
    .push("users", vec![json!("u1"), json!("ann"), json!("Ann"), json!("ann@example.com")])
    .unwrap();
  data
    .push("users", vec![json!("u2"), json!("bob"), json!("Bob"), json!(null)])
    .unwrap();
  UserDirectory::scrape(&data, &IdentityConfig::default())
}

fn scalar(value: &str) -> Tracked<FieldValue> {
  Tracked::Value(FieldValue::scalar(value))
}

fn ticket(number: i64, summary: &str, description: &str) -> Ticket {
  Ticket {
    id:           Some(Key::Int(100 + number)),
    number,
    summary:      summary.to_string(),
    description:  Some(description.to_string()),
    reporter:     Some(UserId::new("u1")),
    created_at:   at(1),
    completed_at: None,
    final_state:  State::new(),
    comments:     Vec::new(),
    placeholder:  false,
  }
}

fn tickets() -> BTreeMap<i64, Ticket> {
  let mut crash = ticket(1, "Crash", "h2. Crash\nSee [[Home|Start]]");
  crash.final_state.set(FieldGroup::Status, scalar("Fixed"));
  crash.final_state.set(FieldGroup::Assignee, scalar("u2"));
  crash.completed_at = Some(at(5));
  crash.comments.push(Comment {
    id:         Key::Int(900),
    user:       Some(UserId::new("u2")),
    created_at: at(5),
    body:       Some("@make@ fails".to_string()),
    changes:    vec![
      Change {
        id:      Key::Int(1),
        subject: ChangeSubject::Group(FieldGroup::Status),
        before:  scalar("New"),
        after:   scalar("Fixed"),
        at:      at(5),
      },
      Change {
        id:      Key::Int(2),
        subject: ChangeSubject::Group(FieldGroup::Assignee),
        before:  Tracked::Null,
        after:   scalar("u2"),
        at:      at(5),
      },
    ],
  });

  let mut tickets = BTreeMap::from([
    (1, crash),
    (3, ticket(3, "Docs", "see [[Nowhere]]")),
  ]);
  fill_gaps(&mut tickets);
  tickets
}

fn page(id: i64, parent: Option<i64>, name: &str, created: u32) -> WikiPage {
  WikiPage {
    id:         Key::Int(id),
    parent:     parent.map(Key::Int),
    name:       name.to_string(),
    position:   id,
    status:     ACTIVE_STATUS,
    user:       None,
    created_at: at(created),
    updated_at: at(created),
    contents:   None,
    level:      0,
    children:   Vec::new(),
    versions:   Vec::new(),
  }
}

fn version(id: i64, page: i64, number: i64, day: u32, contents: Option<&str>) -> WikiPageVersion {
  WikiPageVersion {
    id:             Key::Int(id),
    page:           Key::Int(page),
    version:        number,
    user:           None,
    contents:       contents.map(String::from),
    change_comment: None,
    created_at:     at(day),
    updated_at:     at(day),
    blob:           None,
  }
}

fn wiki() -> WikiTree {
  let mut home = page(1, None, "Home", 1);
  home.versions.push(version(10, 1, 1, 2, Some("h1. Home\n[[Child]]")));
  let mut second = version(11, 1, 2, 4, Some("h1. Home\nupdated"));
  second.user = Some(UserId::new("u1"));
  second.change_comment = Some("tweak".to_string());
  home.versions.push(second);

  let mut child = page(2, Some(1), "Child", 3);
  child.versions.push(version(20, 2, 1, 3, None));

  let mut old = page(3, None, "Old", 1);
  old.status = 0;

  WikiTree::build(vec![home, child, old])
}

fn plan() -> Plan {
  let tickets = tickets();
  let statuses = StatusMap::default();
  let timelines = reconstruct_all(tickets.values(), &statuses);
  let catalog = Catalog {
    tickets,
    wiki: wiki(),
    skipped: 0,
  };
  let users = users();
  let attachments = BTreeSet::new();
  let dialect = MarkupConfig::default().compile().unwrap();
  let sources = Sources {
    catalog:     &catalog,
    timelines:   &timelines,
    users:       &users,
    statuses:    &statuses,
    attachments: &attachments,
  };
  generate(&sources, &dialect, &WikiConfig::default())
}

// ─── Tickets ─────────────────────────────────────────────────────────────────

#[test]
fn every_ticket_number_gets_a_history() {
  let plan = plan();
  let numbers: Vec<i64> = plan.tickets.iter().map(|t| t.number).collect();
  assert_eq!(numbers, vec![1, 2, 3]);
  assert!(plan.tickets[1].placeholder);
  assert_eq!(plan.tickets[1].title, "[#2] - Deleted ticket");
  assert_eq!(plan.tickets[1].changesets.len(), 1);
  assert_eq!(plan.tickets[1].changesets[0].state, Some(IssueState::Closed));
  assert_eq!(plan.tickets[1].changesets[0].actor.name, "ghost");
}

#[test]
fn creation_changeset_carries_title_body_and_initial_fields() {
  let plan = plan();
  let crash = &plan.tickets[0];
  assert!(crash.consistent);
  let creation = &crash.changesets[0];
  assert_eq!(creation.kind, SnapshotKind::Creation);
  assert_eq!(creation.sequence, 0);
  assert_eq!(creation.title.as_deref(), Some("[#1] - Crash"));
  assert_eq!(creation.body.as_deref(), Some("## Crash\n\nSee [[Start|Home]]"));
  assert_eq!(creation.actor.email, "ann@example.com");
  assert_eq!(
    creation.fields.get(&FieldGroup::Status),
    Some(&Some(FieldValue::scalar("New")))
  );
  assert_eq!(creation.fields.get(&FieldGroup::Assignee), Some(&None));
  assert_eq!(creation.state, Some(IssueState::Open));
}

#[test]
fn turns_carry_translated_comments_and_mentions() {
  let plan = plan();
  let turn = &plan.tickets[0].changesets[1];
  assert_eq!(turn.kind, SnapshotKind::Turn);
  assert_eq!(turn.title, None);
  assert_eq!(turn.comment, Some(Key::Int(900)));
  assert_eq!(turn.body.as_deref(), Some("`make` fails"));
  assert_eq!(turn.actor.name, "Bob");
  assert_eq!(turn.actor.email, NO_EMAIL);
  assert_eq!(
    turn.fields.get(&FieldGroup::Assignee),
    Some(&Some(FieldValue::scalar("@bob")))
  );
  assert_eq!(turn.state, Some(IssueState::Closed));
}

#[test]
fn untranslatable_markup_is_reported_against_its_ticket() {
  let plan = plan();
  assert_eq!(plan.diagnostics.len(), 1);
  assert_eq!(plan.diagnostics[0].kind, DiagnosticKind::UnresolvedReference);
  assert_eq!(plan.diagnostics[0].owner, "ticket #3");
}

#[test]
fn digests_are_distinct_and_reproducible() {
  let first = plan();
  let second = plan();
  let digests: BTreeSet<&str> = first
    .tickets
    .iter()
    .flat_map(|t| t.changesets.iter().map(|c| c.digest.as_str()))
    .chain(first.wiki.iter().map(|c| c.digest.as_str()))
    .collect();
  assert_eq!(digests.len(), first.changeset_count());
  assert_eq!(first.tickets[0].changesets[1].digest, second.tickets[0].changesets[1].digest);
}

// ─── Wiki ────────────────────────────────────────────────────────────────────

#[test]
fn revisions_are_emitted_oldest_first_with_a_sidebar() {
  let plan = plan();
  let names: Vec<&str> = plan.wiki.iter().map(|c| c.name.as_str()).collect();
  assert_eq!(names, vec!["Home:1", "Child:1", "Home:2", "normalize"]);

  let first = &plan.wiki[0];
  assert_eq!(first.files["_Sidebar.md"], "**Wiki**\n* [[Home]]\n");
  assert_eq!(first.files["Home.md"], "h1. Home\n[[Child]]");
  assert_eq!(first.author.name, UNKNOWN_ACTOR);
  assert_eq!(first.author.email, NO_EMAIL);
  assert_eq!(first.message, "");

  let child = &plan.wiki[1];
  assert_eq!(child.files["_Sidebar.md"], "**Wiki**\n* [[Home]]\n  * [[Child]]\n");
  assert!(child.files["Child.md"].contains("## Placeholder page"));

  let third = &plan.wiki[2];
  assert_eq!(third.message, "tweak");
  assert_eq!(third.author.name, "Ann");
}

#[test]
fn normalisation_rewrites_only_changed_pages() {
  let plan = plan();
  let trailing = &plan.wiki[3];
  assert_eq!(trailing.kind, WikiChangeKind::Normalize);
  assert_eq!(trailing.at, at(4));
  assert_eq!(trailing.files.len(), 1);
  assert_eq!(trailing.files["Home.md"], "# Home\n\nupdated");
}

#[test]
fn inactive_pages_stay_out_of_the_sidebar() {
  let tree = wiki();
  assert_eq!(sidebar(&tree, at(28), "Docs"), "**Docs**\n* [[Home]]\n  * [[Child]]\n");
}

#[test]
fn plan_serialises_for_the_write_adapter() {
  let value = serde_json::to_value(plan()).unwrap();
  let turn = &value["tickets"][0]["changesets"][1];
  assert_eq!(turn["kind"], "turn");
  assert_eq!(turn["fields"]["assignee"], "@bob");
  assert_eq!(turn["state"], "closed");
  assert!(turn.get("title").is_none());
  assert_eq!(value["wiki"][3]["kind"], "normalize");
}
