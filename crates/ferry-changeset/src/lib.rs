//! Changeset generation.
//!
//! Turns reconstructed ticket timelines and wiki revisions into the ordered
//! units a write adapter applies one at a time: a [`TicketChangeset`] per
//! timeline snapshot, a [`WikiChangeset`] per page revision, and a trailing
//! changeset that brings every wiki page to target markup. Bodies are
//! translated on the way through. No I/O happens here.

pub mod config;
mod digest;
pub mod ticket;
pub mod wiki;

use std::collections::BTreeSet;

use ferry_core::{
  config::StatusMap,
  identity::{UserDirectory, UserId},
  model::Catalog,
  timeline::Timeline,
};
use ferry_markup::{Context, Diagnostic, Dialect, translate_report};
use serde::Serialize;

pub use config::WikiConfig;
pub use ticket::{TicketChangeset, TicketHistory};
pub use wiki::{WikiChangeKind, WikiChangeset};

/// Author email used when a user has none on record.
pub const NO_EMAIL: &str = "none@localhost";
/// Author name for changes with no user on record. Distinct from the
/// reporter of injected placeholder tickets.
pub const UNKNOWN_ACTOR: &str = "unknown";

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Who made a change, as the target system should show it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
  pub id:      Option<UserId>,
  pub name:    String,
  pub email:   String,
  pub mention: Option<String>,
}

impl Actor {
  pub fn resolve(users: &UserDirectory, id: Option<&UserId>) -> Self {
    match id {
      Some(id) => Self {
        id:      Some(id.clone()),
        name:    users.display_name(id),
        email:   users.email(id).unwrap_or(NO_EMAIL).to_string(),
        mention: Some(users.mention(id)),
      },
      None => Self {
        id:      None,
        name:    UNKNOWN_ACTOR.to_string(),
        email:   NO_EMAIL.to_string(),
        mention: None,
      },
    }
  }
}

// ─── Inputs and output ───────────────────────────────────────────────────────

/// Everything generation reads.
#[derive(Debug, Clone, Copy)]
pub struct Sources<'a> {
  pub catalog:     &'a Catalog,
  pub timelines:   &'a [Timeline],
  pub users:       &'a UserDirectory,
  pub statuses:    &'a StatusMap,
  /// File names present in the attachment directory.
  pub attachments: &'a BTreeSet<String>,
}

/// The full ordered output of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
  /// One history per ticket, in ticket-number order.
  pub tickets:     Vec<TicketHistory>,
  /// Wiki revisions oldest first, then the normalisation changeset.
  pub wiki:        Vec<WikiChangeset>,
  /// Markup that needs manual cleanup.
  pub diagnostics: Vec<Diagnostic>,
}

impl Plan {
  pub fn changeset_count(&self) -> usize {
    self.wiki.len()
      + self.tickets.iter().map(|t| t.changesets.len()).sum::<usize>()
  }
}

/// Translates bodies against one shared page and attachment set, keeping
/// every diagnostic.
pub(crate) struct Translator<'a> {
  dialect:     &'a Dialect,
  pages:       BTreeSet<String>,
  attachments: &'a BTreeSet<String>,
  diagnostics: Vec<Diagnostic>,
}

impl<'a> Translator<'a> {
  pub(crate) fn new(
    dialect: &'a Dialect,
    pages: BTreeSet<String>,
    attachments: &'a BTreeSet<String>,
  ) -> Self {
    Self {
      dialect,
      pages,
      attachments,
      diagnostics: Vec::new(),
    }
  }

  pub(crate) fn translate(&mut self, text: &str, owner: &str) -> String {
    let ctx = Context::new(self.dialect, owner)
      .pages(&self.pages)
      .attachments(self.attachments);
    let translation = translate_report(text, &ctx);
    self.diagnostics.extend(translation.diagnostics);
    translation.text
  }
}

/// Build the plan: ticket histories first, then the wiki.
pub fn generate(sources: &Sources<'_>, dialect: &Dialect, wiki: &WikiConfig) -> Plan {
  let mut translator =
    Translator::new(dialect, sources.catalog.wiki.page_names(), sources.attachments);

  let tickets = ticket::histories(sources, &mut translator);
  let wiki = wiki::changesets(&sources.catalog.wiki, sources.users, wiki, &mut translator);

  let plan = Plan {
    tickets,
    wiki,
    diagnostics: translator.diagnostics,
  };
  tracing::info!(
    tickets = plan.tickets.len(),
    wiki = plan.wiki.len(),
    changesets = plan.changeset_count(),
    diagnostics = plan.diagnostics.len(),
    "changesets generated"
  );
  plan
}

#[cfg(test)]
mod tests;
