//! The run itself: load inputs, build the index, directory and catalog,
//! reconstruct timelines, and generate the changeset plan.

use std::{
  collections::{BTreeMap, BTreeSet},
  fs::File,
  io::BufReader,
  path::Path,
};

use anyhow::Context as _;
use ferry_changeset::{Plan, Sources, generate};
use ferry_core::{
  identity::{ExternalIdentity, UserDirectory},
  index::Index,
  model::Catalog,
  record::{Dataset, Key},
  timeline::{fill_gaps, reconstruct_all},
};
use ferry_dump::LoadReport;
use serde::Serialize;

use crate::settings::Settings;

/// Optional inputs besides the dump.
#[derive(Debug, Default)]
pub struct Feeds {
  pub users:        Option<Vec<ExternalIdentity>>,
  pub wiki_content: Option<BTreeMap<Key, String>>,
  pub attachments:  BTreeSet<String>,
}

/// Counts worth reading after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
  pub tables:                   usize,
  pub rows:                     usize,
  pub rejected_lines:           usize,
  pub duplicate_key_tables:     usize,
  pub users:                    usize,
  pub users_missing_enrichment: usize,
  pub skipped_rows:             usize,
  pub revisions_with_feed:      usize,
  pub placeholder_tickets:      usize,
  pub inconsistent_tickets:     usize,
  pub wiki_order_conflicts:     usize,
  pub diagnostics:              usize,
  pub changesets:               usize,
}

impl Summary {
  pub fn log(&self) {
    tracing::info!(
      tables = self.tables,
      rows = self.rows,
      rejected_lines = self.rejected_lines,
      duplicate_key_tables = self.duplicate_key_tables,
      users = self.users,
      users_missing_enrichment = self.users_missing_enrichment,
      skipped_rows = self.skipped_rows,
      revisions_with_feed = self.revisions_with_feed,
      placeholder_tickets = self.placeholder_tickets,
      inconsistent_tickets = self.inconsistent_tickets,
      wiki_order_conflicts = self.wiki_order_conflicts,
      diagnostics = self.diagnostics,
      changesets = self.changesets,
      "run complete"
    );
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

fn open(path: &Path) -> anyhow::Result<BufReader<File>> {
  let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
  Ok(BufReader::new(file))
}

pub fn load_dump(path: &Path) -> anyhow::Result<(Dataset, LoadReport)> {
  ferry_dump::load(open(path)?).with_context(|| format!("failed to read dump {}", path.display()))
}

/// Read every optional feed the settings name.
pub fn load_feeds(settings: &Settings) -> anyhow::Result<Feeds> {
  let mut feeds = Feeds::default();
  if let Some(path) = &settings.users_feed {
    let users = ferry_dump::feed::read_users(open(path)?)
      .with_context(|| format!("failed to read identity feed {}", path.display()))?;
    feeds.users = Some(users);
  }
  if let Some(path) = &settings.wiki_content {
    let contents = ferry_dump::feed::read_wiki_contents(open(path)?)
      .with_context(|| format!("failed to read wiki content feed {}", path.display()))?;
    feeds.wiki_content = Some(contents);
  }
  if let Some(dir) = &settings.attachments {
    feeds.attachments = attachment_names(dir)?;
  }
  Ok(feeds)
}

/// File names directly inside `dir`.
fn attachment_names(dir: &Path) -> anyhow::Result<BTreeSet<String>> {
  let entries = std::fs::read_dir(dir)
    .with_context(|| format!("failed to list attachments in {}", dir.display()))?;
  let mut names = BTreeSet::new();
  for entry in entries {
    let entry = entry?;
    if entry.file_type()?.is_file() {
      names.insert(entry.file_name().to_string_lossy().into_owned());
    }
  }
  tracing::debug!(files = names.len(), "attachment directory listed");
  Ok(names)
}

// ─── Run ─────────────────────────────────────────────────────────────────────

/// Everything after loading. Pure apart from logging.
pub fn execute(
  dataset: &Dataset,
  feeds: Feeds,
  settings: &Settings,
) -> anyhow::Result<(Plan, Summary)> {
  let dialect = settings
    .markup
    .compile()
    .context("invalid markup settings")?;

  let index = Index::build(dataset, &settings.index);

  let mut users = UserDirectory::scrape(dataset, &settings.identity_config());
  let mut missing_enrichment = 0;
  if let Some(feed) = feeds.users {
    let report = users.merge(feed);
    tracing::info!(
      merged = report.merged,
      unknown = report.unknown.len(),
      dropped_emails = report.dropped_emails,
      "identity feed merged"
    );
    missing_enrichment = report.missing_enrichment.len();
  }

  let mut catalog = Catalog::build(&index, &users);
  let revisions_with_feed = feeds
    .wiki_content
    .as_ref()
    .map_or(0, |contents| catalog.wiki.apply_contents(contents));
  let placeholders = fill_gaps(&mut catalog.tickets);
  let timelines = reconstruct_all(catalog.tickets.values(), &settings.statuses);

  let plan = generate(
    &Sources {
      catalog:     &catalog,
      timelines:   &timelines,
      users:       &users,
      statuses:    &settings.statuses,
      attachments: &feeds.attachments,
    },
    &dialect,
    &settings.wiki,
  );

  let summary = Summary {
    tables: dataset.tables().count(),
    rows: dataset.row_count(),
    rejected_lines: 0,
    duplicate_key_tables: index.duplicates().len(),
    users: users.len(),
    users_missing_enrichment: missing_enrichment,
    skipped_rows: catalog.skipped,
    revisions_with_feed,
    placeholder_tickets: placeholders.len(),
    inconsistent_tickets: timelines.iter().filter(|t| !t.is_consistent()).count(),
    wiki_order_conflicts: catalog.wiki.order_conflicts().len(),
    diagnostics: plan.diagnostics.len(),
    changesets: plan.changeset_count(),
  };
  Ok((plan, summary))
}
