//! Wiki changesets.
//!
//! Every page revision becomes one commit-like changeset that writes the
//! page file with the revision's raw content and regenerates the sidebar
//! index. A final changeset rewrites every page whose translated form
//! differs from what the revisions left behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ferry_core::{
  identity::UserDirectory,
  model::{WikiPage, WikiPageVersion, WikiTree},
};
use serde::Serialize;

use crate::{Actor, Translator, config::WikiConfig, digest::ContentDigest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WikiChangeKind {
  Revision,
  Normalize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiChangeset {
  /// `<page>:<version>` for revisions.
  pub name:    String,
  pub kind:    WikiChangeKind,
  pub at:      DateTime<Utc>,
  pub author:  Actor,
  pub message: String,
  /// Path → full content.
  pub files:   BTreeMap<String, String>,
  pub digest:  String,
}

impl WikiChangeset {
  fn new(
    name: String,
    kind: WikiChangeKind,
    at: DateTime<Utc>,
    author: Actor,
    message: String,
    files: BTreeMap<String, String>,
  ) -> Self {
    let mut digest = ContentDigest::new("wiki");
    digest.part(&name).time(at).part(&message);
    for (path, content) in &files {
      digest.part(path).part(content);
    }
    Self {
      name,
      kind,
      at,
      author,
      message,
      files,
      digest: digest.finish(),
    }
  }
}

/// The sidebar as of `at`: every active page created by then, in
/// presentation order, indented two spaces per level.
pub fn sidebar(tree: &WikiTree, at: DateTime<Utc>, title: &str) -> String {
  let mut out = format!("**{title}**\n");
  for page in tree.ordered() {
    if page.is_active() && page.created_at <= at {
      out.push_str(&format!("{}* [[{}]]\n", "  ".repeat(page.level), page.name));
    }
  }
  out
}

fn placeholder(page: &WikiPage, version: &WikiPageVersion, author: &Actor) -> String {
  format!(
    "# {}\n\nThis is revision {} by {} at {}.\n\n## Placeholder page\n",
    page.name, version.version, author.name, version.updated_at
  )
}

pub(crate) fn changesets(
  tree: &WikiTree,
  users: &UserDirectory,
  config: &WikiConfig,
  translator: &mut Translator<'_>,
) -> Vec<WikiChangeset> {
  let mut out = Vec::new();
  // Page file → content as of the latest revision, in first-write order.
  let mut current: Vec<(&WikiPage, String)> = Vec::new();

  for version in tree.versions() {
    let Some(page) = tree.page(&version.page) else {
      tracing::warn!(version = %version.id, page = %version.page, "revision of an unknown page; skipping");
      continue;
    };
    let author = Actor::resolve(users, version.user.as_ref());
    let content = match &version.contents {
      Some(content) => content.clone(),
      None => {
        tracing::warn!(page = %page.name, version = version.version, "revision has no content; writing a placeholder");
        placeholder(page, version, &author)
      }
    };

    match current.iter_mut().find(|(p, _)| p.id == page.id) {
      Some((_, latest)) => *latest = content.clone(),
      None => current.push((page, content.clone())),
    }

    let files = BTreeMap::from([
      (config.sidebar_file.clone(), sidebar(tree, version.updated_at, &config.sidebar_title)),
      (page.file_name(), content),
    ]);
    out.push(WikiChangeset::new(
      format!("{}:{}", page.name, version.version),
      WikiChangeKind::Revision,
      version.updated_at,
      author,
      version.change_comment.clone().unwrap_or_default(),
      files,
    ));
  }

  if config.normalize
    && let Some(last) = out.last().map(|c| c.at)
    && let Some(trailing) = normalize(&current, last, config, translator)
  {
    out.push(trailing);
  }
  out
}

/// Re-translate every page's latest content; pages already in target form
/// are left out. `None` when nothing changes.
fn normalize(
  current: &[(&WikiPage, String)],
  at: DateTime<Utc>,
  config: &WikiConfig,
  translator: &mut Translator<'_>,
) -> Option<WikiChangeset> {
  let files: BTreeMap<String, String> = current
    .iter()
    .filter_map(|(page, content)| {
      let translated = translator.translate(content, &format!("wiki page {}", page.name));
      (translated != *content).then(|| (page.file_name(), translated))
    })
    .collect();
  if files.is_empty() {
    tracing::debug!("every wiki page is already in target markup");
    return None;
  }
  tracing::info!(pages = files.len(), "wiki pages to normalise");
  let author = Actor {
    id:      None,
    name:    config.normalize_author.clone(),
    email:   config.normalize_email.clone(),
    mention: None,
  };
  Some(WikiChangeset::new(
    "normalize".to_string(),
    WikiChangeKind::Normalize,
    at,
    author,
    config.normalize_message.clone(),
    files,
  ))
}
