//! Wiki pages, their revisions, and the presentation tree.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::{identity::UserId, record::Key};

pub const WIKI_PAGES: &str = "wiki_pages";
pub const WIKI_PAGE_VERSIONS: &str = "wiki_page_versions";
pub const WIKI_PAGE_BLOBS: &str = "wiki_page_blobs";

/// `status` value of a live (not archived) page.
pub const ACTIVE_STATUS: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPageVersion {
  pub id:             Key,
  pub page:           Key,
  pub version:        i64,
  pub user:           Option<UserId>,
  pub contents:       Option<String>,
  pub change_comment: Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
  pub blob:           Option<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiPage {
  pub id:         Key,
  pub parent:     Option<Key>,
  pub name:       String,
  pub position:   i64,
  pub status:     i64,
  pub user:       Option<UserId>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub contents:   Option<String>,
  /// Depth in the tree; 0 is top level. Filled by [`WikiTree::build`].
  pub level:      usize,
  /// Filled by [`WikiTree::build`], sorted by position.
  pub children:   Vec<Key>,
  /// Sorted by version counter.
  pub versions:   Vec<WikiPageVersion>,
}

impl WikiPage {
  pub fn is_active(&self) -> bool { self.status == ACTIVE_STATUS }

  /// The newest revision's content, falling back to the page row.
  pub fn latest_contents(&self) -> Option<&str> {
    self
      .versions
      .last()
      .and_then(|v| v.contents.as_deref())
      .or(self.contents.as_deref())
  }

  pub fn file_name(&self) -> String { format!("{}.md", self.name) }
}

/// All pages, linked into a parent/children tree.
#[derive(Debug, Clone, Default)]
pub struct WikiTree {
  pages:            BTreeMap<Key, WikiPage>,
  /// Pre-order, siblings by position.
  order:            Vec<Key>,
  order_conflicts:  Vec<Key>,
}

impl WikiTree {
  /// Link pages to parents and children, compute levels and the pre-order
  /// presentation order, and check that each page's versions agree on
  /// counter and timestamp order.
  pub fn build(pages: Vec<WikiPage>) -> Self {
    let mut pages: BTreeMap<Key, WikiPage> =
      pages.into_iter().map(|p| (p.id.clone(), p)).collect();

    let mut children: BTreeMap<Option<Key>, Vec<(i64, Key)>> = BTreeMap::new();
    for page in pages.values() {
      let parent = match &page.parent {
        Some(parent) if pages.contains_key(parent) => Some(parent.clone()),
        Some(parent) => {
          tracing::warn!(page = %page.name, %parent, "parent page not found; treating as top level");
          None
        }
        None => None,
      };
      children
        .entry(parent)
        .or_default()
        .push((page.position, page.id.clone()));
    }
    for siblings in children.values_mut() {
      siblings.sort();
    }

    let mut order = Vec::with_capacity(pages.len());
    let mut visited = BTreeSet::new();
    let mut stack: Vec<(Key, usize)> = children
      .get(&None)
      .map(|roots| roots.iter().rev().map(|(_, k)| (k.clone(), 0)).collect())
      .unwrap_or_default();
    while let Some((key, level)) = stack.pop() {
      if !visited.insert(key.clone()) {
        continue;
      }
      let kids: Vec<Key> = children
        .get(&Some(key.clone()))
        .map(|c| c.iter().map(|(_, k)| k.clone()).collect())
        .unwrap_or_default();
      for kid in kids.iter().rev() {
        stack.push((kid.clone(), level + 1));
      }
      if let Some(page) = pages.get_mut(&key) {
        page.level = level;
        page.children = kids;
      }
      order.push(key);
    }

    // Pages on a parent cycle are never reached from a root.
    let unreached: Vec<Key> = pages
      .keys()
      .filter(|k| !visited.contains(*k))
      .cloned()
      .collect();
    for key in unreached {
      tracing::warn!(page = %key, "wiki page unreachable from any root; appended at top level");
      if let Some(page) = pages.get_mut(&key) {
        page.level = 0;
      }
      order.push(key);
    }

    let mut order_conflicts = Vec::new();
    for page in pages.values_mut() {
      page.versions.sort_by_key(|v| v.version);
      let agrees = page
        .versions
        .windows(2)
        .all(|w| w[0].updated_at <= w[1].updated_at);
      if !agrees {
        tracing::warn!(page = %page.name, "version counter and timestamps disagree");
        order_conflicts.push(page.id.clone());
      }
    }

    Self {
      pages,
      order,
      order_conflicts,
    }
  }

  pub fn page(&self, key: &Key) -> Option<&WikiPage> { self.pages.get(key) }

  pub fn len(&self) -> usize { self.pages.len() }

  pub fn is_empty(&self) -> bool { self.pages.is_empty() }

  /// Pages in presentation order.
  pub fn ordered(&self) -> impl Iterator<Item = &WikiPage> {
    self.order.iter().filter_map(|k| self.pages.get(k))
  }

  /// Every revision of every page, oldest update first.
  pub fn versions(&self) -> Vec<&WikiPageVersion> {
    let mut all: Vec<&WikiPageVersion> =
      self.pages.values().flat_map(|p| p.versions.iter()).collect();
    all.sort_by(|a, b| {
      a.updated_at
        .cmp(&b.updated_at)
        .then_with(|| a.page.cmp(&b.page))
        .then_with(|| a.version.cmp(&b.version))
    });
    all
  }

  pub fn page_names(&self) -> BTreeSet<String> {
    self.pages.values().map(|p| p.name.clone()).collect()
  }

  /// Pages whose version counter and timestamps disagree.
  pub fn order_conflicts(&self) -> &[Key] { &self.order_conflicts }

  /// Fill revision contents from a supplementary feed keyed by version id.
  /// Returns how many revisions received content.
  pub fn apply_contents(&mut self, contents: &BTreeMap<Key, String>) -> usize {
    let mut applied = 0;
    for version in self.pages.values_mut().flat_map(|p| p.versions.iter_mut())
    {
      if let Some(text) = contents.get(&version.id) {
        version.contents = Some(text.clone());
        applied += 1;
      }
    }
    applied
  }
}
