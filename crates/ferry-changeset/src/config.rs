//! Wiki output settings.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
  /// Bold title line at the top of the sidebar.
  pub sidebar_title:     String,
  pub sidebar_file:      String,
  /// Emit the trailing changeset that converts every page to markdown.
  pub normalize:         bool,
  pub normalize_message: String,
  pub normalize_author:  String,
  pub normalize_email:   String,
}

impl Default for WikiConfig {
  fn default() -> Self {
    Self {
      sidebar_title:     "Wiki".to_string(),
      sidebar_file:      "_Sidebar.md".to_string(),
      normalize:         true,
      normalize_message: "Convert wiki pages to markdown".to_string(),
      normalize_author:  "ferry".to_string(),
      normalize_email:   crate::NO_EMAIL.to_string(),
    }
  }
}
