//! Layered run settings: `ferry.toml`, then `FERRY_*` environment
//! variables, then command-line flags.

use std::path::PathBuf;

use anyhow::Context as _;
use ferry_changeset::WikiConfig;
use ferry_core::{
  config::{IdentityConfig, IndexConfig, StatusMap},
  identity::ExternalIdentity,
};
use ferry_markup::MarkupConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub dump:         Option<PathBuf>,
  /// Identity feed (JSON).
  pub users_feed:   Option<PathBuf>,
  /// Wiki revision content feed (JSON).
  pub wiki_content: Option<PathBuf>,
  /// Directory holding attachment files.
  pub attachments:  Option<PathBuf>,
  /// Plan destination; stdout when unset or `-`.
  pub output:       Option<PathBuf>,

  pub index:        IndexConfig,
  pub identity:     IdentityConfig,
  /// Manually pinned identities, one `[[users]]` entry each. Ids are
  /// values rather than table keys so their case survives loading.
  pub users:        Vec<ExternalIdentity>,
  pub statuses:     StatusMap,
  pub markup:       MarkupConfig,
  pub wiki:         WikiConfig,
}

impl Settings {
  /// Read the optional config file, then environment overrides such as
  /// `FERRY_OUTPUT` or `FERRY_WIKI__SIDEBAR_TITLE`.
  pub fn load(path: PathBuf) -> anyhow::Result<Self> {
    let source = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("FERRY")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;
    source
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  /// Identity settings with the `[[users]]` entries folded in as pinned
  /// identities.
  pub fn identity_config(&self) -> IdentityConfig {
    let mut identity = self.identity.clone();
    identity.pinned.extend(self.users.iter().cloned());
    identity
  }
}
