//! `ferry`: convert an issue-tracker dump into ordered changesets.
//!
//! Reads the dump plus optional identity and wiki content feeds, rebuilds
//! every ticket's history and every wiki revision, translates markup, and
//! writes the changeset plan as JSON for a write adapter to apply in order.
//!
//! # Usage
//!
//! ```text
//! ferry --dump space.dump --users users.json --output plan.json
//! ferry --config ferry.toml -v
//! ```

mod pipeline;
mod settings;

use std::{
  fs::File,
  io::{self, BufWriter, Write},
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "ferry", version, about = "Convert an issue-tracker dump into ordered changesets")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ferry.toml")]
  config: PathBuf,

  /// Line-oriented dump to read.
  #[arg(long, value_name = "FILE")]
  dump: Option<PathBuf>,

  /// JSON identity feed merged into the user directory.
  #[arg(long, value_name = "FILE")]
  users: Option<PathBuf>,

  /// JSON wiki revision content keyed by version id.
  #[arg(long, value_name = "FILE")]
  wiki_content: Option<PathBuf>,

  /// Directory of attachment files that links are checked against.
  #[arg(long, value_name = "DIR")]
  attachments: Option<PathBuf>,

  /// Where to write the plan; `-` for stdout.
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Log at debug level unless `RUST_LOG` says otherwise.
  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  /// Flags win over the config file and environment.
  fn apply(self, settings: &mut Settings) {
    let overrides = [
      (self.dump, &mut settings.dump),
      (self.users, &mut settings.users_feed),
      (self.wiki_content, &mut settings.wiki_content),
      (self.attachments, &mut settings.attachments),
      (self.output, &mut settings.output),
    ];
    for (flag, slot) in overrides {
      if flag.is_some() {
        *slot = flag;
      }
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy(),
    )
    .init();

  let mut settings = Settings::load(cli.config.clone())?;
  cli.apply(&mut settings);

  let dump = settings
    .dump
    .clone()
    .context("no dump given; pass --dump or set `dump` in the config file")?;

  tracing::info!(dump = %dump.display(), "loading dump");
  let (dataset, report) = pipeline::load_dump(&dump)?;
  let feeds = pipeline::load_feeds(&settings)?;

  let (plan, mut summary) = pipeline::execute(&dataset, feeds, &settings)?;
  summary.rejected_lines = report.rejected;

  write_plan(&plan, settings.output.as_deref())?;
  summary.log();
  Ok(())
}

fn write_plan(plan: &ferry_changeset::Plan, output: Option<&Path>) -> anyhow::Result<()> {
  match output {
    Some(path) if path != Path::new("-") => {
      let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
      let mut out = BufWriter::new(file);
      serde_json::to_writer_pretty(&mut out, plan).context("failed to write plan")?;
      out.flush().context("failed to write plan")?;
      tracing::info!(path = %path.display(), "plan written");
    }
    _ => {
      let mut out = io::stdout().lock();
      serde_json::to_writer_pretty(&mut out, plan).context("failed to write plan")?;
      writeln!(out).context("failed to write plan")?;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_override_settings() {
    let cli = Cli::parse_from(["ferry", "--dump", "a.dump", "-o", "-"]);
    let mut settings = Settings {
      dump: Some(PathBuf::from("from-config.dump")),
      attachments: Some(PathBuf::from("files")),
      ..Settings::default()
    };
    cli.apply(&mut settings);
    assert_eq!(settings.dump, Some(PathBuf::from("a.dump")));
    assert_eq!(settings.attachments, Some(PathBuf::from("files")));
    assert_eq!(settings.output, Some(PathBuf::from("-")));
  }

  #[test]
  fn config_path_defaults_to_ferry_toml() {
    let cli = Cli::parse_from(["ferry", "-v"]);
    assert_eq!(cli.config, PathBuf::from("ferry.toml"));
    assert!(cli.verbose);
  }
}
