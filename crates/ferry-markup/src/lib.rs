//! Legacy tracker markup → target markdown.
//!
//! Pure and synchronous. A [`translate`] call runs an ordered list of stage
//! functions over a segmented document: literal blocks are swapped out for
//! placeholder tokens first, every rewriting stage sees only the text around
//! them, and the literals are put back verbatim at the end. Links and URLs
//! are resolved before the line-level stages, and what they emit is
//! protected the same way.
//!
//! Translation is idempotent: already-translated fences, inline code spans,
//! headings, lists, links and tables are recognised and left alone.
//!
//! # Quick start
//!
//! ```no_run
//! use std::collections::BTreeSet;
//!
//! use ferry_markup::{Context, MarkupConfig, translate};
//!
//! let dialect = MarkupConfig::default().compile().unwrap();
//! let pages = BTreeSet::from(["Home".to_string()]);
//! let ctx = Context::new(&dialect, "wiki page Intro").pages(&pages);
//! assert_eq!(translate("h2. Title", &ctx), "## Title");
//! ```

pub mod config;
pub mod error;
mod doc;
mod links;
mod structure;
mod tables;
mod urls;

use std::collections::BTreeSet;

use serde::Serialize;
use strum::{AsRefStr, Display};

pub use config::{Dialect, MarkupConfig, UrlRule};
pub use error::{Error, Result};

use doc::Doc;

// ─── Context ─────────────────────────────────────────────────────────────────

static NO_NAMES: BTreeSet<String> = BTreeSet::new();

/// Everything a translation may consult besides the text itself.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
  pub dialect:     &'a Dialect,
  /// Identifies the entity being translated in diagnostics.
  pub owner:       &'a str,
  /// Names valid as bare cross-references.
  pub pages:       &'a BTreeSet<String>,
  /// File names present in the attachment directory.
  pub attachments: &'a BTreeSet<String>,
}

impl<'a> Context<'a> {
  pub fn new(dialect: &'a Dialect, owner: &'a str) -> Self {
    Self {
      dialect,
      owner,
      pages: &NO_NAMES,
      attachments: &NO_NAMES,
    }
  }

  pub fn pages(mut self, pages: &'a BTreeSet<String>) -> Self {
    self.pages = pages;
    self
  }

  pub fn attachments(mut self, attachments: &'a BTreeSet<String>) -> Self {
    self.attachments = attachments;
    self
  }
}

// ─── Diagnostics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticKind {
  /// A literal block opener with no closer.
  UnterminatedLiteral,
  /// A literal block with nothing in it; dropped from the output.
  EmptyLiteral,
  /// A cross-reference to a name that is not a known page.
  UnresolvedReference,
  /// An attachment reference with no matching file.
  MissingAttachment,
  /// A URL still pointing at the source system after rewriting.
  UnresolvedUrl,
}

/// A construct passed through unchanged that needs manual cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub owner:    String,
  pub kind:     DiagnosticKind,
  pub fragment: String,
}

/// Collects diagnostics for one translation, logging each as it arrives.
pub(crate) struct Diagnostics<'a> {
  owner: &'a str,
  items: Vec<Diagnostic>,
}

impl<'a> Diagnostics<'a> {
  fn new(owner: &'a str) -> Self {
    Self {
      owner,
      items: Vec::new(),
    }
  }

  pub(crate) fn warn(&mut self, kind: DiagnosticKind, fragment: &str) {
    tracing::warn!(owner = self.owner, %kind, fragment, "markup left untranslated");
    self.items.push(Diagnostic {
      owner: self.owner.to_string(),
      kind,
      fragment: fragment.to_string(),
    });
  }
}

// ─── Translation ─────────────────────────────────────────────────────────────

/// Translated text plus everything that could not be translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
  pub text:        String,
  pub diagnostics: Vec<Diagnostic>,
}

/// Translate `text`, discarding diagnostics after logging them.
pub fn translate(text: &str, ctx: &Context<'_>) -> String {
  translate_report(text, ctx).text
}

/// Translate `text` and return the diagnostics alongside the result.
pub fn translate_report(text: &str, ctx: &Context<'_>) -> Translation {
  let mut diagnostics = Diagnostics::new(ctx.owner);
  let mut doc = Doc::parse(&doc::normalize(text), &mut diagnostics);

  links::rewrite(&mut doc, ctx, &mut diagnostics);
  ctx.dialect.urls.rewrite(&mut doc, &mut diagnostics);
  structure::lists(&mut doc);
  structure::headings(&mut doc);
  structure::images(&mut doc);
  if ctx.dialect.inline_code {
    structure::inline_quotes(&mut doc);
  }
  structure::rules(&mut doc);
  tables::normalize(&mut doc);

  Translation {
    text:        doc.assemble(),
    diagnostics: diagnostics.items,
  }
}

#[cfg(test)]
mod tests;
