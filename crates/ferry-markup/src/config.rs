//! Translator configuration and its compiled form.

use serde::Deserialize;

use crate::{error::Result, urls::UrlRewriter};

/// One URL rewrite: a regex and its replacement, `$1`-style captures
/// allowed. Each absolute URL goes through the rules in order, each rule
/// over the output of the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UrlRule {
  pub pattern:     String,
  pub replacement: String,
}

impl UrlRule {
  pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
    Self {
      pattern:     pattern.into(),
      replacement: replacement.into(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
  /// Rewrite `@text@` as an inline code span.
  pub inline_code:     bool,
  /// Directory attachment links point into, relative to the output.
  pub attachment_base: String,
  /// Hosts of the source system. URLs on these hosts that survive the rules
  /// are reported.
  pub source_hosts:    Vec<String>,
  pub url_rules:       Vec<UrlRule>,
}

impl Default for MarkupConfig {
  fn default() -> Self {
    Self {
      inline_code:     true,
      attachment_base: "attachments".to_string(),
      source_hosts:    vec!["assembla.com".to_string()],
      url_rules:       vec![
        UrlRule::new(
          r"https?://(?:[\w-]+\.)*assembla\.com/spaces/[\w.-]+/tickets/(\d+)[\w/#?=&-]*",
          "#$1",
        ),
        UrlRule::new(
          r"https?://(?:[\w-]+\.)*assembla\.com/spaces/[\w.-]+/wiki/([\w%-]+)[\w/#?=&-]*",
          "[[$1]]",
        ),
      ],
    }
  }
}

impl MarkupConfig {
  /// Compile the URL rules. Fails on the first invalid pattern.
  pub fn compile(&self) -> Result<Dialect> {
    Ok(Dialect {
      inline_code:     self.inline_code,
      attachment_base: self.attachment_base.trim_end_matches('/').to_string(),
      urls:            UrlRewriter::new(&self.url_rules, &self.source_hosts)?,
    })
  }
}

/// A compiled [`MarkupConfig`], shared by every translation of a run.
#[derive(Debug, Clone)]
pub struct Dialect {
  pub(crate) inline_code:     bool,
  pub(crate) attachment_base: String,
  pub(crate) urls:            UrlRewriter,
}

impl Dialect {
  /// Where a link to attachment `name` points.
  pub fn attachment_path(&self, name: &str) -> String {
    let name = name.trim().replace(' ', "%20");
    if self.attachment_base.is_empty() {
      name
    } else {
      format!("{}/{name}", self.attachment_base)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn default_config_compiles() {
    let dialect = MarkupConfig::default().compile().unwrap();
    assert!(dialect.inline_code);
    assert_eq!(dialect.attachment_path("spec v2.pdf"), "attachments/spec%20v2.pdf");
  }

  #[test]
  fn bad_rule_is_reported_with_its_pattern() {
    let config = MarkupConfig {
      url_rules: vec![UrlRule::new("(unclosed", "x")],
      ..MarkupConfig::default()
    };
    match config.compile() {
      Err(Error::InvalidUrlRule { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
      other => panic!("expected InvalidUrlRule, got {other:?}"),
    }
  }

  #[test]
  fn empty_base_links_bare_names() {
    let config = MarkupConfig {
      attachment_base: String::new(),
      ..MarkupConfig::default()
    };
    assert_eq!(config.compile().unwrap().attachment_path("a.txt"), "a.txt");
  }
}
