//! Rewriting of absolute URLs that point at the source system.

use std::sync::LazyLock;

use regex::Regex;

use crate::{
  DiagnosticKind, Diagnostics,
  config::UrlRule,
  doc::Doc,
  error::{Error, Result},
};

static URL: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"https?://[^\s<>()\[\]"'`\x{E000}\x{E001}]+"#).expect("url regex")
});

#[derive(Debug, Clone)]
pub(crate) struct UrlRewriter {
  rules:        Vec<(Regex, String)>,
  source_hosts: Vec<String>,
}

impl UrlRewriter {
  pub(crate) fn new(rules: &[UrlRule], source_hosts: &[String]) -> Result<Self> {
    let rules = rules
      .iter()
      .map(|rule| {
        Regex::new(&rule.pattern)
          .map(|re| (re, rule.replacement.clone()))
          .map_err(|source| Error::InvalidUrlRule {
            pattern: rule.pattern.clone(),
            source,
          })
      })
      .collect::<Result<Vec<_>>>()?;
    let source_hosts = source_hosts
      .iter()
      .map(|host| {
        let host = host.trim().trim_start_matches('.').to_ascii_lowercase();
        if host.is_empty() || host.contains(['/', ':', ' ']) {
          Err(Error::InvalidSourceHost(host))
        } else {
          Ok(host)
        }
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(Self {
      rules,
      source_hosts,
    })
  }

  pub(crate) fn is_source(&self, url: &str) -> bool {
    let Some((_, rest)) = url.split_once("://") else {
      return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority
      .rsplit('@')
      .next()
      .unwrap_or_default()
      .split(':')
      .next()
      .unwrap_or_default()
      .to_ascii_lowercase();
    self
      .source_hosts
      .iter()
      .any(|h| host == *h || host.ends_with(&format!(".{h}")))
  }

  /// Run every rule over `url` in order. `None` when nothing changed.
  pub(crate) fn resolve(&self, url: &str) -> Option<String> {
    let mut out = url.to_string();
    for (pattern, replacement) in &self.rules {
      out = pattern.replace_all(&out, replacement.as_str()).into_owned();
    }
    (out != url).then_some(out)
  }

  /// Resolve every bare URL and protect the result. Markdown link targets
  /// are left as written. URLs still on a source host are reported.
  pub(crate) fn rewrite(&self, doc: &mut Doc, diagnostics: &mut Diagnostics<'_>) {
    let text = std::mem::take(&mut doc.text);
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for url in URL.find_iter(&text) {
      let resolved = if text[..url.start()].ends_with("](") {
        None
      } else {
        self.resolve(url.as_str())
      };
      let Some(resolved) = resolved else {
        if self.is_source(url.as_str()) {
          diagnostics.warn(DiagnosticKind::UnresolvedUrl, url.as_str());
        }
        continue;
      };
      out.push_str(&text[copied..url.start()]);
      out.push_str(&doc.protect(resolved));
      copied = url.end();
    }
    out.push_str(&text[copied..]);
    doc.text = out;
  }
}
