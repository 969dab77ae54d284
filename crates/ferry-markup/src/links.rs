//! Double-bracket cross-references.
//!
//! `[[Page]]` and `[[Page|Name]]` refer to other pages; `[[url:…]]`,
//! `[[file:…]]` and `[[image:…]]` become markdown links. URLs on the source
//! system resolve through the URL rules first. Everything emitted here is
//! protected from later stages.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Context, DiagnosticKind, Diagnostics, doc::Doc};

static LINK: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\[\[([^\[\]\n]+?)\]\]").expect("link regex"));

enum Target<'t> {
  Url(&'t str),
  File(&'t str),
  Image(&'t str),
  Page(&'t str),
}

/// Whether `left` carries one of the legacy `url:`, `file:` or `image:`
/// prefixes.
fn has_legacy_scheme(left: &str) -> bool {
  left.trim().split_once(':').is_some_and(|(scheme, _)| {
    ["url", "file", "image"]
      .iter()
      .any(|s| scheme.eq_ignore_ascii_case(s))
  })
}

fn target(left: &str) -> Target<'_> {
  let left = left.trim();
  match left.split_once(':') {
    Some((scheme, rest)) if scheme.eq_ignore_ascii_case("url") => Target::Url(rest.trim()),
    Some((scheme, _))
      if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
    {
      Target::Url(left)
    }
    Some((scheme, rest)) if scheme.eq_ignore_ascii_case("file") => Target::File(rest.trim()),
    Some((scheme, rest)) if scheme.eq_ignore_ascii_case("image") => Target::Image(rest.trim()),
    _ => Target::Page(left),
  }
}

/// Rewrite every double-bracket link. Page references stay in double-bracket
/// form. A link whose right side already names a known page is in target
/// form (`[[Name|Page]]`) and is kept as written.
pub(crate) fn rewrite(doc: &mut Doc, ctx: &Context<'_>, diagnostics: &mut Diagnostics<'_>) {
  let text = std::mem::take(&mut doc.text);
  let mut out = String::with_capacity(text.len());
  let mut copied = 0;
  for caps in LINK.captures_iter(&text) {
    let Some(whole) = caps.get(0) else { continue };
    out.push_str(&text[copied..whole.start()]);
    copied = whole.end();

    let inner = &caps[1];
    let (left, name) = match inner.split_once('|') {
      Some((left, name)) => (left, Some(name.trim()).filter(|n| !n.is_empty())),
      None => (inner, None),
    };
    if name.is_some_and(|n| ctx.pages.contains(n)) && !has_legacy_scheme(left) {
      out.push_str(&doc.protect(whole.as_str().to_string()));
      continue;
    }
    let rewritten = match target(left) {
      Target::Url(url) => url_link(url, name, ctx, diagnostics),
      Target::File(file) => {
        check_attachment(file, ctx, diagnostics, whole.as_str());
        format!("[{}]({})", name.unwrap_or(file), ctx.dialect.attachment_path(file))
      }
      Target::Image(file) => {
        check_attachment(file, ctx, diagnostics, whole.as_str());
        format!("![{}]({})", name.unwrap_or(file), ctx.dialect.attachment_path(file))
      }
      Target::Page(page) => page_reference(page, name, ctx, diagnostics, whole.as_str()),
    };
    out.push_str(&doc.protect(rewritten));
  }
  out.push_str(&text[copied..]);
  doc.text = out;
}

/// A link to an absolute URL. A source wiki URL becomes a cross-reference;
/// any other resolved URL keeps its rewritten form with the name beside it.
fn url_link(
  url: &str,
  name: Option<&str>,
  ctx: &Context<'_>,
  diagnostics: &mut Diagnostics<'_>,
) -> String {
  let name = name.filter(|n| *n != url);
  let Some(resolved) = ctx.dialect.urls.resolve(url) else {
    if ctx.dialect.urls.is_source(url) {
      diagnostics.warn(DiagnosticKind::UnresolvedUrl, url);
    }
    return match name {
      Some(name) => format!("[{name}]({url})"),
      None => url.to_string(),
    };
  };
  let page = resolved
    .strip_prefix("[[")
    .and_then(|r| r.strip_suffix("]]"))
    .filter(|p| !p.contains('|'));
  match (page, name) {
    (Some(page), Some(name)) => format!("[[{name}|{page}]]"),
    (None, Some(name)) => format!("{name} ({resolved})"),
    (_, None) => resolved,
  }
}

/// Legacy `[[Page|Name]]` is written `[[Name|Page]]` by the target.
fn page_reference(
  page: &str,
  name: Option<&str>,
  ctx: &Context<'_>,
  diagnostics: &mut Diagnostics<'_>,
  original: &str,
) -> String {
  let known = |p: &str| ctx.pages.contains(p);
  match name {
    Some(name) if known(page) => format!("[[{name}|{page}]]"),
    None if known(page) => format!("[[{page}]]"),
    _ => {
      diagnostics.warn(DiagnosticKind::UnresolvedReference, original);
      original.to_string()
    }
  }
}

fn check_attachment(
  file: &str,
  ctx: &Context<'_>,
  diagnostics: &mut Diagnostics<'_>,
  original: &str,
) {
  if !ctx.attachments.contains(file) {
    diagnostics.warn(DiagnosticKind::MissingAttachment, original);
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::*;
  use crate::{Diagnostic, MarkupConfig};

  fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  fn run(input: &str) -> (String, Vec<Diagnostic>) {
    let dialect = MarkupConfig::default().compile().unwrap();
    let pages = names(&["Home", "Getting Started"]);
    let files = names(&["spec.pdf", "shot.png"]);
    let ctx = Context::new(&dialect, "test").pages(&pages).attachments(&files);
    let mut diagnostics = Diagnostics::new("test");
    let mut doc = Doc::parse(input, &mut diagnostics);
    rewrite(&mut doc, &ctx, &mut diagnostics);
    (doc.assemble(), diagnostics.items)
  }

  #[test]
  fn page_links_swap_to_target_order() {
    assert_eq!(run("[[Home|Start]]").0, "[[Start|Home]]");
    assert_eq!(run("[[Start|Home]]").0, "[[Start|Home]]");
    assert_eq!(run("see [[Getting Started]]").0, "see [[Getting Started]]");
  }

  #[test]
  fn unknown_pages_are_reported_and_kept() {
    let (text, diags) = run("[[Nowhere|There]]");
    assert_eq!(text, "[[Nowhere|There]]");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::UnresolvedReference);
  }

  #[test]
  fn url_links_elide_identical_names() {
    assert_eq!(
      run("[[url:http://example.com|Example]]").0,
      "[Example](http://example.com)"
    );
    assert_eq!(run("[[url:http://example.com]]").0, "http://example.com");
    assert_eq!(
      run("[[http://example.com|http://example.com]]").0,
      "http://example.com"
    );
  }

  #[test]
  fn source_urls_resolve_inside_links() {
    assert_eq!(
      run("[[url:https://www.assembla.com/spaces/demo/wiki/Build_Guide|the guide]]").0,
      "[[the guide|Build_Guide]]"
    );
    assert_eq!(run("[[url:https://www.assembla.com/spaces/demo/tickets/4]]").0, "#4");
    assert_eq!(
      run("[[url:https://www.assembla.com/spaces/demo/tickets/4|the crash]]").0,
      "the crash (#4)"
    );
    let (text, diags) = run("[[url:https://www.assembla.com/spaces/demo/files/x|Doc]]");
    assert_eq!(text, "[Doc](https://www.assembla.com/spaces/demo/files/x)");
    assert_eq!(diags[0].kind, DiagnosticKind::UnresolvedUrl);
  }

  #[test]
  fn target_form_links_are_kept_even_with_url_labels() {
    let link = "[[https://www.assembla.com/spaces/demo/tickets/4|Home]]";
    let (text, diags) = run(link);
    assert_eq!(text, link);
    assert!(diags.is_empty());
    assert_eq!(run("[[url:http://example.com|Home]]").0, "[Home](http://example.com)");
  }

  #[test]
  fn emitted_links_are_protected() {
    let dialect = MarkupConfig::default().compile().unwrap();
    let ctx = Context::new(&dialect, "test");
    let mut diagnostics = Diagnostics::new("test");
    let mut doc = Doc::parse("[[url:http://example.com|Example]]", &mut diagnostics);
    rewrite(&mut doc, &ctx, &mut diagnostics);
    assert!(!doc.text.contains("example"));
  }

  #[test]
  fn attachments_resolve_against_the_directory() {
    assert_eq!(run("[[file:spec.pdf|Spec]]").0, "[Spec](attachments/spec.pdf)");
    assert_eq!(run("[[image:shot.png]]").0, "![shot.png](attachments/shot.png)");
    let (text, diags) = run("[[file:gone.zip]]");
    assert_eq!(text, "[gone.zip](attachments/gone.zip)");
    assert_eq!(diags[0].kind, DiagnosticKind::MissingAttachment);
  }
}
