//! Segmented text: the rewritable text of a document, with every literal
//! span swapped out for a placeholder token.
//!
//! A token is `U+E000 <index> U+E001`. Those private-use characters are
//! stripped from the input, so a token can never be forged by the text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::{DiagnosticKind, Diagnostics};

pub(crate) const OPEN: char = '\u{E000}';
pub(crate) const CLOSE: char = '\u{E001}';

static TOKEN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").expect("token regex"));

/// `<pre>…</pre>`, optionally wrapping `<code>…</code>`.
static PRE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?is)<pre>(?:\s*<code>)?(.*?)(?:</code>\s*)?</pre>").expect("pre regex")
});
static PRE_OPEN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<pre>").expect("pre opener regex"));
static BRACES: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?s)\{\{\{(.*?)\}\}\}").expect("brace block regex"));
static FENCE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?m)^(`{3,})[^`\n]*$").expect("fence regex"));
static CODE_SPAN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"`[^`\n]+`").expect("code span regex"));

/// CRLF and lone CR become LF; placeholder characters are dropped.
pub(crate) fn normalize(text: &str) -> String {
  text
    .replace("\r\n", "\n")
    .replace('\r', "\n")
    .chars()
    .filter(|c| *c != OPEN && *c != CLOSE)
    .collect()
}

/// A literal construct found while scanning.
enum Literal {
  /// Already-translated fence or code span; kept byte for byte.
  Verbatim,
  /// Legacy block; re-emitted as inline code or a fence.
  Legacy(String),
  /// Legacy opener with no closer.
  Unterminated(usize),
}

pub(crate) struct Doc {
  pub(crate) text: String,
  literals:        Vec<String>,
  newline_due:     bool,
}

impl Doc {
  /// Split `input` into rewritable text and literal tokens.
  pub(crate) fn parse(input: &str, diagnostics: &mut Diagnostics<'_>) -> Self {
    let mut doc = Self {
      text:        String::with_capacity(input.len()),
      literals:    Vec::new(),
      newline_due: false,
    };

    let mut pos = 0;
    while let Some((start, end, literal)) = next_literal(input, pos) {
      doc.push_text(&input[pos..start]);
      match literal {
        Literal::Verbatim => {
          let token = doc.protect(input[start..end].to_string());
          doc.push_text(&token);
        }
        Literal::Legacy(content) => {
          if content.trim().is_empty() {
            diagnostics.warn(DiagnosticKind::EmptyLiteral, &input[start..end]);
          } else {
            let rest = input[end..].split('\n').next().unwrap_or_default();
            let inline = !doc.current_line().contains('`') && !rest.contains('`');
            doc.push_legacy(&content, inline);
          }
        }
        Literal::Unterminated(opener) => {
          let line = input[start..].lines().next().unwrap_or_default();
          diagnostics.warn(DiagnosticKind::UnterminatedLiteral, line);
          doc.push_text(&input[start..start + opener]);
        }
      }
      pos = end;
    }
    doc.push_text(&input[pos..]);
    doc
  }

  fn push_text(&mut self, text: &str) {
    if text.is_empty() {
      return;
    }
    if self.newline_due && !text.starts_with('\n') {
      self.text.push('\n');
    }
    self.newline_due = false;
    self.text.push_str(text);
  }

  /// The line being built, as later stages will see it.
  fn current_line(&self) -> &str {
    if self.newline_due {
      return "";
    }
    self.text.rsplit('\n').next().unwrap_or_default()
  }

  /// Single-line content becomes an inline code span when `inline` allows;
  /// anything else becomes a fence on lines of its own. An inline span is
  /// only safe on a line with no stray backticks, which could pair with its
  /// delimiters on a later pass.
  fn push_legacy(&mut self, content: &str, inline: bool) {
    let body = content.trim_start_matches('\n').trim_end();
    if inline && !body.contains('\n') && !body.contains('`') {
      let token = self.protect(format!("`{body}`"));
      self.push_text(&token);
      return;
    }
    let ticks = "`".repeat(longest_backtick_run(body).max(2) + 1);
    let token = self.protect(format!("{ticks}\n{body}\n{ticks}"));
    if !self.text.is_empty() && !self.text.ends_with('\n') {
      self.text.push('\n');
    }
    self.newline_due = false;
    self.text.push_str(&token);
    self.newline_due = true;
  }

  /// Store `literal` and return the token standing in for it.
  pub(crate) fn protect(&mut self, literal: String) -> String {
    self.literals.push(literal);
    format!("{OPEN}{}{CLOSE}", self.literals.len() - 1)
  }

  /// Replace every token with its literal.
  pub(crate) fn assemble(self) -> String { self.expand(&self.text) }

  fn expand(&self, text: &str) -> String {
    TOKEN
      .replace_all(text, |caps: &Captures<'_>| {
        caps[1]
          .parse::<usize>()
          .ok()
          .and_then(|i| self.literals.get(i))
          .map(|literal| self.expand(literal))
          .unwrap_or_default()
      })
      .into_owned()
  }
}

/// Split text into lines, rewrite them, and join them back.
pub(crate) fn map_lines<F>(text: &str, f: F) -> String
where
  F: FnOnce(Vec<&str>) -> Vec<String>,
{
  f(text.split('\n').collect()).join("\n")
}

pub(crate) fn is_blank(line: &str) -> bool { line.trim().is_empty() }

/// Whether `text` contains a token.
pub(crate) fn has_token(text: &str) -> bool { text.contains(OPEN) }

fn longest_backtick_run(text: &str) -> usize {
  text
    .split(|c| c != '`')
    .map(str::len)
    .max()
    .unwrap_or(0)
}

/// The earliest literal construct at or after `pos`, as
/// `(start, end, kind)`. At equal starts fences win over legacy blocks, and
/// legacy blocks over code spans.
fn next_literal(input: &str, pos: usize) -> Option<(usize, usize, Literal)> {
  let mut best: Option<(usize, usize, Literal)> = None;
  let mut consider = |candidate: (usize, usize, Literal)| {
    if best.as_ref().is_none_or(|b| candidate.0 < b.0) {
      best = Some(candidate);
    }
  };

  if let Some(open) = FENCE.captures_at(input, pos)
    && let Some(whole) = open.get(0)
  {
    let ticks = open[1].len();
    consider((whole.start(), fence_end(input, whole.end(), ticks), Literal::Verbatim));
  }
  if let Some(open) = PRE_OPEN.find_at(input, pos) {
    consider(match PRE.captures_at(input, open.start()) {
      Some(caps) if caps.get(0).is_some_and(|m| m.start() == open.start()) => {
        let end = caps.get(0).map_or(open.end(), |m| m.end());
        (open.start(), end, Literal::Legacy(caps[1].to_string()))
      }
      _ => (open.start(), open.end(), Literal::Unterminated(open.len())),
    });
  }
  if let Some(offset) = input[pos..].find("{{{") {
    let start = pos + offset;
    consider(match BRACES.captures_at(input, start) {
      Some(caps) if caps.get(0).is_some_and(|m| m.start() == start) => {
        let end = caps.get(0).map_or(start + 3, |m| m.end());
        (start, end, Literal::Legacy(caps[1].to_string()))
      }
      _ => (start, start + 3, Literal::Unterminated(3)),
    });
  }
  if let Some(span) = CODE_SPAN.find_at(input, pos) {
    consider((span.start(), span.end(), Literal::Verbatim));
  }
  best
}

/// End of the fence whose opening line ends at `from`: the end of the first
/// later line of at least `ticks` backticks, or the end of the input.
fn fence_end(input: &str, from: usize, ticks: usize) -> usize {
  let mut pos = from;
  while let Some(close) = FENCE.captures_at(input, pos) {
    let Some(whole) = close.get(0) else { break };
    if close[1].len() >= ticks && whole.as_str().trim_end() == &close[1] {
      return whole.end();
    }
    pos = whole.end();
  }
  input.len()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(input: &str) -> (Doc, Vec<crate::Diagnostic>) {
    let mut diagnostics = Diagnostics::new("test");
    let doc = Doc::parse(input, &mut diagnostics);
    (doc, diagnostics.items)
  }

  #[test]
  fn single_line_pre_becomes_inline_code() {
    let (doc, diags) = parse("run <pre>make all</pre> now");
    assert!(diags.is_empty());
    assert!(!doc.text.contains("make"));
    assert_eq!(doc.assemble(), "run `make all` now");
  }

  #[test]
  fn multi_line_block_becomes_a_fence_on_its_own_lines() {
    let (doc, _) = parse("before{{{\nfn a() {}\n[[x]]\n}}}after");
    assert_eq!(doc.assemble(), "before\n```\nfn a() {}\n[[x]]\n```\nafter");
  }

  #[test]
  fn pre_with_code_wrapper_is_unwrapped() {
    let (doc, _) = parse("<pre><code>a\nb</code></pre>");
    assert_eq!(doc.assemble(), "```\na\nb\n```");
  }

  #[test]
  fn backticks_inside_content_lengthen_the_fence() {
    let (doc, _) = parse("{{{use ``` here}}}");
    assert_eq!(doc.assemble(), "````\nuse ``` here\n````");
  }

  #[test]
  fn existing_fences_and_spans_are_kept_verbatim() {
    let input = "x `[[a]]` y\n```rust\nh1. no\n```\nz";
    let (doc, _) = parse(input);
    assert!(!doc.text.contains("h1."));
    assert!(!doc.text.contains("[[a]]"));
    assert_eq!(doc.assemble(), input);
  }

  #[test]
  fn unclosed_fence_runs_to_the_end() {
    let input = "a\n```\nh1. b";
    let (doc, _) = parse(input);
    assert_eq!(doc.text.lines().count(), 2);
    assert_eq!(doc.assemble(), input);
  }

  #[test]
  fn unterminated_legacy_block_is_reported_and_kept() {
    let (doc, diags) = parse("a <pre>b");
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagnosticKind::UnterminatedLiteral);
    assert_eq!(doc.assemble(), "a <pre>b");
  }

  #[test]
  fn stray_backtick_on_the_line_forces_a_fence() {
    let (doc, _) = parse("Type `ls <pre>!a.png!</pre> here");
    assert_eq!(doc.assemble(), "Type `ls \n```\n!a.png!\n```\n here");
    let (doc, _) = parse("<pre>x</pre> then `y");
    assert_eq!(doc.assemble(), "```\nx\n```\n then `y");
  }

  #[test]
  fn empty_legacy_block_is_reported() {
    let (doc, diags) = parse("a{{{ }}}b <pre>\n</pre>");
    assert_eq!(doc.assemble(), "ab ");
    assert_eq!(diags.len(), 2);
    assert!(diags.iter().all(|d| d.kind == DiagnosticKind::EmptyLiteral));
    assert_eq!(diags[0].fragment, "{{{ }}}");
  }

  #[test]
  fn normalize_unifies_line_endings() {
    assert_eq!(normalize("a\r\nb\rc\u{E000}"), "a\nb\nc");
  }
}
