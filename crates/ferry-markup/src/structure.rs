//! Line-level rewrites: lists, headings, images, inline quotes and
//! horizontal rules.

use std::sync::LazyLock;

use regex::Regex;

use crate::doc::{CLOSE, Doc, OPEN, has_token, is_blank, map_lines};

static LIST_ITEM: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^([#*]+)\s+(.*)$").expect("list item regex"));
static HEADING: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^h([1-6])\.\s+(\S.*)$").expect("heading regex"));
static RULE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*-{4,}\s*$").expect("rule regex"));
static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"!([^!\s\[\]()]+\.(?i:png|jpe?g|gif|bmp|svg|webp))!").expect("image regex")
});
static QUOTE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"@[^@\n]+@").expect("inline quote regex"));

const INDENT: &str = "    ";

// ─── Lists ───────────────────────────────────────────────────────────────────

/// Runs of two or more marker lines containing a `#` become numbered lists,
/// depth expressed by indentation. Outside such runs, `**` and deeper
/// bullets are re-indented. A lone `#` line is left alone; it reads as a
/// heading.
pub(crate) fn lists(doc: &mut Doc) {
  doc.text = map_lines(&doc.text, |lines| {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
      let run = lines[i..]
        .iter()
        .take_while(|l| LIST_ITEM.is_match(l))
        .count();
      if run == 0 {
        out.push(lines[i].to_string());
        i += 1;
        continue;
      }
      let items = &lines[i..i + run];
      let numbered = run >= 2 && items.iter().any(|l| l.starts_with('#'));
      out.extend(items.iter().map(|l| list_item(l, numbered)));
      i += run;
    }
    out
  });
}

fn list_item(line: &str, numbered: bool) -> String {
  let Some(caps) = LIST_ITEM.captures(line) else {
    return line.to_string();
  };
  let marker = &caps[1];
  let depth = marker.len();
  let is_bullet = marker.ends_with('*');
  if !numbered && (marker.contains('#') || depth < 2) {
    return line.to_string();
  }
  let bullet = if is_bullet { "*" } else { "1." };
  format!("{}{bullet} {}", INDENT.repeat(depth - 1), &caps[2])
}

// ─── Headings ────────────────────────────────────────────────────────────────

/// `hN. Title` → `N` hashes, isolated by blank lines.
pub(crate) fn headings(doc: &mut Doc) {
  doc.text = map_lines(&doc.text, |lines| {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut blank_due = false;
    for line in lines {
      match HEADING.captures(line) {
        Some(caps) => {
          if out.last().is_some_and(|l| !is_blank(l)) {
            out.push(String::new());
          }
          let level = caps[1].parse::<usize>().unwrap_or(1);
          out.push(format!("{} {}", "#".repeat(level), caps[2].trim_end()));
          blank_due = true;
        }
        None => {
          if blank_due && !is_blank(line) {
            out.push(String::new());
          }
          out.push(line.to_string());
          blank_due = false;
        }
      }
    }
    out
  });
}

// ─── Inline rewrites ─────────────────────────────────────────────────────────

/// `!file.png!` → `![file.png](file.png)`.
pub(crate) fn images(doc: &mut Doc) {
  doc.text = IMAGE.replace_all(&doc.text, "![$1]($1)").into_owned();
}

/// `@text@` → an inline code span. The quote must stand apart from the
/// surrounding words and protected spans, so email addresses are left
/// alone. Lines with a stray backtick are skipped, since the new span could
/// pair with it on a later pass. The produced span is protected from later
/// stages.
pub(crate) fn inline_quotes(doc: &mut Doc) {
  let text = std::mem::take(&mut doc.text);
  let mut out = String::with_capacity(text.len());
  let mut copied = 0;
  let mut pos = 0;
  while let Some(m) = QUOTE.find_at(&text, pos) {
    let inner = &m.as_str()[1..m.len() - 1];
    let before = text[..m.start()].chars().next_back();
    let after = text[m.end()..].chars().next();
    let standalone = !before.is_some_and(is_word) && !after.is_some_and(is_word);
    let clean = inner.trim() == inner && !inner.contains('`') && !has_token(inner);
    if !(standalone && clean) || line_around(&text, m.start()).contains('`') {
      pos = m.start() + 1;
      continue;
    }
    out.push_str(&text[copied..m.start()]);
    out.push_str(&doc.protect(format!("`{inner}`")));
    copied = m.end();
    pos = m.end();
  }
  out.push_str(&text[copied..]);
  doc.text = out;
}

fn is_word(c: char) -> bool { c.is_alphanumeric() || c == OPEN || c == CLOSE }

/// The full line of `text` containing byte offset `at`.
fn line_around(text: &str, at: usize) -> &str {
  let start = text[..at].rfind('\n').map_or(0, |i| i + 1);
  let end = text[at..].find('\n').map_or(text.len(), |i| at + i);
  &text[start..end]
}

/// Four or more dashes on a line of their own → `---` after a blank line.
pub(crate) fn rules(doc: &mut Doc) {
  doc.text = map_lines(&doc.text, |lines| {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
      if RULE.is_match(line) {
        if out.last().is_some_and(|l| !is_blank(l)) {
          out.push(String::new());
        }
        out.push("---".to_string());
      } else {
        out.push(line.to_string());
      }
    }
    out
  });
}
