//! Table blocks: header rows in target form, a separator under every header,
//! and a blank line before every table.

use crate::doc::{Doc, is_blank, map_lines};

fn is_row(line: &str) -> bool { line.trim_start().starts_with('|') }

/// `| --- | :--: |` and friends.
fn is_separator(line: &str) -> bool {
  let line = line.trim();
  line.starts_with('|')
    && line.contains("---")
    && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

/// Cells of a row written with single pipes.
fn cells(line: &str) -> Vec<String> {
  let line = line.trim();
  let line = line.strip_prefix('|').unwrap_or(line);
  let line = line.strip_suffix('|').unwrap_or(line);
  line.split('|').map(|c| c.trim().to_string()).collect()
}

fn row(cells: &[String]) -> String {
  let mut out = String::from("|");
  for cell in cells {
    if cell.is_empty() {
      out.push_str(" |");
    } else {
      out.push_str(&format!(" {cell} |"));
    }
  }
  out
}

fn separator(columns: usize) -> String {
  let mut out = String::from("|");
  for _ in 0..columns {
    out.push_str(" --- |");
  }
  out
}

/// A legacy header row rewritten into target form, if `line` is one.
fn legacy_header(line: &str) -> Option<Vec<String>> {
  let trimmed = line.trim();
  if trimmed.starts_with("||") {
    let cells = trimmed
      .split("||")
      .map(str::trim)
      .filter(|c| !c.is_empty())
      .map(String::from)
      .collect::<Vec<_>>();
    return (!cells.is_empty()).then_some(cells);
  }
  if trimmed.starts_with("|_.") {
    return Some(
      cells(trimmed)
        .into_iter()
        .map(|c| c.strip_prefix("_.").map_or(c.clone(), |s| s.trim().to_string()))
        .collect(),
    );
  }
  None
}

fn normalize_block(block: &[&str]) -> Vec<String> {
  let mut out = Vec::with_capacity(block.len() + 2);
  let rest: &[&str];
  if let Some(header) = legacy_header(block[0]) {
    out.push(row(&header));
    if !block.get(1).is_some_and(|l| is_separator(l)) {
      out.push(separator(header.len()));
    }
    rest = &block[1..];
  } else if block.get(1).is_some_and(|l| is_separator(l)) {
    rest = block;
  } else {
    let columns = cells(block[0]).len();
    out.push(row(&vec![String::new(); columns]));
    out.push(separator(columns));
    rest = block;
  }
  out.extend(rest.iter().map(|l| l.to_string()));
  out
}

/// Normalise every run of `|` lines.
pub(crate) fn normalize(doc: &mut Doc) {
  doc.text = map_lines(&doc.text, |lines| {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
      let run = lines[i..].iter().take_while(|l| is_row(l)).count();
      if run == 0 {
        out.push(lines[i].to_string());
        i += 1;
        continue;
      }
      if out.last().is_some_and(|l| !is_blank(l)) {
        out.push(String::new());
      }
      out.extend(normalize_block(&lines[i..i + run]));
      i += run;
    }
    out
  });
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Diagnostics;

  fn run(input: &str) -> String {
    let mut diagnostics = Diagnostics::new("test");
    let mut doc = Doc::parse(input, &mut diagnostics);
    normalize(&mut doc);
    doc.assemble()
  }

  #[test]
  fn textile_header_gains_a_separator() {
    assert_eq!(
      run("|_. Name |_. Role |\n| Ann | Dev |"),
      "| Name | Role |\n| --- | --- |\n| Ann | Dev |"
    );
  }

  #[test]
  fn double_pipe_header_is_rewritten() {
    assert_eq!(
      run("intro\n||A||B||C||\n|1|2|3|"),
      "intro\n\n| A | B | C |\n| --- | --- | --- |\n|1|2|3|"
    );
  }

  #[test]
  fn headerless_table_gets_exactly_one_blank_header() {
    let once = run("|a|b|\n|c|d|");
    assert_eq!(once, "| | |\n| --- | --- |\n|a|b|\n|c|d|");
    assert_eq!(run(&once), once);
  }

  #[test]
  fn existing_markdown_tables_are_left_alone() {
    let table = "| A | B |\n|---|---|\n| 1 | 2 |";
    assert_eq!(run(table), table);
  }
}
