//! Whole-pipeline tests: worked examples, diagnostics, and properties over
//! generated legacy documents.

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::{Context, DiagnosticKind, Dialect, MarkupConfig, translate, translate_report};

fn dialect() -> Dialect {
  MarkupConfig::default().compile().expect("default config compiles")
}

fn pages() -> BTreeSet<String> {
  ["Home", "Build Guide"].into_iter().map(String::from).collect()
}

fn attachments() -> BTreeSet<String> {
  ["spec.pdf"].into_iter().map(String::from).collect()
}

fn tr(input: &str) -> String {
  let (dialect, pages, files) = (dialect(), pages(), attachments());
  let ctx = Context::new(&dialect, "test page").pages(&pages).attachments(&files);
  translate(input, &ctx)
}

// ─── Examples ────────────────────────────────────────────────────────────────

#[test]
fn documented_examples() {
  assert_eq!(tr("h2. Title"), "## Title");
  assert_eq!(tr("!image.png!"), "![image.png](image.png)");
  assert_eq!(tr("[[Home|Start]]"), "[[Start|Home]]");
}

#[test]
fn literal_content_is_untouched() {
  assert_eq!(
    tr("<pre>[[not a link]] h1. x</pre>"),
    "`[[not a link]] h1. x`"
  );
  assert_eq!(
    tr("{{{\n[[not a link]]\n# a\n# b\n}}}"),
    "```\n[[not a link]]\n# a\n# b\n```"
  );
}

#[test]
fn full_page() {
  let legacy = "h1. Build\r\nSteps:\r\n# fetch\r\n# make\r\n\
                Run @make@ then see [[Home|Start]].\r\n\
                <pre>\r\n$ ./configure\r\n$ make\r\n</pre>\r\n\
                |_. Flag |_. Meaning |\r\n| -v | verbose |\r\n\
                ----\r\n\
                https://www.assembla.com/spaces/demo/tickets/3";
  let expected = "# Build\n\nSteps:\n1. fetch\n1. make\n\
                  Run `make` then see [[Start|Home]].\n\
                  ```\n$ ./configure\n$ make\n```\n\n\
                  | Flag | Meaning |\n| --- | --- |\n| -v | verbose |\n\n\
                  ---\n\
                  #3";
  let once = tr(legacy);
  assert_eq!(once, expected);
  assert_eq!(tr(&once), once);
}

#[test]
fn inline_code_can_be_disabled() {
  let dialect = MarkupConfig {
    inline_code: false,
    ..MarkupConfig::default()
  }
  .compile()
  .unwrap();
  let ctx = Context::new(&dialect, "test");
  assert_eq!(translate("run @make@", &ctx), "run @make@");
}

#[test]
fn diagnostics_name_the_owner_and_fragment() {
  let (dialect, pages, files) = (dialect(), pages(), attachments());
  let ctx = Context::new(&dialect, "ticket #9").pages(&pages).attachments(&files);
  let out = translate_report(
    "[[Nowhere]] [[file:gone.zip]] https://www.assembla.com/spaces/demo/stream <pre>x",
    &ctx,
  );
  let kinds: Vec<DiagnosticKind> = out.diagnostics.iter().map(|d| d.kind).collect();
  assert_eq!(kinds, vec![
    DiagnosticKind::UnterminatedLiteral,
    DiagnosticKind::UnresolvedReference,
    DiagnosticKind::MissingAttachment,
    DiagnosticKind::UnresolvedUrl,
  ]);
  assert!(out.diagnostics.iter().all(|d| d.owner == "ticket #9"));
  assert_eq!(out.diagnostics[1].fragment, "[[Nowhere]]");
  assert!(out.text.starts_with("[[Nowhere]] [gone.zip](attachments/gone.zip)"));
}

#[test]
fn legacy_blocks_next_to_stray_backticks_stay_literal() {
  for input in ["Type `ls <pre>!a.png!</pre> here", "`#<pre>!a.png!</pre>"] {
    let once = tr(input);
    assert!(once.contains("\n!a.png!\n"), "{once:?}");
    assert_eq!(tr(&once), once);
  }
}

#[test]
fn source_urls_in_links_resolve_once() {
  assert_eq!(
    tr("[[url:https://www.assembla.com/spaces/demo/wiki/Build_Guide|the guide]]"),
    "[[the guide|Build_Guide]]"
  );
  for input in [
    "[[Home|https://www.assembla.com/spaces/demo/tickets/4]]",
    "http://www.assembla.com/spaces/demo/wiki/Home@x@#",
  ] {
    let once = tr(input);
    assert_eq!(tr(&once), once, "{input:?}");
  }
  assert_eq!(tr("http://www.assembla.com/spaces/demo/wiki/Home@x@#"), "[[Home]]@x@#");
}

// ─── Properties ──────────────────────────────────────────────────────────────

const FRAGMENTS: &[&str] = &[
  "h1. Intro",
  "h3. Deep dive",
  "# first\n# second",
  "# first\n## nested\n# third",
  "* item\n** sub\n*** subsub",
  "!diagram.png!",
  "Use @make check@ to verify.",
  "-----",
  "[[Home]]",
  "See [[Home|Start]] or [[Build Guide]].",
  "[[Missing Page]]",
  "[[url:http://example.com|Example]] and [[url:http://example.org]]",
  "[[file:spec.pdf|Spec]] [[image:logo.png]]",
  "|_. A |_. B |\n| 1 | 2 |",
  "||X||Y||\n|a|b|",
  "|a|b|\n|c|d|",
  "<pre>[[not a link]] h1. x</pre>",
  "{{{\nline one\n* two\n}}}",
  "<pre><code>a\nb</code></pre>",
  "see https://www.assembla.com/spaces/demo/tickets/7 now",
  "http://www.assembla.com/spaces/demo/wiki/Home",
  "`already code`",
  "Type `ls <pre>!a.png!</pre> here",
  "`#<pre>!a.png!</pre>",
  "[[url:https://www.assembla.com/spaces/demo/wiki/Build_Guide|the guide]]",
  "[[Home|https://www.assembla.com/spaces/demo/tickets/4]]",
  "http://www.assembla.com/spaces/demo/wiki/Home@x@#",
  "```\nfenced [[x]]\n```",
  "plain words, nothing else",
  "",
];

const SEPARATORS: &[&str] = &["\n", "\n\n", "\r\n"];

fn document() -> impl Strategy<Value = String> {
  prop::collection::vec(
    (prop::sample::select(FRAGMENTS), prop::sample::select(SEPARATORS)),
    0..12,
  )
  .prop_map(|parts| {
    parts
      .into_iter()
      .map(|(fragment, sep)| format!("{fragment}{sep}"))
      .collect::<String>()
  })
}

proptest! {
  #![proptest_config(ProptestConfig {
    cases: 128,
    ..Default::default()
  })]

  #[test]
  fn translation_is_idempotent(doc in document()) {
    let once = tr(&doc);
    prop_assert_eq!(tr(&once), once);
  }

  #[test]
  fn literal_blocks_survive_verbatim(
    before in "[a-z ]{0,20}",
    content in "[a-zA-Z\\[][a-zA-Z\\[\\]|*#!@ .]{0,40}",
    after in "[a-z ]{0,20}",
  ) {
    let out = tr(&format!("{before}{{{{{{{content}}}}}}}{after}"));
    prop_assert!(
      out.contains(&format!("`{}`", content.trim_end())),
      "{:?} lost literal {:?}",
      out,
      content
    );
  }

  #[test]
  fn headerless_tables_gain_one_header(
    rows in prop::collection::vec(prop::collection::vec("[a-z0-9]{1,5}", 3), 1..5),
  ) {
    let table: Vec<String> = rows.iter().map(|r| format!("|{}|", r.join("|"))).collect();
    let out = tr(&table.join("\n"));
    let lines: Vec<&str> = out.lines().collect();
    prop_assert_eq!(lines.len(), rows.len() + 2);
    prop_assert_eq!(lines[0], "| | | |");
    prop_assert_eq!(lines[1], "| --- | --- | --- |");
    let expected: Vec<&str> = table.iter().map(String::as_str).collect();
    prop_assert_eq!(&lines[2..], expected.as_slice());
  }
}
