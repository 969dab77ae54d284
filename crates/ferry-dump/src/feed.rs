//! Supplementary JSON feeds.
//!
//! Both feeds are keyed by the ids the dump uses and accept either a list of
//! objects or an object keyed by id:
//!
//! ```json
//! [{ "id": "u1", "login": "ann", "email": "ann@example.com" }]
//! { "u1": { "login": "ann", "github": "ann-gh" } }
//!
//! [{ "id": 77, "contents": "h1. Home" }]
//! { "77": "h1. Home" }
//! ```

use std::{collections::BTreeMap, io::Read};

use ferry_core::{
  identity::{ExternalIdentity, IdentityFields, UserId},
  record::Key,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

#[derive(Deserialize)]
#[serde(untagged)]
enum UsersFeed {
  List(Vec<ExternalIdentity>),
  Keyed(BTreeMap<String, IdentityFields>),
}

#[derive(Deserialize)]
struct ContentEntry {
  #[serde(alias = "version_id")]
  id:       Value,
  #[serde(alias = "content")]
  contents: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentFeed {
  List(Vec<ContentEntry>),
  Keyed(BTreeMap<String, String>),
}

/// Read an identity feed for [`ferry_core::identity::UserDirectory::merge`].
pub fn read_users<R: Read>(input: R) -> Result<Vec<ExternalIdentity>> {
  let users = match serde_json::from_reader(input)? {
    UsersFeed::List(users) => users,
    UsersFeed::Keyed(map) => map
      .into_iter()
      .map(|(id, fields)| ExternalIdentity {
        id: UserId::new(id),
        fields,
      })
      .collect(),
  };
  tracing::debug!(users = users.len(), "read identity feed");
  Ok(users)
}

/// Read a wiki content feed: revision content keyed by version id. Entries
/// without a usable id or content are skipped with a warning.
pub fn read_wiki_contents<R: Read>(input: R) -> Result<BTreeMap<Key, String>> {
  let contents: BTreeMap<Key, String> = match serde_json::from_reader(input)? {
    ContentFeed::Keyed(map) => map
      .into_iter()
      .filter_map(|(id, text)| Key::parse(&id).map(|key| (key, text)))
      .collect(),
    ContentFeed::List(entries) => entries
      .into_iter()
      .filter_map(|entry| {
        let key = Key::from_value(&entry.id);
        match (key, entry.contents) {
          (Some(key), Some(text)) => Some((key, text)),
          (key, _) => {
            tracing::warn!(id = %entry.id, usable_id = key.is_some(), "skipping content feed entry");
            None
          }
        }
      })
      .collect(),
  };
  tracing::debug!(revisions = contents.len(), "read wiki content feed");
  Ok(contents)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn users_feed_accepts_list_and_keyed_forms() {
    let list = r#"[{"id": "u1", "login": "ann", "email": "ann@example.com"}]"#;
    let users = read_users(list.as_bytes()).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, UserId::new("u1"));
    assert_eq!(users[0].fields.login.as_deref(), Some("ann"));

    let keyed = r#"{"u2": {"name": "Bob", "github": "bob-gh"}}"#;
    let users = read_users(keyed.as_bytes()).unwrap();
    assert_eq!(users[0].id, UserId::new("u2"));
    assert_eq!(users[0].fields.mention.as_deref(), Some("bob-gh"));
  }

  #[test]
  fn content_feed_keys_normalise_to_dump_keys() {
    let keyed = read_wiki_contents(r#"{"77": "h1. Home"}"#.as_bytes()).unwrap();
    assert_eq!(keyed.get(&Key::Int(77)).map(String::as_str), Some("h1. Home"));

    let list = r#"[
      {"id": 78, "contents": "text"},
      {"version_id": "79", "content": "more"},
      {"id": null, "contents": "orphan"},
      {"id": 80}
    ]"#;
    let listed = read_wiki_contents(list.as_bytes()).unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains_key(&Key::Int(78)));
    assert!(listed.contains_key(&Key::Int(79)));
  }

  #[test]
  fn malformed_feeds_are_errors() {
    let err = read_users("{\"u1\": 5}".as_bytes()).unwrap_err();
    assert!(matches!(err, Error::Feed(_)));
  }
}
