//! Content digests for changesets.
//!
//! A digest is a SHA-256 over length-prefixed parts, so `("ab", "c")` and
//! `("a", "bc")` never collide. Write adapters compare it against what they
//! already applied.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub(crate) struct ContentDigest(Sha256);

impl ContentDigest {
  pub(crate) fn new(domain: &str) -> Self {
    let mut digest = Self(Sha256::new());
    digest.part(domain);
    digest
  }

  pub(crate) fn part(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
    let bytes = bytes.as_ref();
    self.0.update((bytes.len() as u64).to_le_bytes());
    self.0.update(bytes);
    self
  }

  /// Distinguishes `None` from an empty string.
  pub(crate) fn optional(&mut self, bytes: Option<impl AsRef<[u8]>>) -> &mut Self {
    match bytes {
      Some(bytes) => {
        self.0.update([1u8]);
        self.part(bytes)
      }
      None => {
        self.0.update([0u8]);
        self
      }
    }
  }

  pub(crate) fn time(&mut self, at: DateTime<Utc>) -> &mut Self {
    self.0.update(at.timestamp_micros().to_le_bytes());
    self
  }

  pub(crate) fn finish(self) -> String { hex::encode(self.0.finalize()) }
}
