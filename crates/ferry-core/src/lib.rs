//! Core types for the ferry issue-tracker migration.
//!
//! This crate is deliberately free of I/O. It turns an already-parsed dump
//! ([`record::Dataset`]) into an id-keyed [`index::Index`], a deduplicated
//! [`identity::UserDirectory`], a typed [`model::Catalog`] of tickets and wiki
//! pages, and reconstructed per-ticket [`timeline::Timeline`]s.
//!
//! Data flows strictly upward: dataset → index → identity → catalog →
//! timeline. Every stage is synchronous and single-threaded.

pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod model;
pub mod record;
pub mod timeline;

pub use error::{Error, Result};
