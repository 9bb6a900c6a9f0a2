//! Validate → act → respond flows shared by the HTTP handlers and the CLI.
//!
//! `DocumentService` drives any [`taskfy_core::Resource`] against a
//! [`taskfy_db::Database`]; `FileService` drives uploads and listings against
//! a [`taskfy_store::ObjectStore`].

mod documents;
mod files;

pub use documents::{DocumentService, DocumentSettings};
pub use files::{FileService, FileSettings, IncomingFile, KeyPolicy, DEFAULT_URL_EXPIRY};

/// Read an environment variable, treating empty values as unset.
pub(crate) fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
