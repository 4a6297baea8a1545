//! Shared identifiers, media classification, and error definitions used across
//! all mergebot crates.

pub mod error;
pub mod media;
pub mod types;

pub use {
    error::{Error, Result},
    media::{MediaKind, MergeMode},
    types::{FileHandle, SourceRef, UserId},
};
