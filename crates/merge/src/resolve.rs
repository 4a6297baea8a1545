use std::path::Path;

use async_trait::async_trait;

use {mergebot_common::FileHandle, mergebot_sessions::MediaItem};

use crate::Result;

/// Turns a queued attachment into a local file.
///
/// Implemented by the transport, which is the only party that knows what a
/// [`mergebot_common::SourceRef`] points at.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    /// Fetch `item` into `dest_dir` and return the local file.
    async fn resolve(&self, item: &MediaItem, dest_dir: &Path) -> Result<FileHandle>;
}
