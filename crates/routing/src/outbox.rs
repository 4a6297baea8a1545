use async_trait::async_trait;

use mergebot_common::{FileHandle, UserId};

use crate::{Result, event::Button};

/// Outgoing side of the chat transport.
///
/// Implementations own their retry policy; the router only logs a failed
/// send and moves on.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Send a text, optionally with inline buttons (one per row).
    async fn send_text(&self, user: UserId, text: &str, buttons: &[Button]) -> Result<()>;

    /// Send a produced file as a document.
    async fn send_file(&self, user: UserId, file: &FileHandle, caption: &str) -> Result<()>;
}
