//! Telegram transport for mergebot.
//!
//! Long-polls the Bot API with teloxide, turns private-chat updates into
//! router events, and implements the outgoing side (texts with inline
//! buttons, documents) and file download for the merge dispatcher.

pub mod bot;
pub mod download;
pub mod error;
pub mod handlers;
pub mod outbound;

pub use {
    bot::{connect, notify_owner, spawn_polling},
    download::TelegramResolver,
    error::{Error, Result},
    outbound::TelegramOutbound,
};
