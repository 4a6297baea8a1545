//! Map inbound chat events onto the queue manager and dispatcher.
//!
//! Event flow:
//! 1. Media → authorization → submit → status text with Merge Now / Cancel
//! 2. Merge Now → request merge → "Starting merge…" → dispatch → outcome
//! 3. Cancel → reset the queue → confirmation
//! 4. `/start`, `/help` → greeting or denial, usage text
//!
//! Every rejection ends up as a text for the user; nothing here is fatal.
//! [`EventLanes`] keeps each user's events in arrival order while merges run
//! in the background.

pub mod error;
pub mod event;
pub mod lanes;
pub mod messages;
pub mod outbox;
pub mod router;

pub use {
    error::{Error, Result},
    event::{Button, InboundEvent},
    lanes::EventLanes,
    outbox::Outbox,
    router::{ConversationRouter, PendingMerge},
};
