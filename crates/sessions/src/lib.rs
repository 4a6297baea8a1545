//! Per-user merge queues.
//!
//! Accepted attachments are buffered per user in submission order. All queue
//! mutation goes through [`QueueManager`], which serializes work for a single
//! user behind that user's own lock while leaving other users unaffected.
//!
//! ```text
//! Idle ──submit──▶ Collecting ──request_merge──▶ MergeRequested ──begin──▶ Merging
//!   ▲                                                                       │
//!   └──────────── cancel (any state) / finish (Completed or failure) ◀──────┘
//! ```

pub mod error;
pub mod job;
pub mod manager;
pub mod media;
pub mod queue;

pub use {
    error::RejectReason,
    job::{MergeFailure, MergeJob, MergeOutcome},
    manager::{MIN_MERGE_INPUTS, QueueManager, Settlement},
    media::MediaItem,
    queue::{QueueSnapshot, QueueState},
};
