use {
    mergebot_common::{FileHandle, MergeMode, SourceRef, UserId},
    uuid::Uuid,
};

use crate::MediaItem;

/// Snapshot of a queue handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub id: Uuid,
    pub owner: UserId,
    /// Submission order, which is also merge order.
    pub inputs: Vec<MediaItem>,
    pub mode: MergeMode,
    /// Queue epoch the snapshot was taken from. A result for an older epoch
    /// belongs to a job the user has since cancelled.
    pub epoch: u64,
    pub outcome: MergeOutcome,
}

impl MergeJob {
    pub(crate) fn new(owner: UserId, inputs: Vec<MediaItem>, mode: MergeMode, epoch: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            inputs,
            mode,
            epoch,
            outcome: MergeOutcome::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Pending,
    Succeeded(FileHandle),
    Failed(MergeFailure),
}

impl MergeOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeFailure {
    /// A queued attachment could no longer be fetched.
    #[error("could not fetch {source_ref}: {reason}")]
    ReferenceUnresolved { source_ref: SourceRef, reason: String },

    #[error("merge engine failed: {0}")]
    EngineError(String),

    /// The queue was reset before the engine was invoked.
    #[error("merge was cancelled")]
    Cancelled,
}
