use thiserror::Error;

use mergebot_common::MergeMode;

use crate::manager::MIN_MERGE_INPUTS;

/// Why a queue operation was refused. Every variant is recoverable and ends
/// up as a message to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("user is not authorized")]
    Unauthorized,

    #[error("attachment has no usable file name")]
    MissingFileName,

    #[error("format .{extension} is not accepted in {mode} merge mode")]
    UnsupportedFormat { extension: String, mode: MergeMode },

    #[error("at least {MIN_MERGE_INPUTS} items are needed to merge, {queued} queued")]
    InsufficientItems { queued: usize },

    #[error("a merge is already in progress")]
    AlreadyMerging,
}
