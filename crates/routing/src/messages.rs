//! User-facing texts.

use {
    mergebot_common::MergeMode,
    mergebot_sessions::{MIN_MERGE_INPUTS, MergeFailure, MergeJob, RejectReason},
};

pub const FILE_NAME_NOT_FOUND: &str =
    "File name not found. Please re-upload or contact the bot owner.";
pub const MERGE_STARTING: &str = "Starting merge process...";
pub const MERGE_CANCELED: &str = "Merge process canceled.";
pub const ALREADY_MERGING: &str =
    "A merge is already running. Wait for the result before sending more files.";
pub const OWNER_STARTED: &str = "Bot Started!";
/// Appended when Telegram refused to hand out a file because of its size.
pub const FILE_TOO_BIG_HINT: &str = "\n\nTelegram only lets bots download files up to 20 MB. \
     Send smaller files, or ask the owner to run the bot against a local Bot API server.";

/// What a file counts as in the status line.
fn item_noun(mode: MergeMode) -> &'static str {
    match mode {
        MergeMode::VideoMerge => "Video",
        MergeMode::AudioMerge => "Audio",
        MergeMode::MixedMerge => "File",
    }
}

pub fn saved(mode: MergeMode, queued: usize) -> String {
    format!(
        "{} {queued} saved. Send me more, or press 'Merge Now' when done.",
        item_noun(mode)
    )
}

pub fn unauthorized(display_name: &str, owner_username: &str) -> String {
    format!(
        "Hi {display_name}\n\nYou are unauthorized to use this bot.\nContact: @{owner_username}"
    )
}

pub fn start_denied(display_name: &str, owner_username: &str) -> String {
    format!(
        "Hi {display_name}\n\nSorry, you are not authorized to use me.\nContact my Owner: @{owner_username}"
    )
}

pub fn greeting(display_name: &str) -> String {
    format!(
        "Hi {display_name}!\n\nI'm your video merger bot. Send me videos and I will merge them for you!"
    )
}

pub fn help(owner_username: &str) -> String {
    format!(
        "How to use this bot:\n\
         1. Send me the videos you want to merge, in order.\n\
         2. When ready, press 'Merge Now'.\n\
         3. Press 'Cancel' to drop everything you sent so far.\n\
         For more help, contact: @{owner_username}"
    )
}

pub fn unsupported_format(mode: MergeMode) -> &'static str {
    match mode {
        MergeMode::VideoMerge => {
            "This format is not allowed. Only MP4, MKV, or WEBM are supported."
        },
        MergeMode::AudioMerge => {
            "This format is not allowed. Only audio files (MP3, M4A, AAC, FLAC, OPUS, ...) are supported."
        },
        MergeMode::MixedMerge => {
            "This format is not allowed. Send video, audio or subtitle files."
        },
    }
}

pub fn insufficient_items(mode: MergeMode) -> String {
    let noun = match mode {
        MergeMode::VideoMerge => "videos",
        MergeMode::AudioMerge => "audio files",
        MergeMode::MixedMerge => "files",
    };
    format!("You need at least {MIN_MERGE_INPUTS} {noun} to merge.")
}

/// Text for a rejection. `Unauthorized` needs names and is built by the
/// caller with [`unauthorized`].
pub fn rejection(reason: &RejectReason, mode: MergeMode) -> String {
    match reason {
        RejectReason::Unauthorized => "You are unauthorized to use this bot.".into(),
        RejectReason::MissingFileName => FILE_NAME_NOT_FOUND.into(),
        RejectReason::UnsupportedFormat { mode, .. } => unsupported_format(*mode).into(),
        RejectReason::InsufficientItems { .. } => insufficient_items(mode),
        RejectReason::AlreadyMerging => ALREADY_MERGING.into(),
    }
}

pub fn merged_caption(job: &MergeJob) -> String {
    format!("Merged {} files.", job.inputs.len())
}

pub fn merge_failed(job: &MergeJob, failure: &MergeFailure) -> String {
    match failure {
        MergeFailure::ReferenceUnresolved { source_ref, reason } => {
            let name = job
                .inputs
                .iter()
                .find(|item| &item.source_ref == source_ref)
                .map_or(source_ref.as_str(), |item| item.file_name.as_str());
            let mut text = format!(
                "Could not fetch {name} ({reason}). Nothing was merged; please send your files again."
            );
            if reason.to_ascii_lowercase().contains("too big") {
                text.push_str(FILE_TOO_BIG_HINT);
            }
            text
        },
        MergeFailure::EngineError(reason) => {
            format!("Merge failed: {reason}\n\nPlease send your files again.")
        },
        MergeFailure::Cancelled => MERGE_CANCELED.into(),
    }
}

pub fn delivery_failed() -> &'static str {
    "The merge finished but the file could not be sent. Please try again."
}
