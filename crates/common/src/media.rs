//! Media classification: attachment kinds, merge modes and the extension
//! sets each mode accepts.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "aac", "ac3", "eac3", "m4a", "mka", "thd", "dts", "mp3", "ogg", "opus", "wav", "flac",
];

pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "mka", "mks"];

/// How the transport delivered an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Document,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        };
        f.write_str(s)
    }
}

/// The user's configured merge mode. Decides which extensions are accepted
/// into the queue and the container of the merged output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeMode {
    #[default]
    #[serde(rename = "video")]
    VideoMerge,
    #[serde(rename = "audio")]
    AudioMerge,
    #[serde(rename = "mixed")]
    MixedMerge,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoMerge => "video",
            Self::AudioMerge => "audio",
            Self::MixedMerge => "mixed",
        }
    }

    /// Whether a lower-cased extension may enter a queue in this mode.
    pub fn accepts(&self, extension: &str) -> bool {
        match self {
            Self::VideoMerge => VIDEO_EXTENSIONS.contains(&extension),
            Self::AudioMerge => AUDIO_EXTENSIONS.contains(&extension),
            Self::MixedMerge => {
                VIDEO_EXTENSIONS.contains(&extension)
                    || AUDIO_EXTENSIONS.contains(&extension)
                    || SUBTITLE_EXTENSIONS.contains(&extension)
            },
        }
    }

    /// Container extension of the merged file.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::VideoMerge | Self::MixedMerge => "mkv",
            Self::AudioMerge => "mka",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MergeMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" | "1" => Ok(Self::VideoMerge),
            "audio" | "2" => Ok(Self::AudioMerge),
            "mixed" | "3" => Ok(Self::MixedMerge),
            other => Err(crate::Error::message(format!("unknown merge mode: {other}"))),
        }
    }
}

/// Extension declared by a file name: the text after the last `.`,
/// lower-cased. `None` when nothing usable remains.
pub fn declared_extension(file_name: &str) -> Option<String> {
    let ext = file_name.trim().rsplit('.').next()?.trim().to_lowercase();
    if ext.is_empty() { None } else { Some(ext) }
}
