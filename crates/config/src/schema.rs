//! Config schema types (telegram, merge, storage, defaults).
use std::{fmt, path::PathBuf};

use {
    mergebot_common::{MergeMode, UserId},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergebotConfig {
    pub telegram: TelegramConfig,
    pub merge: MergeConfig,
    pub storage: StorageConfig,
    pub defaults: DefaultsConfig,
}

/// Bot account and owner.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Owner's numeric user id. Always allowed, gets the startup notice.
    pub owner_id: i64,

    /// Shown to unauthorized users as the contact to ask for access.
    pub owner_username: String,

    /// Long-polling timeout passed to `getUpdates`.
    pub poll_timeout_secs: u32,

    pub notify_owner_on_start: bool,

    /// Bot API server to talk to instead of `api.telegram.org`. The public
    /// server only hands out files up to 20 MB; a self-hosted
    /// `telegram-bot-api --local` has no such limit.
    pub api_url: Option<String>,
}

impl TelegramConfig {
    pub fn owner(&self) -> UserId {
        UserId(self.owner_id)
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("owner_id", &self.owner_id)
            .field("owner_username", &self.owner_username)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("notify_owner_on_start", &self.notify_owner_on_start)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            owner_id: 0,
            owner_username: String::new(),
            poll_timeout_secs: 30,
            notify_owner_on_start: true,
            api_url: None,
        }
    }
}

/// Merge engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub ffmpeg_path: PathBuf,
    /// Upper bound for one engine run.
    pub timeout_secs: u64,
    /// Jobs allowed to run at once across all users. Unset means no cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_jobs: Option<usize>,
    /// Downloads and merge outputs live under `<work_dir>/<user>/<job>/`.
    pub work_dir: PathBuf,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout_secs: 3600,
            max_concurrent_jobs: None,
            work_dir: PathBuf::from("downloads"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding user preferences.
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://mergebot.db?mode=rwc".into(),
        }
    }
}

/// Values applied to users with no stored preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub merge_mode: MergeMode,
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
