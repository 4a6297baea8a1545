use std::collections::HashMap;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::RwLock,
};

use mergebot_common::{MergeMode, UserId};

use crate::Result;

/// Stored preferences for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrefs {
    /// Whether the user may submit merge jobs.
    pub allowed: bool,
    pub merge_mode: MergeMode,
}

/// Persistent lookup/update of per-user preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// `Ok(None)` when the user has never been stored.
    async fn get_user_prefs(&self, user: UserId) -> Result<Option<UserPrefs>>;
    async fn set_user_prefs(&self, user: UserId, prefs: UserPrefs) -> Result<()>;
}

/// Process-local preference store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryPreferenceStore {
    prefs: RwLock<HashMap<UserId, UserPrefs>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get_user_prefs(&self, user: UserId) -> Result<Option<UserPrefs>> {
        Ok(self.prefs.read().await.get(&user).copied())
    }

    async fn set_user_prefs(&self, user: UserId, prefs: UserPrefs) -> Result<()> {
        self.prefs.write().await.insert(user, prefs);
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_has_no_prefs() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(store.get_user_prefs(UserId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryPreferenceStore::new();
        let prefs = UserPrefs {
            allowed: true,
            merge_mode: MergeMode::AudioMerge,
        };
        store.set_user_prefs(UserId(1), prefs).await.unwrap();
        assert_eq!(store.get_user_prefs(UserId(1)).await.unwrap(), Some(prefs));
        assert_eq!(store.get_user_prefs(UserId(2)).await.unwrap(), None);
    }
}
