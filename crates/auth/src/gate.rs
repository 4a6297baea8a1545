use std::sync::Arc;

use tracing::{debug, info, warn};

use mergebot_common::{MergeMode, UserId};

use crate::{
    Result,
    prefs::{PreferenceStore, UserPrefs},
};

/// Everything the rest of the system needs to know about a caller, resolved
/// with a single store read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    /// Set for the bot owner; skips the allowed check entirely.
    pub bypass_auth: bool,
    pub allowed: bool,
    pub merge_mode: MergeMode,
}

impl Principal {
    pub fn may_submit(&self) -> bool {
        self.bypass_auth || self.allowed
    }
}

/// Decides whether a user may submit jobs.
///
/// Store failures deny: a user whose preferences cannot be read is treated as
/// unauthorized, never as allowed.
pub struct AuthGate {
    store: Arc<dyn PreferenceStore>,
    owner: UserId,
    default_mode: MergeMode,
}

impl AuthGate {
    pub fn new(store: Arc<dyn PreferenceStore>, owner: UserId) -> Self {
        Self {
            store,
            owner,
            default_mode: MergeMode::default(),
        }
    }

    /// Merge mode for users without stored preferences.
    #[must_use]
    pub fn with_default_mode(mut self, mode: MergeMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    fn defaults(&self) -> UserPrefs {
        UserPrefs {
            allowed: false,
            merge_mode: self.default_mode,
        }
    }

    /// Resolve the caller's capabilities.
    pub async fn resolve(&self, user: UserId) -> Principal {
        let bypass_auth = user == self.owner;
        let prefs = match self.store.get_user_prefs(user).await {
            Ok(Some(prefs)) => prefs,
            Ok(None) => self.defaults(),
            Err(e) => {
                warn!(user_id = %user, error = %e, "preference lookup failed, denying");
                self.defaults()
            },
        };
        debug!(
            user_id = %user,
            bypass_auth,
            allowed = prefs.allowed,
            merge_mode = %prefs.merge_mode,
            "resolved principal"
        );
        Principal {
            user_id: user,
            bypass_auth,
            allowed: prefs.allowed,
            merge_mode: prefs.merge_mode,
        }
    }

    pub async fn is_allowed(&self, user: UserId) -> bool {
        self.resolve(user).await.may_submit()
    }

    /// Mark a user as allowed. Calling it for an already allowed user is a
    /// no-op apart from refreshing the stored row.
    pub async fn authorize(&self, user: UserId) -> Result<()> {
        let current = self.store.get_user_prefs(user).await?;
        let prefs = UserPrefs {
            allowed: true,
            ..current.unwrap_or_else(|| self.defaults())
        };
        self.store.set_user_prefs(user, prefs).await?;
        info!(user_id = %user, "user authorized");
        Ok(())
    }

    /// Withdraw a user's permission. The owner keeps bypassing the gate.
    pub async fn revoke(&self, user: UserId) -> Result<()> {
        let current = self.store.get_user_prefs(user).await?;
        let prefs = UserPrefs {
            allowed: false,
            ..current.unwrap_or_else(|| self.defaults())
        };
        self.store.set_user_prefs(user, prefs).await?;
        info!(user_id = %user, "user authorization revoked");
        Ok(())
    }

    /// Persist a new merge mode, keeping the allowed flag as is.
    pub async fn set_merge_mode(&self, user: UserId, mode: MergeMode) -> Result<()> {
        let current = self.store.get_user_prefs(user).await?;
        let prefs = UserPrefs {
            merge_mode: mode,
            ..current.unwrap_or_else(|| self.defaults())
        };
        self.store.set_user_prefs(user, prefs).await
    }
}
