//! SQLite-backed preference store.

use std::time::{SystemTime, UNIX_EPOCH};

use {async_trait::async_trait, tracing::warn};

use mergebot_common::{MergeMode, UserId};

use crate::{
    Result,
    prefs::{PreferenceStore, UserPrefs},
};

#[derive(sqlx::FromRow)]
struct PrefsRow {
    allowed: bool,
    merge_mode: String,
}

impl PrefsRow {
    fn into_prefs(self, user: UserId) -> UserPrefs {
        let merge_mode = self.merge_mode.parse::<MergeMode>().unwrap_or_else(|e| {
            warn!(user_id = %user, error = %e, "stored merge mode unreadable, using default");
            MergeMode::default()
        });
        UserPrefs {
            allowed: self.allowed,
            merge_mode,
        }
    }
}

pub struct SqlitePreferenceStore {
    pool: sqlx::SqlitePool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl SqlitePreferenceStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for SqlitePreferenceStore {
    async fn get_user_prefs(&self, user: UserId) -> Result<Option<UserPrefs>> {
        let row = sqlx::query_as::<_, PrefsRow>(
            "SELECT allowed, merge_mode FROM user_prefs WHERE user_id = ?",
        )
        .bind(user.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.into_prefs(user)))
    }

    async fn set_user_prefs(&self, user: UserId, prefs: UserPrefs) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO user_prefs (user_id, allowed, merge_mode, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(user_id) DO UPDATE SET
                 allowed = excluded.allowed,
                 merge_mode = excluded.merge_mode,
                 updated_at = excluded.updated_at"#,
        )
        .bind(user.0)
        .bind(prefs.allowed)
        .bind(prefs.merge_mode.as_str())
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqlitePreferenceStore {
        let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::run_migrations(&pool).await.unwrap();
        SqlitePreferenceStore::new(pool)
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = test_store().await;
        assert!(store.get_user_prefs(UserId(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = test_store().await;
        let prefs = UserPrefs {
            allowed: true,
            merge_mode: MergeMode::MixedMerge,
        };
        store.set_user_prefs(UserId(7), prefs).await.unwrap();
        assert_eq!(store.get_user_prefs(UserId(7)).await.unwrap(), Some(prefs));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = test_store().await;
        store
            .set_user_prefs(UserId(7), UserPrefs {
                allowed: true,
                merge_mode: MergeMode::VideoMerge,
            })
            .await
            .unwrap();
        store
            .set_user_prefs(UserId(7), UserPrefs {
                allowed: false,
                merge_mode: MergeMode::AudioMerge,
            })
            .await
            .unwrap();
        let prefs = store.get_user_prefs(UserId(7)).await.unwrap().unwrap();
        assert!(!prefs.allowed);
        assert_eq!(prefs.merge_mode, MergeMode::AudioMerge);
    }

    #[tokio::test]
    async fn unreadable_mode_falls_back_to_default() {
        let store = test_store().await;
        sqlx::query(
            "INSERT INTO user_prefs (user_id, allowed, merge_mode, updated_at) VALUES (9, 1, 'karaoke', 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        let prefs = store.get_user_prefs(UserId(9)).await.unwrap().unwrap();
        assert!(prefs.allowed);
        assert_eq!(prefs.merge_mode, MergeMode::VideoMerge);
    }
}
