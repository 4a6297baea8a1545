//! Authorization gate and user preference storage.
//!
//! This crate provides:
//! - `PreferenceStore`: lookup/update of per-user preferences (allowed flag, merge mode)
//! - `SqlitePreferenceStore` and `MemoryPreferenceStore` implementations
//! - `AuthGate`: the single place where "may this user submit jobs" is decided

pub mod error;
pub mod gate;
pub mod prefs;
pub mod sqlite;

pub use {
    error::{Error, Result},
    gate::{AuthGate, Principal},
    prefs::{MemoryPreferenceStore, PreferenceStore, UserPrefs},
    sqlite::SqlitePreferenceStore,
};

/// Run database migrations for the auth crate.
///
/// Creates the `user_prefs` table. Should be called at application startup
/// before the preference store is used.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
