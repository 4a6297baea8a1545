use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    mergebot_auth::{AuthGate, SqlitePreferenceStore},
    mergebot_common::{MergeMode, UserId},
    mergebot_config::MergebotConfig,
};

/// Open the preference database and run pending migrations.
pub(crate) async fn open_store(config: &MergebotConfig) -> Result<SqlitePreferenceStore> {
    let url = &config.storage.database_url;
    let pool = sqlx::SqlitePool::connect(url)
        .await
        .with_context(|| format!("failed to open {url}"))?;
    mergebot_auth::run_migrations(&pool).await?;
    Ok(SqlitePreferenceStore::new(pool))
}

async fn gate(config_path: Option<&Path>) -> Result<AuthGate> {
    let (config, _) = crate::load_config(config_path)?;
    let store = open_store(&config).await?;
    Ok(AuthGate::new(Arc::new(store), config.telegram.owner())
        .with_default_mode(config.defaults.merge_mode))
}

fn parse_user(user_id: &str) -> Result<UserId> {
    Ok(user_id.parse::<UserId>()?)
}

pub async fn authorize(config_path: Option<&Path>, user_id: &str) -> Result<()> {
    let user = parse_user(user_id)?;
    gate(config_path).await?.authorize(user).await?;
    println!("User {user} may now use the bot.");
    Ok(())
}

pub async fn revoke(config_path: Option<&Path>, user_id: &str) -> Result<()> {
    let user = parse_user(user_id)?;
    let gate = gate(config_path).await?;
    gate.revoke(user).await?;
    if user == gate.owner() {
        println!("User {user} is the owner and keeps access regardless.");
    } else {
        println!("User {user} can no longer use the bot.");
    }
    Ok(())
}

pub async fn set_mode(config_path: Option<&Path>, user_id: &str, mode: &str) -> Result<()> {
    let user = parse_user(user_id)?;
    let mode = mode.parse::<MergeMode>()?;
    gate(config_path).await?.set_merge_mode(user, mode).await?;
    println!("User {user} now merges in {mode} mode.");
    Ok(())
}
