//! Configuration loading, env substitution, overrides and validation.
//!
//! Config files: `mergebot.toml`, `mergebot.yaml`/`.yml`, or `mergebot.json`.
//! Searched in `./` then the user config directory (`~/.config/mergebot/`).
//!
//! `${ENV_VAR}` placeholders are substituted before parsing; the variables
//! the original deployment used (`BOT_TOKEN`, `OWNER`, ...) override the file
//! afterwards.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
        load_from,
    },
    schema::{DefaultsConfig, MergeConfig, MergebotConfig, StorageConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
