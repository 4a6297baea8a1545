//! Startup checks on a loaded configuration.

use std::{fmt, path::PathBuf};

use secrecy::ExposeSecret;

use crate::schema::MergebotConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "telegram.token"
    pub path: &'static str,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Any diagnostic that should stop the bot from starting.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

pub fn validate(config: &MergebotConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    let tg = &config.telegram;

    if tg.token.expose_secret().trim().is_empty() {
        result.push(
            Severity::Error,
            "telegram.token",
            "bot token is empty (set it in the config file or BOT_TOKEN)",
        );
    } else if !tg.token.expose_secret().contains(':') {
        result.push(
            Severity::Warning,
            "telegram.token",
            "does not look like a BotFather token (<id>:<secret>)",
        );
    }
    if tg.owner_id == 0 {
        result.push(
            Severity::Error,
            "telegram.owner_id",
            "owner id is not set (set it in the config file or OWNER)",
        );
    }
    if tg.owner_username.trim().is_empty() {
        result.push(
            Severity::Warning,
            "telegram.owner_username",
            "denial messages will not name a contact",
        );
    }
    if tg.poll_timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "telegram.poll_timeout_secs",
            "0 turns long polling into busy polling",
        );
    }
    if let Some(url) = &tg.api_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        result.push(
            Severity::Error,
            "telegram.api_url",
            "must be an http:// or https:// URL",
        );
    }

    let merge = &config.merge;
    if merge.timeout_secs == 0 {
        result.push(Severity::Error, "merge.timeout_secs", "must be greater than 0");
    }
    if merge.max_concurrent_jobs == Some(0) {
        result.push(
            Severity::Error,
            "merge.max_concurrent_jobs",
            "0 would never run a job; remove the key to run uncapped",
        );
    }
    if merge.ffmpeg_path.as_os_str().is_empty() {
        result.push(Severity::Error, "merge.ffmpeg_path", "must not be empty");
    }
    if merge.work_dir.as_os_str().is_empty() {
        result.push(Severity::Error, "merge.work_dir", "must not be empty");
    }

    if !config.storage.database_url.starts_with("sqlite:") {
        result.push(
            Severity::Error,
            "storage.database_url",
            "only sqlite: URLs are supported",
        );
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn valid() -> MergebotConfig {
        let mut cfg = MergebotConfig::default();
        cfg.telegram.token = Secret::new("123:ABC".into());
        cfg.telegram.owner_id = 42;
        cfg.telegram.owner_username = "boss".into();
        cfg
    }

    fn paths(result: &ValidationResult, severity: Severity) -> Vec<&'static str> {
        result
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.path)
            .collect()
    }

    #[test]
    fn complete_config_is_clean() {
        let result = validate(&valid());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn defaults_miss_token_and_owner() {
        let result = validate(&MergebotConfig::default());
        assert!(result.has_errors());
        assert_eq!(paths(&result, Severity::Error), [
            "telegram.token",
            "telegram.owner_id"
        ]);
    }

    #[test]
    fn zero_limits_are_errors() {
        let mut cfg = valid();
        cfg.merge.timeout_secs = 0;
        cfg.merge.max_concurrent_jobs = Some(0);
        let result = validate(&cfg);
        assert_eq!(result.count(Severity::Error), 2);
        assert_eq!(paths(&result, Severity::Error), [
            "merge.timeout_secs",
            "merge.max_concurrent_jobs"
        ]);
    }

    #[test]
    fn odd_token_is_only_a_warning() {
        let mut cfg = valid();
        cfg.telegram.token = Secret::new("nocolon".into());
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(paths(&result, Severity::Warning), ["telegram.token"]);
    }

    #[test]
    fn api_url_needs_a_scheme() {
        let mut cfg = valid();
        cfg.telegram.api_url = Some("localhost:8081".into());
        assert_eq!(paths(&validate(&cfg), Severity::Error), ["telegram.api_url"]);

        cfg.telegram.api_url = Some("http://localhost:8081".into());
        assert!(!validate(&cfg).has_errors());
    }

    #[test]
    fn diagnostic_display() {
        let d = Diagnostic {
            severity: Severity::Error,
            path: "merge.timeout_secs",
            message: "must be greater than 0".into(),
        };
        assert_eq!(d.to_string(), "error: merge.timeout_secs: must be greater than 0");
    }
}
