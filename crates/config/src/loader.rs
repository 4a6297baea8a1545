use std::path::{Path, PathBuf};

use {
    mergebot_common::MergeMode,
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::MergebotConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "mergebot.toml",
    "mergebot.yaml",
    "mergebot.yml",
    "mergebot.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<MergebotConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Load an explicitly named file, or discover one. Environment overrides are
/// applied in both cases. Returns the file that was used, if any.
pub fn load_from(explicit: Option<&Path>) -> Result<(MergebotConfig, Option<PathBuf>)> {
    let (mut config, path) = match explicit {
        Some(path) => (load_config(path)?, Some(path.to_path_buf())),
        None => {
            let path = find_config_file();
            let config = match &path {
                Some(path) => load_config(path)?,
                None => MergebotConfig::default(),
            };
            (config, path)
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok((config, path))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./mergebot.{toml,yaml,yml,json}`
/// 2. `~/.config/mergebot/mergebot.{toml,yaml,yml,json}`
///
/// A broken file is logged and replaced by the defaults.
pub fn discover_and_load() -> MergebotConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    MergebotConfig::default()
}

/// First config file in the standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// The user-global config directory (`~/.config/mergebot/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "mergebot").map(|d| d.config_dir().to_path_buf())
}

/// Apply the deployment environment on top of the parsed file.
///
/// `BOT_TOKEN`, `OWNER`, `OWNER_USERNAME`, `DATABASE_URL`, `FFMPEG_PATH`
/// and `MERGE_MODE` win over whatever the file says. Malformed numbers are
/// logged and ignored.
pub fn apply_env_overrides(config: &mut MergebotConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = var("BOT_TOKEN") {
        config.telegram.token = Secret::new(token.trim().to_string());
    }
    if let Some(owner) = var("OWNER") {
        match owner.trim().parse() {
            Ok(id) => config.telegram.owner_id = id,
            Err(_) => warn!(value = %owner, "ignoring OWNER, not a numeric user id"),
        }
    }
    if let Some(username) = var("OWNER_USERNAME") {
        config.telegram.owner_username = username.trim().trim_start_matches('@').to_string();
    }
    if let Some(url) = var("TELEGRAM_API_URL") {
        config.telegram.api_url = Some(url.trim().to_string());
    }
    if let Some(url) = var("DATABASE_URL") {
        config.storage.database_url = url;
    }
    if let Some(path) = var("FFMPEG_PATH") {
        config.merge.ffmpeg_path = PathBuf::from(path);
    }
    if let Some(mode) = var("MERGE_MODE") {
        match mode.parse::<MergeMode>() {
            Ok(mode) => config.defaults.merge_mode = mode,
            Err(e) => warn!(error = %e, "ignoring MERGE_MODE"),
        }
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<MergebotConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, secrecy::ExposeSecret};

    #[rstest]
    #[case("mergebot.toml", "[telegram]\nowner_id = 7\nowner_username = \"boss\"\n")]
    #[case("mergebot.yaml", "telegram:\n  owner_id: 7\n  owner_username: boss\n")]
    #[case("mergebot.json", r#"{"telegram": {"owner_id": 7, "owner_username": "boss"}}"#)]
    fn loads_every_format(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.telegram.owner_id, 7);
        assert_eq!(cfg.telegram.owner_username, "boss");
        assert_eq!(cfg.merge.timeout_secs, 3600);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergebot.ini");
        std::fs::write(&path, "owner=1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mergebot.toml");
        std::fs::write(&path, "[telegram\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("mergebot.toml"), "{err}");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_config(Path::new("/nonexistent/mergebot.toml")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = MergebotConfig::default();
        cfg.telegram.owner_id = 1;
        apply_env_overrides(&mut cfg, |name| match name {
            "BOT_TOKEN" => Some(" 123:ABC ".into()),
            "OWNER" => Some("99".into()),
            "OWNER_USERNAME" => Some("@boss".into()),
            "FFMPEG_PATH" => Some("/opt/ffmpeg".into()),
            "MERGE_MODE" => Some("2".into()),
            "TELEGRAM_API_URL" => Some("http://127.0.0.1:8081/ ".into()),
            _ => None,
        });
        assert_eq!(cfg.telegram.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.telegram.owner_id, 99);
        assert_eq!(cfg.telegram.owner_username, "boss");
        assert_eq!(cfg.merge.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(cfg.defaults.merge_mode, MergeMode::AudioMerge);
        assert_eq!(
            cfg.telegram.api_url.as_deref(),
            Some("http://127.0.0.1:8081/")
        );
        assert_eq!(cfg.storage.database_url, "sqlite://mergebot.db?mode=rwc");
    }

    #[test]
    fn malformed_owner_is_ignored() {
        let mut cfg = MergebotConfig::default();
        cfg.telegram.owner_id = 5;
        apply_env_overrides(&mut cfg, |name| (name == "OWNER").then(|| "boss".into()));
        assert_eq!(cfg.telegram.owner_id, 5);
    }
}
