mod auth_commands;
mod config_commands;
mod run;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use mergebot_config::MergebotConfig;

#[derive(Parser)]
#[command(name = "mergebot", about = "mergebot: merge media files sent over Telegram")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of searching the standard locations.
    #[arg(long, global = true, env = "MERGEBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default when no subcommand is provided).
    Run,
    /// Allow a user to submit merge jobs.
    Authorize {
        /// Numeric Telegram user id.
        user_id: String,
    },
    /// Withdraw a user's permission.
    Revoke {
        /// Numeric Telegram user id.
        user_id: String,
    },
    /// Set a user's merge mode (video, audio, mixed).
    Mode { user_id: String, mode: String },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load config from `--config` or the standard locations, with the
/// environment applied on top.
pub(crate) fn load_config(
    explicit: Option<&Path>,
) -> anyhow::Result<(MergebotConfig, Option<PathBuf>)> {
    Ok(mergebot_config::load_from(explicit)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The deployment keeps its secrets in config.env; it wins over the
    // inherited environment, a plain .env does not.
    dotenvy::from_filename_override("config.env").ok();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "mergebot starting");

    let config_path = cli.config.as_deref();
    match cli.command {
        None | Some(Commands::Run) => run::run_bot(config_path).await,
        Some(Commands::Authorize { user_id }) => {
            auth_commands::authorize(config_path, &user_id).await
        },
        Some(Commands::Revoke { user_id }) => auth_commands::revoke(config_path, &user_id).await,
        Some(Commands::Mode { user_id, mode }) => {
            auth_commands::set_mode(config_path, &user_id, &mode).await
        },
        Some(Commands::Config { action }) => config_commands::handle_config(config_path, action),
    }
}
