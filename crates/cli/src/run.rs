use std::{path::Path, sync::Arc, time::Duration};

use {
    anyhow::{Context, Result, bail},
    tokio_util::sync::CancellationToken,
    tracing::{error, info, warn},
};

use {
    mergebot_auth::AuthGate,
    mergebot_config::{Severity, validate},
    mergebot_merge::{Dispatcher, FfmpegEngine},
    mergebot_routing::ConversationRouter,
    mergebot_sessions::QueueManager,
    mergebot_telegram::{TelegramOutbound, TelegramResolver},
};

use crate::auth_commands::open_store;

/// Start the bot and block until Ctrl-C or until polling stops on its own.
pub async fn run_bot(config_path: Option<&Path>) -> Result<()> {
    let (config, path) = crate::load_config(config_path)?;
    if let Some(path) = &path {
        info!(path = %path.display(), "loaded config");
    }

    let report = validate(&config);
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = d.path, "{}", d.message),
            Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if report.has_errors() {
        bail!(
            "configuration has {} error(s); run `mergebot config check` for details",
            report.count(Severity::Error)
        );
    }

    let work_dir = config.merge.work_dir.clone();
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("failed to create work dir {}", work_dir.display()))?;

    let store = open_store(&config).await?;
    let gate = Arc::new(
        AuthGate::new(Arc::new(store), config.telegram.owner())
            .with_default_mode(config.defaults.merge_mode),
    );
    let queues = Arc::new(QueueManager::new(gate));

    let bot = mergebot_telegram::connect(&config.telegram).await?;

    let engine = FfmpegEngine::new(
        config.merge.ffmpeg_path.clone(),
        Duration::from_secs(config.merge.timeout_secs),
    );
    let mut dispatcher = Dispatcher::new(
        Arc::clone(&queues),
        Arc::new(TelegramResolver::new(bot.clone())),
        Arc::new(engine),
        work_dir,
    );
    if let Some(max) = config.merge.max_concurrent_jobs {
        dispatcher = dispatcher.with_max_concurrent(max);
    }

    let router = Arc::new(ConversationRouter::new(
        queues,
        Arc::new(dispatcher),
        Arc::new(TelegramOutbound::new(bot.clone())),
        config.telegram.owner_username.clone(),
    ));

    mergebot_telegram::notify_owner(&bot, &config.telegram).await;

    let cancel = CancellationToken::new();
    let polling = mergebot_telegram::spawn_polling(
        bot,
        router,
        config.telegram.poll_timeout_secs,
        cancel.clone(),
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
        },
        () = cancel.cancelled() => {
            warn!("polling stopped, shutting down");
        },
    }

    cancel.cancel();
    if let Err(e) = polling.await {
        warn!(error = %e, "polling task ended abnormally");
    }
    info!("mergebot stopped");
    Ok(())
}
