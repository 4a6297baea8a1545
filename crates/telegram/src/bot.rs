use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, ChatId, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use {
    mergebot_config::TelegramConfig,
    mergebot_routing::{ConversationRouter, EventLanes, messages},
};

use crate::handlers;

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build the bot client and prepare the account for long polling.
///
/// Verifies the token, clears any webhook and registers the slash commands.
pub async fn connect(config: &TelegramConfig) -> anyhow::Result<Bot> {
    // Client timeout must outlive the long-polling timeout, or the HTTP
    // client aborts the request before Telegram answers.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    let mut bot = Bot::with_client(config.token.expose_secret(), client);
    if let Some(url) = custom_api_url(config)? {
        info!(api_url = %url, "using custom bot api server");
        bot = bot.set_api_url(url);
    }

    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;

    let commands = vec![
        BotCommand::new("start", "Check access and get started"),
        BotCommand::new("help", "How to merge files"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");
    Ok(bot)
}

/// `telegram.api_url` as a base URL. A missing trailing slash is added so
/// method and file paths join under it instead of replacing its last segment.
fn custom_api_url(config: &TelegramConfig) -> anyhow::Result<Option<reqwest::Url>> {
    let Some(raw) = config.api_url.as_deref() else {
        return Ok(None);
    };
    let raw = raw.trim();
    let base = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = reqwest::Url::parse(&base)
        .with_context(|| format!("invalid telegram.api_url {raw:?}"))?;
    Ok(Some(url))
}

/// Tell the owner the bot is up. Failure is logged and otherwise ignored;
/// it usually means the owner never opened a chat with the bot.
pub async fn notify_owner(bot: &Bot, config: &TelegramConfig) {
    if !config.notify_owner_on_start {
        return;
    }
    match bot
        .send_message(ChatId(config.owner_id), messages::OWNER_STARTED)
        .await
    {
        Ok(_) => debug!(owner_id = config.owner_id, "owner notified"),
        Err(e) => error!(
            owner_id = config.owner_id,
            error = %e,
            "bot alert failed, owner might not have started the bot in a private chat"
        ),
    }
}

/// Poll for updates until `cancel` fires.
///
/// Updates are pushed onto per-user lanes in the order Telegram delivers
/// them, so one user's uploads reach the queue in the order they were sent
/// while other users and running merges carry on independently.
pub fn spawn_polling(
    bot: Bot,
    router: Arc<ConversationRouter>,
    poll_timeout_secs: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let lanes = EventLanes::new(router);
        let mut offset: i32 = 0;

        loop {
            let request = bot
                .get_updates()
                .offset(offset)
                .timeout(poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

            let result = tokio::select! {
                () = cancel.cancelled() => {
                    info!("telegram polling stopped");
                    break;
                },
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    if !updates.is_empty() {
                        debug!(count = updates.len(), "got telegram updates");
                    }
                    for update in updates {
                        offset = update.id.as_offset();
                        dispatch_update(update.kind, &bot, &lanes);
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!("telegram polling disabled: another instance is running with this token");
                    cancel.cancel();
                    break;
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                    }
                },
            }
        }
    })
}

fn dispatch_update(kind: UpdateKind, bot: &Bot, lanes: &EventLanes) {
    match kind {
        UpdateKind::Message(msg) => {
            debug!(chat_id = msg.chat.id.0, "received telegram message");
            handlers::handle_message(&msg, lanes);
        },
        UpdateKind::CallbackQuery(query) => {
            debug!(callback_data = ?query.data, "received telegram callback query");
            handlers::handle_callback_query(query, bot, lanes);
        },
        other => debug!("ignoring non-message update: {other:?}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(None, None)]
    #[case(Some("http://127.0.0.1:8081"), Some("http://127.0.0.1:8081/"))]
    #[case(Some(" https://tg.example/botapi "), Some("https://tg.example/botapi/"))]
    fn api_url_is_normalized(#[case] raw: Option<&str>, #[case] expected: Option<&str>) {
        let config = TelegramConfig {
            api_url: raw.map(Into::into),
            ..Default::default()
        };
        let url = custom_api_url(&config).unwrap();
        assert_eq!(url.as_ref().map(reqwest::Url::as_str), expected);
    }

    #[test]
    fn malformed_api_url_is_an_error() {
        let config = TelegramConfig {
            api_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(custom_api_url(&config).is_err());
    }
}
