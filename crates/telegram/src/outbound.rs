use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::{SendDocumentSetters, SendMessageSetters},
        prelude::*,
        types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile},
    },
    tracing::{debug, info, warn},
};

use {
    mergebot_common::{FileHandle, UserId},
    mergebot_routing::{Button, Outbox},
};

/// Hard limit of the Bot API for one text message, in characters.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Sends router output to private chats.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Retry a request while Telegram answers with `RetryAfter`.
    async fn with_retry<T, F, Fut>(
        &self,
        user: UserId,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };
                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            user_id = %user,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }
                    retries += 1;
                    warn!(
                        user_id = %user,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn chat_id(user: UserId) -> ChatId {
    // A private chat has the same id as the user.
    ChatId(user.0)
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// One button per row, in the given order.
pub fn keyboard(buttons: &[Button]) -> Option<InlineKeyboardMarkup> {
    if buttons.is_empty() {
        return None;
    }
    Some(InlineKeyboardMarkup::new(buttons.iter().map(|b| {
        vec![InlineKeyboardButton::callback(b.label(), b.callback_data())]
    })))
}

/// Cut `text` to the message limit on a character boundary.
fn clamp_message(text: &str) -> &str {
    match text.char_indices().nth(TELEGRAM_MAX_MESSAGE_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn transport_error(context: &str, err: RequestError) -> mergebot_routing::Error {
    mergebot_routing::Error::transport(context, crate::Error::from(err))
}

#[async_trait]
impl Outbox for TelegramOutbound {
    async fn send_text(
        &self,
        user: UserId,
        text: &str,
        buttons: &[Button],
    ) -> mergebot_routing::Result<()> {
        let chat = chat_id(user);
        let text = clamp_message(text);
        let markup = keyboard(buttons);
        self.with_retry(user, "send message", || {
            let mut req = self.bot.send_message(chat, text);
            if let Some(markup) = &markup {
                req = req.reply_markup(markup.clone());
            }
            async move { req.await }
        })
        .await
        .map_err(|e| transport_error("send message", e))?;
        debug!(user_id = %user, text_len = text.len(), buttons = buttons.len(), "telegram text sent");
        Ok(())
    }

    async fn send_file(
        &self,
        user: UserId,
        file: &FileHandle,
        caption: &str,
    ) -> mergebot_routing::Result<()> {
        let chat = chat_id(user);
        self.with_retry(user, "send document", || {
            let mut req = self
                .bot
                .send_document(chat, InputFile::file(file.path().to_path_buf()));
            if !caption.is_empty() {
                req = req.caption(caption);
            }
            async move { req.await }
        })
        .await
        .map_err(|e| transport_error("send document", e))?;
        info!(user_id = %user, file = %file.path().display(), "telegram document sent");
        Ok(())
    }
}
