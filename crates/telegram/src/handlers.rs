use {
    teloxide::{
        prelude::*,
        types::{CallbackQuery, ChatKind, MediaKind, MessageKind, User},
    },
    tracing::{debug, warn},
};

use {
    mergebot_common::{MediaKind as AttachmentKind, SourceRef, UserId},
    mergebot_routing::{Button, EventLanes, InboundEvent},
};

/// Slash commands the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

impl Command {
    /// Parse `/start`, `/help` and their `@botname` forms.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or(word);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

fn user_id(user: &User) -> Option<UserId> {
    i64::try_from(user.id.0).ok().map(UserId)
}

fn display_name(user: &User) -> String {
    let first = user.first_name.trim();
    if !first.is_empty() {
        return first.to_string();
    }
    user.username
        .clone()
        .unwrap_or_else(|| user.id.0.to_string())
}

/// Attachment carried by a message: file id, reported name, kind.
fn extract_attachment(msg: &Message) -> Option<(String, Option<String>, AttachmentKind)> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };
    match &common.media_kind {
        MediaKind::Video(v) => Some((
            v.video.file.id.clone(),
            v.video.file_name.clone(),
            AttachmentKind::Video,
        )),
        MediaKind::Audio(a) => Some((
            a.audio.file.id.clone(),
            a.audio.file_name.clone(),
            AttachmentKind::Audio,
        )),
        MediaKind::Document(d) => Some((
            d.document.file.id.clone(),
            d.document.file_name.clone(),
            AttachmentKind::Document,
        )),
        _ => None,
    }
}

/// Translate a message into a router event. Only private chats count;
/// anything that is neither a supported attachment nor a known command is
/// dropped.
pub fn event_from_message(msg: &Message) -> Option<InboundEvent> {
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        return None;
    }
    let from = msg.from.as_ref()?;
    let user = user_id(from)?;
    let display_name = display_name(from);

    if let Some((file_id, file_name, kind)) = extract_attachment(msg) {
        return Some(InboundEvent::SubmitMedia {
            user,
            display_name,
            file_name,
            source_ref: SourceRef::new(file_id),
            kind,
        });
    }

    match Command::parse(msg.text()?)? {
        Command::Start => Some(InboundEvent::Start { user, display_name }),
        Command::Help => Some(InboundEvent::Help { user }),
    }
}

/// Translate an inline button press into a router event.
pub fn event_from_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let button = query.data.as_deref()?.parse::<Button>().ok()?;
    let user = user_id(&query.from)?;
    Some(button.pressed_by(user, display_name(&query.from)))
}

/// Queue a message's event on its user's lane (called from the polling loop).
pub fn handle_message(msg: &Message, lanes: &EventLanes) {
    match event_from_message(msg) {
        Some(event) => lanes.push(event),
        None => debug!(chat_id = msg.chat.id.0, "ignoring telegram message"),
    }
}

/// Queue a button press and answer the query so the client stops showing a
/// spinner, even when the data is not ours. The answer is sent off the
/// polling loop; only the event itself needs to keep its place.
pub fn handle_callback_query(query: CallbackQuery, bot: &Bot, lanes: &EventLanes) {
    match event_from_callback(&query) {
        Some(event) => lanes.push(event),
        None => debug!(callback_data = ?query.data, "ignoring unknown callback"),
    }
    let bot = bot.clone();
    tokio::spawn(async move {
        if let Err(e) = bot.answer_callback_query(&query.id).await {
            warn!(error = %e, "failed to answer callback query");
        }
    });
}
