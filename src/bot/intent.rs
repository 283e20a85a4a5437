//! Inbound event decoding.
//!
//! Raw Telegram updates are decoded exactly once, at the ingestion
//! boundary, into a closed set of interaction intents. The handler
//! then dispatches on the enum instead of comparing payload strings.

use teloxide::types::{ChatId, Update, UpdateKind, UserId};

/// Callback payload carried by the prediction button
pub const CALLBACK_GET_PREDICTION: &str = "get_prediction";
/// Callback payload carried by the membership-check button
pub const CALLBACK_CHECK_MEMBERSHIP: &str = "check_membership";

/// What the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// `/start` or `/help`: greet and show the prediction button
    Welcome,
    /// Prediction button pressed
    Prediction,
    /// Membership-check button pressed
    CheckMembership,
}

/// A decoded inbound interaction
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Chat to reply into
    pub chat: ChatId,
    /// The requesting user
    pub user: UserId,
    pub intent: Intent,
    /// Present when the interaction arrived as a callback query
    pub callback_id: Option<String>,
}

/// Decode one raw update. Returns `None` for update kinds and payloads
/// this bot does not serve; those are dropped at the boundary.
#[must_use]
pub fn decode_update(update: &Update) -> Option<InboundEvent> {
    match &update.kind {
        UpdateKind::Message(msg) => {
            let intent = intent_from_text(msg.text()?)?;
            let user = msg.from.as_ref()?.id;
            Some(InboundEvent {
                chat: msg.chat.id,
                user,
                intent,
                callback_id: None,
            })
        }
        UpdateKind::CallbackQuery(q) => {
            let intent = intent_from_callback(q.data.as_deref()?)?;
            let chat = q
                .message
                .as_ref()
                .map_or(ChatId(q.from.id.0.cast_signed()), |m| m.chat().id);
            Some(InboundEvent {
                chat,
                user: q.from.id,
                intent,
                callback_id: Some(q.id.0.clone()),
            })
        }
        _ => None,
    }
}

/// Decode a command message. Accepts `/start` and `/help`, with or
/// without the `@BotName` suffix and trailing arguments.
#[must_use]
pub fn intent_from_text(text: &str) -> Option<Intent> {
    let token = text.split_whitespace().next()?;
    let command = token.split('@').next().unwrap_or(token);
    match command {
        "/start" | "/help" => Some(Intent::Welcome),
        _ => None,
    }
}

/// Decode a callback payload into an intent.
#[must_use]
pub fn intent_from_callback(data: &str) -> Option<Intent> {
    match data {
        CALLBACK_GET_PREDICTION => Some(Intent::Prediction),
        CALLBACK_CHECK_MEMBERSHIP => Some(Intent::CheckMembership),
        _ => None,
    }
}
