//! Outbound Telegram boundary.
//!
//! The [`PlatformApi`] trait is the seam between the request handler
//! and teloxide: everything the handler needs from Telegram goes
//! through it, so tests can substitute a mock. The real implementation
//! retries transient send failures with exponential backoff and jitter.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, InlineKeyboardMarkup, ParseMode, Recipient};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};

/// Messaging-platform operations consumed by the gate and the handler.
#[async_trait]
pub trait PlatformApi: Send + Sync + 'static {
    /// Query the membership status of `user` in `channel` (`@name` form).
    async fn member_status(&self, channel: &str, user: UserId) -> Result<ChatMemberStatus>;

    /// Send an HTML-formatted message, optionally with an inline keyboard.
    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()>;

    /// Answer a callback query with a toast or an alert popup.
    async fn answer_callback(&self, id: &str, text: &str, alert: bool) -> Result<()>;
}

/// Production [`PlatformApi`] backed by a teloxide [`Bot`].
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl PlatformApi for TelegramPlatform {
    async fn member_status(&self, channel: &str, user: UserId) -> Result<ChatMemberStatus> {
        // Not retried: the gate fails closed and the user can simply
        // press the button again.
        let member = self
            .bot
            .get_chat_member(Recipient::ChannelUsername(channel.to_string()), user)
            .await?;
        Ok(member.status())
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        retry_telegram_operation(|| async {
            let mut req = self
                .bot
                .send_message(chat, text.clone())
                .parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard.clone() {
                req = req.reply_markup(kb);
            }
            req.await
                .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))?;
            Ok(())
        })
        .await
    }

    async fn answer_callback(&self, id: &str, text: &str, alert: bool) -> Result<()> {
        // Callback answers expire within seconds on Telegram's side,
        // so a retry storm would only answer a dead query.
        self.bot
            .answer_callback_query(teloxide::types::CallbackQueryId(id.to_string()))
            .text(text.to_string())
            .show_alert(alert)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram callback answer error: {e}"))?;
        Ok(())
    }
}

/// Retry a Telegram API operation with exponential backoff and jitter.
async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
