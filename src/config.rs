//! Configuration and settings management
//!
//! Loads settings from environment variables and defines retry constants.

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token (required)
    pub bot_token: String,

    /// Channel the user must be a member of, without the leading `@`
    #[serde(default = "default_channel_username")]
    pub channel_username: String,

    /// Redis connection string for the external cooldown backend
    pub redis_url: Option<String>,

    /// Liveness HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-user cooldown window between predictions, in seconds
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// How far in the future the predicted round is placed, in seconds
    #[serde(default = "default_prediction_delay_seconds")]
    pub prediction_delay_seconds: u64,

    /// Fixed sleep between failed long-poll attempts, in seconds
    #[serde(default = "default_poll_backoff_seconds")]
    pub poll_backoff_seconds: u64,

    /// Telegram long-poll timeout, in seconds
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u32,
}

fn default_channel_username() -> String {
    "testsub01".to_string()
}

const fn default_port() -> u16 {
    10000
}

const fn default_cooldown_seconds() -> u64 {
    120
}

const fn default_prediction_delay_seconds() -> u64 {
    130
}

const fn default_poll_backoff_seconds() -> u64 {
    5
}

const fn default_poll_timeout_seconds() -> u32 {
    25
}

impl Settings {
    /// Create new settings by loading from the environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails, in particular when the
    /// required `BOT_TOKEN` variable is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Settings come from environment variables directly.
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case,
            // ignore_empty treats empty env vars as unset, try_parsing lets the
            // numeric fields (PORT, COOLDOWN_SECONDS, ...) deserialize.
            .add_source(
                Environment::default()
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Fallback: check REDIS_URL directly if config didn't pick it up
        if settings.redis_url.is_none() {
            if let Ok(val) = std::env::var("REDIS_URL") {
                if !val.is_empty() {
                    settings.redis_url = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Cooldown window as a [`Duration`]
    #[must_use]
    pub const fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Prediction delay as a [`Duration`]
    #[must_use]
    pub const fn prediction_delay(&self) -> Duration {
        Duration::from_secs(self.prediction_delay_seconds)
    }

    /// Long-poll failure backoff as a [`Duration`]
    #[must_use]
    pub const fn poll_backoff(&self) -> Duration {
        Duration::from_secs(self.poll_backoff_seconds)
    }

    /// The channel in `@name` form, as expected by `getChatMember`
    #[must_use]
    pub fn channel_handle(&self) -> String {
        format!("@{}", self.channel_username)
    }
}

// Telegram API retry configuration
/// Initial backoff for outbound Telegram operations
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff ceiling for outbound Telegram operations
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4_000;
/// Retry attempts before an outbound Telegram operation is reported failed
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

// In-process cooldown fallback cache sizing
/// Maximum number of users tracked by the in-process fallback
pub const COOLDOWN_FALLBACK_MAX_CAPACITY: u64 = 100_000;
