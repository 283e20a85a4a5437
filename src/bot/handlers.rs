//! Per-interaction request handling.
//!
//! Each inbound event runs a small state machine:
//! received → membership check → {denied | cooldown check} →
//! {throttled | issuing} → done. Every fallible step is caught here so
//! a single bad interaction can never take the ingestion loop down,
//! and the user always gets a terminal response.

use std::sync::Arc;
use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info};

use crate::bot::api::PlatformApi;
use crate::bot::gate::MembershipGate;
use crate::bot::intent::{
    InboundEvent, Intent, CALLBACK_CHECK_MEMBERSHIP, CALLBACK_GET_PREDICTION,
};
use crate::cooldown::CooldownStore;
use crate::prediction::{format_time, indian_time_now, Prediction};

/// Terminal state of one handled interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Greeted (authorized or not), no prediction involved
    Welcomed,
    /// Membership gate said no
    Denied,
    /// An earlier cooldown is still running; nothing was re-armed
    Throttled,
    /// Prediction sent and cooldown armed
    Issued,
    /// Membership status reported back to the user
    MembershipReported,
    /// A platform call failed; the user got a generic retry notice
    Failed,
}

/// Orchestrates the membership gate, the cooldown store and outbound
/// messages for one interaction at a time.
pub struct RequestHandler<P> {
    api: Arc<P>,
    gate: MembershipGate<P>,
    store: CooldownStore,
    prediction_delay: Duration,
}

impl<P: PlatformApi> RequestHandler<P> {
    pub fn new(
        api: Arc<P>,
        store: CooldownStore,
        channel_handle: String,
        prediction_delay: Duration,
    ) -> Self {
        let gate = MembershipGate::new(Arc::clone(&api), channel_handle);
        Self {
            api,
            gate,
            store,
            prediction_delay,
        }
    }

    /// Handle one decoded event. Never propagates an error: failures
    /// are logged and answered with a generic notice.
    pub async fn handle(&self, event: &InboundEvent) -> Outcome {
        let outcome = match event.intent {
            Intent::Welcome => self.handle_welcome(event).await,
            Intent::Prediction => self.handle_prediction(event).await,
            Intent::CheckMembership => self.handle_check_membership(event).await,
        };
        info!(
            "Interaction done: user={} intent={:?} outcome={:?}",
            event.user.0, event.intent, outcome
        );
        outcome
    }

    async fn handle_welcome(&self, event: &InboundEvent) -> Outcome {
        let (text, keyboard) = if self.gate.is_authorized(event.user).await {
            (welcome_text(), Some(prediction_keyboard()))
        } else {
            (join_required_text(self.gate.channel()), None)
        };

        match self.api.send_text(event.chat, text, keyboard).await {
            Ok(()) => Outcome::Welcomed,
            Err(e) => {
                error!("Failed to send welcome to {}: {}", event.user.0, e);
                self.notify_failure(event).await;
                Outcome::Failed
            }
        }
    }

    async fn handle_prediction(&self, event: &InboundEvent) -> Outcome {
        if !self.gate.is_authorized(event.user).await {
            let text = format!("Join {} first!", self.gate.channel());
            self.answer(event, &text, true).await;
            return Outcome::Denied;
        }

        let remaining = self.store.remaining(event.user.0).await;
        if remaining > Duration::ZERO {
            // The existing expiry is left untouched.
            let text = format!("Wait {}", format_wait(remaining));
            self.answer(event, &text, true).await;
            return Outcome::Throttled;
        }

        let prediction = Prediction::generate(self.prediction_delay);
        match self
            .api
            .send_text(event.chat, prediction_text(&prediction), None)
            .await
        {
            Ok(()) => {
                // Armed only after a confirmed send: a user who never
                // saw a prediction is not made to wait for one.
                self.store.arm(event.user.0).await;
                self.answer(event, "✅ Done!", false).await;
                Outcome::Issued
            }
            Err(e) => {
                error!("Failed to send prediction to {}: {}", event.user.0, e);
                self.answer(event, "⚠️ Try again later", true).await;
                Outcome::Failed
            }
        }
    }

    async fn handle_check_membership(&self, event: &InboundEvent) -> Outcome {
        let text = if self.gate.is_authorized(event.user).await {
            "✅ You are a member".to_string()
        } else {
            format!("❌ Join {} first!", self.gate.channel())
        };
        self.answer(event, &text, true).await;
        Outcome::MembershipReported
    }

    /// Best-effort callback answer; message interactions get a message.
    async fn answer(&self, event: &InboundEvent, text: &str, alert: bool) {
        let result = match &event.callback_id {
            Some(id) => self.api.answer_callback(id, text, alert).await,
            None => self.api.send_text(event.chat, text.to_string(), None).await,
        };
        if let Err(e) = result {
            error!("Failed to answer user {}: {}", event.user.0, e);
        }
    }

    async fn notify_failure(&self, event: &InboundEvent) {
        self.answer(event, "⚠️ Service temporarily unavailable", true)
            .await;
    }
}

/// Inline keyboard attached to the welcome message.
#[must_use]
pub fn prediction_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        [InlineKeyboardButton::callback(
            "🎯 Get Prediction",
            CALLBACK_GET_PREDICTION,
        )],
        [InlineKeyboardButton::callback(
            "📋 Check membership",
            CALLBACK_CHECK_MEMBERSHIP,
        )],
    ])
}

fn welcome_text() -> String {
    format!(
        "✅ <b>Welcome!</b>\nCurrent IST: {}\nClick below for prediction:",
        format_time(&indian_time_now())
    )
}

fn join_required_text(channel: &str) -> String {
    format!(
        "❌ Please join {} first!\nCurrent IST: {}",
        channel,
        format_time(&indian_time_now())
    )
}

fn prediction_text(p: &Prediction) -> String {
    format!(
        "📊 <b>Prediction</b>\n\n⏳ Time: {}\n📈 Coefficient: {:.2}x\n🛡 Safe: {:.2}x",
        format_time(&p.target_time),
        p.displayed_coefficient(),
        p.safe
    )
}

/// Human form of a remaining wait, seconds below a minute, minutes above.
#[must_use]
pub fn format_wait(remaining: Duration) -> String {
    let secs = remaining.as_secs().max(1);
    if secs < 60 {
        format!("{secs}s")
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
