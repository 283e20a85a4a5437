//! Request handler state machine tests against a mock platform.

use anyhow::Result;
use async_trait::async_trait;
use pridict_bot::bot::handlers::Outcome;
use pridict_bot::bot::intent::{InboundEvent, Intent};
use pridict_bot::bot::{PlatformApi, RequestHandler};
use pridict_bot::cooldown::CooldownStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use teloxide::types::{ChatId, ChatMemberStatus, InlineKeyboardMarkup, UserId};

const CHANNEL: &str = "@testsub01";

#[derive(Debug, Clone)]
enum Outbound {
    Message { text: String, with_keyboard: bool },
    Callback { text: String, alert: bool },
}

/// Scriptable platform double: membership answer, send failures, and a
/// record of everything that went out.
struct MockPlatform {
    membership: Mutex<Option<ChatMemberStatus>>,
    fail_send: AtomicBool,
    outbound: Mutex<Vec<Outbound>>,
}

impl MockPlatform {
    fn with_status(status: Option<ChatMemberStatus>) -> Arc<Self> {
        Arc::new(Self {
            membership: Mutex::new(status),
            fail_send: AtomicBool::new(false),
            outbound: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<Outbound> {
        self.outbound.lock().expect("lock poisoned").clone()
    }

    fn messages(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Message { text, .. } => Some(text),
                Outbound::Callback { .. } => None,
            })
            .collect()
    }

    fn callbacks(&self) -> Vec<(String, bool)> {
        self.sent()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Callback { text, alert } => Some((text, alert)),
                Outbound::Message { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl PlatformApi for MockPlatform {
    async fn member_status(&self, _channel: &str, _user: UserId) -> Result<ChatMemberStatus> {
        let status = self.membership.lock().expect("lock poisoned").clone();
        status.ok_or_else(|| anyhow::anyhow!("membership query failed"))
    }

    async fn send_text(
        &self,
        _chat: ChatId,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            anyhow::bail!("send failed");
        }
        self.outbound
            .lock()
            .expect("lock poisoned")
            .push(Outbound::Message {
                text,
                with_keyboard: keyboard.is_some(),
            });
        Ok(())
    }

    async fn answer_callback(&self, _id: &str, text: &str, alert: bool) -> Result<()> {
        self.outbound
            .lock()
            .expect("lock poisoned")
            .push(Outbound::Callback {
                text: text.to_string(),
                alert,
            });
        Ok(())
    }
}

fn handler_with(
    api: Arc<MockPlatform>,
    window: Duration,
) -> (RequestHandler<MockPlatform>, CooldownStore) {
    let store = CooldownStore::in_process(window);
    let handler = RequestHandler::new(
        api,
        store.clone(),
        CHANNEL.to_string(),
        Duration::from_secs(130),
    );
    (handler, store)
}

fn prediction_event(user: u64) -> InboundEvent {
    InboundEvent {
        chat: ChatId(i64::try_from(user).expect("small test ids")),
        user: UserId(user),
        intent: Intent::Prediction,
        callback_id: Some("cb-1".to_string()),
    }
}

fn welcome_event(user: u64) -> InboundEvent {
    InboundEvent {
        chat: ChatId(i64::try_from(user).expect("small test ids")),
        user: UserId(user),
        intent: Intent::Welcome,
        callback_id: None,
    }
}

#[tokio::test]
async fn test_unauthorized_request_never_reaches_cooldown() {
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Left));
    let (handler, store) = handler_with(Arc::clone(&api), Duration::from_secs(120));

    let outcome = handler.handle(&prediction_event(1)).await;

    assert_eq!(outcome, Outcome::Denied);
    // No cooldown armed as a side effect of a denied request.
    assert_eq!(store.remaining(1).await, Duration::ZERO);
    assert!(api.messages().is_empty());

    let callbacks = api.callbacks();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].0, format!("Join {CHANNEL} first!"));
    assert!(callbacks[0].1, "denial should be an alert");
}

#[tokio::test]
async fn test_membership_error_fails_closed_and_is_idempotent() {
    let api = MockPlatform::with_status(None);
    let (handler, store) = handler_with(Arc::clone(&api), Duration::from_secs(120));

    let first = handler.handle(&prediction_event(2)).await;
    let second = handler.handle(&prediction_event(2)).await;

    assert_eq!(first, Outcome::Denied);
    assert_eq!(second, Outcome::Denied);
    assert_eq!(store.remaining(2).await, Duration::ZERO);
}

#[tokio::test]
async fn test_fresh_user_is_issued_and_armed_for_full_window() {
    let window = Duration::from_secs(120);
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Member));
    let (handler, store) = handler_with(Arc::clone(&api), window);

    let outcome = handler.handle(&prediction_event(3)).await;

    assert_eq!(outcome, Outcome::Issued);

    let messages = api.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Prediction"));
    assert!(messages[0].contains("Time:"));

    let remaining = store.remaining(3).await;
    assert!(remaining > Duration::from_secs(119));
    assert!(remaining <= window);

    let callbacks = api.callbacks();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].0, "✅ Done!");
}

#[tokio::test]
async fn test_throttled_request_leaves_expiry_untouched() {
    let window = Duration::from_secs(120);
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Member));
    let (handler, store) = handler_with(Arc::clone(&api), window);

    assert_eq!(handler.handle(&prediction_event(4)).await, Outcome::Issued);
    let before = store.remaining(4).await;

    let outcome = handler.handle(&prediction_event(4)).await;

    assert_eq!(outcome, Outcome::Throttled);
    // Still exactly one prediction message.
    assert_eq!(api.messages().len(), 1);

    // The stored expiry was not re-armed by the throttled attempt.
    let after = store.remaining(4).await;
    assert!(after <= before);
    assert!(before - after < Duration::from_secs(2));

    let callbacks = api.callbacks();
    assert_eq!(callbacks.len(), 2);
    assert!(callbacks[1].0.starts_with("Wait "));
    assert!(callbacks[1].1, "throttle notice should be an alert");
}

#[tokio::test]
async fn test_cooldown_expires_and_user_is_issued_again() {
    let window = Duration::from_millis(150);
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Member));
    let (handler, store) = handler_with(Arc::clone(&api), window);

    assert_eq!(handler.handle(&prediction_event(5)).await, Outcome::Issued);
    assert_eq!(
        handler.handle(&prediction_event(5)).await,
        Outcome::Throttled
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.remaining(5).await, Duration::ZERO);

    assert_eq!(handler.handle(&prediction_event(5)).await, Outcome::Issued);
    assert_eq!(api.messages().len(), 2);
}

#[tokio::test]
async fn test_failed_send_reports_error_and_does_not_arm() {
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Member));
    api.fail_send.store(true, Ordering::SeqCst);
    let (handler, store) = handler_with(Arc::clone(&api), Duration::from_secs(120));

    let outcome = handler.handle(&prediction_event(6)).await;

    assert_eq!(outcome, Outcome::Failed);
    // Arm happens only after a confirmed send.
    assert_eq!(store.remaining(6).await, Duration::ZERO);

    let callbacks = api.callbacks();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].0, "⚠️ Try again later");
}

#[tokio::test]
async fn test_welcome_for_member_includes_prediction_button() {
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Member));
    let (handler, _store) = handler_with(Arc::clone(&api), Duration::from_secs(120));

    let outcome = handler.handle(&welcome_event(7)).await;

    assert_eq!(outcome, Outcome::Welcomed);
    let sent = api.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Outbound::Message {
            text,
            with_keyboard,
        } => {
            assert!(text.contains("Welcome"));
            assert!(with_keyboard, "member welcome should carry the button");
        }
        Outbound::Callback { .. } => panic!("welcome must be a message"),
    }
}

#[tokio::test]
async fn test_welcome_for_outsider_asks_to_join() {
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Left));
    let (handler, _store) = handler_with(Arc::clone(&api), Duration::from_secs(120));

    let outcome = handler.handle(&welcome_event(8)).await;

    assert_eq!(outcome, Outcome::Welcomed);
    let sent = api.sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Outbound::Message {
            text,
            with_keyboard,
        } => {
            assert!(text.contains(&format!("join {CHANNEL}")));
            assert!(!with_keyboard);
        }
        Outbound::Callback { .. } => panic!("welcome must be a message"),
    }
}

#[tokio::test]
async fn test_check_membership_reports_status() {
    let api = MockPlatform::with_status(Some(ChatMemberStatus::Administrator));
    let (handler, _store) = handler_with(Arc::clone(&api), Duration::from_secs(120));

    let event = InboundEvent {
        chat: ChatId(9),
        user: UserId(9),
        intent: Intent::CheckMembership,
        callback_id: Some("cb-2".to_string()),
    };
    let outcome = handler.handle(&event).await;

    assert_eq!(outcome, Outcome::MembershipReported);
    let callbacks = api.callbacks();
    assert_eq!(callbacks.len(), 1);
    assert_eq!(callbacks[0].0, "✅ You are a member");
}
