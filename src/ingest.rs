//! Supervised ingestion loop.
//!
//! An infinite retry wrapper around the platform's long-poll receive
//! call. Any receive failure is logged, waited out with a fixed
//! backoff, and retried; the loop only exits when the shutdown token
//! fires. Events within a batch are dispatched serially in arrival
//! order, so a single ingestion stream never reenters the handler.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bot::api::PlatformApi;
use crate::bot::handlers::RequestHandler;
use crate::bot::intent::{decode_update, InboundEvent};

/// The platform's "receive next batch of events" primitive.
#[async_trait]
pub trait UpdateSource: Send {
    async fn next_batch(&mut self) -> Result<Vec<InboundEvent>>;
}

/// Long-polling source over the Telegram `getUpdates` API.
pub struct TelegramUpdateSource {
    bot: Bot,
    offset: Option<i32>,
    timeout_secs: u32,
}

impl TelegramUpdateSource {
    #[must_use]
    pub const fn new(bot: Bot, timeout_secs: u32) -> Self {
        Self {
            bot,
            offset: None,
            timeout_secs,
        }
    }
}

#[async_trait]
impl UpdateSource for TelegramUpdateSource {
    async fn next_batch(&mut self) -> Result<Vec<InboundEvent>> {
        let mut req = self.bot.get_updates().timeout(self.timeout_secs);
        if let Some(offset) = self.offset {
            req = req.offset(offset);
        }
        let updates = req.await?;

        let mut events = Vec::with_capacity(updates.len());
        for update in &updates {
            // Acknowledge every update, decodable or not, so a
            // malformed one is not redelivered forever.
            let next = i32::try_from(update.id.0)
                .unwrap_or(i32::MAX)
                .saturating_add(1);
            self.offset = Some(self.offset.map_or(next, |o| o.max(next)));

            match decode_update(update) {
                Some(event) => events.push(event),
                None => debug!("Dropping unserved update {}", update.id.0),
            }
        }
        Ok(events)
    }
}

/// Run the ingestion loop until `shutdown` fires.
pub async fn run<S, P>(
    mut source: S,
    handler: &RequestHandler<P>,
    backoff: Duration,
    shutdown: CancellationToken,
) where
    S: UpdateSource,
    P: PlatformApi,
{
    info!("Ingestion loop started");

    loop {
        let batch = tokio::select! {
            () = shutdown.cancelled() => break,
            batch = source.next_batch() => batch,
        };

        match batch {
            Ok(events) => {
                for event in &events {
                    handler.handle(event).await;
                }
            }
            Err(e) => {
                warn!("Receive failed, retrying in {:?}: {}", backoff, e);
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }

    info!("Ingestion loop stopped");
}
