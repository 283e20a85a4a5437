//! Channel membership gate.
//!
//! Decides whether a user may receive predictions. The actual lookup
//! is delegated to the platform; this module owns only the boolean
//! decision and its failure policy: any error from the query denies
//! access. Erring toward denial is deliberate, the gated resource must
//! not leak under API flakiness.

use std::sync::Arc;
use teloxide::types::{ChatMemberStatus, UserId};
use tracing::warn;

use crate::bot::api::PlatformApi;

/// Membership-based authorization for a single channel.
pub struct MembershipGate<P> {
    api: Arc<P>,
    channel: String,
}

impl<P: PlatformApi> MembershipGate<P> {
    /// `channel` in `@name` form.
    pub const fn new(api: Arc<P>, channel: String) -> Self {
        Self { api, channel }
    }

    /// Whether `user` is currently a member of the channel.
    /// Fails closed: query errors are logged and read as "not a member".
    pub async fn is_authorized(&self, user: UserId) -> bool {
        match self.api.member_status(&self.channel, user).await {
            Ok(status) => status_grants_access(status),
            Err(e) => {
                warn!("Membership check failed for {}, denying: {}", user.0, e);
                false
            }
        }
    }

    /// The gated channel, `@name` form.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Statuses that count as being in the channel. Restricted members are
/// denied, matching the production bot's behavior.
#[must_use]
pub fn status_grants_access(status: ChatMemberStatus) -> bool {
    matches!(
        status,
        ChatMemberStatus::Owner | ChatMemberStatus::Administrator | ChatMemberStatus::Member
    )
}
