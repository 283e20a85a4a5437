/// Outbound Telegram API boundary with retrying send operations
pub mod api;
/// Channel membership gate
pub mod gate;
/// Per-interaction request handling
pub mod handlers;
/// Inbound event decoding
pub mod intent;

pub use api::{PlatformApi, TelegramPlatform};
pub use gate::MembershipGate;
pub use handlers::RequestHandler;
pub use intent::{decode_update, InboundEvent, Intent};
