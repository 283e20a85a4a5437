//! Telegram prediction bot.
//!
//! Gates a generated prediction behind channel membership and a
//! per-user cooldown, polls Telegram with a supervised long-poll loop,
//! and answers hosting-platform liveness probes concurrently.

/// Telegram boundary: outbound API, intents, gate and request handling
pub mod bot;
/// Environment-driven settings
pub mod config;
/// Per-user cooldown store with Redis backend and in-process fallback
pub mod cooldown;
/// Liveness HTTP endpoint
pub mod health;
/// Supervised long-poll ingestion loop
pub mod ingest;
/// Prediction value generation
pub mod prediction;
