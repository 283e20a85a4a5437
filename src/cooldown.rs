//! Per-user prediction cooldown tracking
//!
//! The store prefers an external Redis backend (shared TTL keys) and
//! degrades per call to an in-process TTL cache when Redis is
//! unconfigured or unreachable. A failed backend write never surfaces
//! to the caller; the cooldown is written into the in-process cache
//! instead so it still takes effect locally.

use async_trait::async_trait;
use moka::future::Cache;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::COOLDOWN_FALLBACK_MAX_CAPACITY;

/// Errors from the external cooldown backend. Internal only: every
/// public operation recovers by switching to the in-process cache.
#[derive(Debug, Error)]
enum BackendError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// External TTL-key operations the store needs from a backend.
/// Every call may fail; the store falls back per call.
#[async_trait]
trait CooldownBackend: Send + Sync {
    /// Milliseconds until `key` expires, Redis `PTTL` semantics
    /// (negative for missing or persistent keys).
    async fn ttl_ms(&self, key: &str) -> Result<i64, BackendError>;

    /// Set `key` to expire `window` from now, overwriting any expiry.
    async fn set_ttl(&self, key: &str, window: Duration) -> Result<(), BackendError>;
}

#[async_trait]
impl CooldownBackend for ConnectionManager {
    async fn ttl_ms(&self, key: &str) -> Result<i64, BackendError> {
        let mut conn = self.clone();
        Ok(conn.pttl(key).await?)
    }

    async fn set_ttl(&self, key: &str, window: Duration) -> Result<(), BackendError> {
        let ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut conn = self.clone();
        conn.pset_ex::<_, _, ()>(key, 1u8, ms).await?;
        Ok(())
    }
}

/// Tracks, per user, the instant after which a new prediction may be issued.
///
/// The cooldown window is fixed at construction: it both parameterizes
/// `arm` and bounds the lifetime of in-process entries, so the two can
/// never disagree.
///
/// `arm`/`remaining` for a single user are atomic with respect to each
/// other: both backends expose last-writer-wins per-key operations.
#[derive(Clone)]
pub struct CooldownStore {
    backend: Option<Arc<dyn CooldownBackend>>,
    local: Cache<u64, Instant>,
    window: Duration,
}

impl CooldownStore {
    /// Connect to the external backend if a URL is configured.
    ///
    /// Connection failure is not fatal: the store starts in
    /// in-process-only mode and the process keeps running.
    pub async fn connect(redis_url: Option<&str>, window: Duration) -> Self {
        let backend: Option<Arc<dyn CooldownBackend>> = match redis_url {
            Some(url) => match Self::open_backend(url).await {
                Ok(mgr) => {
                    info!("Cooldown backend connected: redis");
                    Some(Arc::new(mgr))
                }
                Err(e) => {
                    warn!(
                        "Cooldown backend unavailable, using in-process store: {}",
                        e
                    );
                    None
                }
            },
            None => {
                info!("No REDIS_URL configured, using in-process cooldown store");
                None
            }
        };

        Self::with_backend(backend, window)
    }

    /// Build an in-process-only store. Used directly by tests.
    #[must_use]
    pub fn in_process(window: Duration) -> Self {
        Self::with_backend(None, window)
    }

    fn with_backend(backend: Option<Arc<dyn CooldownBackend>>, window: Duration) -> Self {
        // Entries naturally expire with the window, so stale users are
        // evicted instead of accumulating for the process lifetime.
        let local = Cache::builder()
            .max_capacity(COOLDOWN_FALLBACK_MAX_CAPACITY)
            .time_to_live(window.max(Duration::from_millis(1)))
            .build();

        Self {
            backend,
            local,
            window,
        }
    }

    async fn open_backend(url: &str) -> Result<ConnectionManager, BackendError> {
        let client = redis::Client::open(url)?;
        Ok(ConnectionManager::new(client).await?)
    }

    /// Time left before `user` may request again. Zero means eligible.
    pub async fn remaining(&self, user: u64) -> Duration {
        let local = self.local_remaining(user).await;

        if let Some(backend) = &self.backend {
            match backend.ttl_ms(&Self::key(user)).await {
                // A write that previously fell back to the in-process
                // cache must still be honored, so take the larger value.
                Ok(ttl_ms) => return Self::ttl_to_duration(ttl_ms).max(local),
                Err(e) => {
                    warn!("Cooldown read fell back to in-process store: {}", e);
                }
            }
        }

        local
    }

    /// Unconditionally (re)set the cooldown for `user` to expire one
    /// window from now.
    pub async fn arm(&self, user: u64) {
        if let Some(backend) = &self.backend {
            match backend.set_ttl(&Self::key(user), self.window).await {
                Ok(()) => {
                    debug!(
                        "Armed cooldown for {} ({}s, redis)",
                        user,
                        self.window.as_secs()
                    );
                    return;
                }
                Err(e) => {
                    warn!("Cooldown write fell back to in-process store: {}", e);
                }
            }
        }

        self.local.insert(user, Instant::now() + self.window).await;
        debug!(
            "Armed cooldown for {} ({}s, in-process)",
            user,
            self.window.as_secs()
        );
    }

    /// Number of in-process cooldown entries. Eventually consistent;
    /// exposed for the liveness endpoint. Keys living only in Redis are
    /// not enumerated.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.local.entry_count()
    }

    async fn local_remaining(&self, user: u64) -> Duration {
        self.local
            .get(&user)
            .await
            .map(|expiry| expiry.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    // PTTL returns -2 for a missing key and -1 for a key without
    // expiry; both mean no active cooldown here.
    fn ttl_to_duration(ttl_ms: i64) -> Duration {
        if ttl_ms > 0 {
            Duration::from_millis(ttl_ms.unsigned_abs())
        } else {
            Duration::ZERO
        }
    }

    fn key(user: u64) -> String {
        format!("prediction_cooldown:{user}")
    }
}
