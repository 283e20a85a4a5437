//! Liveness endpoint for the hosting platform.
//!
//! Runs as its own task and shares nothing with the ingestion loop
//! except the cooldown store, so a wedged poll can never fail a probe.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::time::SystemTime;

use crate::cooldown::CooldownStore;
use crate::prediction::{format_time, indian_time_now};

/// Body returned by the root probe
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub uptime_seconds: u64,
    /// In-process cooldown entries; eventually consistent
    pub active_cooldowns: u64,
    /// Current server time, IST
    pub server_time: String,
}

/// State shared with the probe handlers
#[derive(Clone)]
pub struct AppState {
    store: CooldownStore,
    start_time: SystemTime,
}

impl AppState {
    #[must_use]
    pub fn new(store: CooldownStore) -> Self {
        Self {
            store,
            start_time: SystemTime::now(),
        }
    }

    fn snapshot(&self) -> HealthStatus {
        HealthStatus {
            status: "operational".to_string(),
            uptime_seconds: self.start_time.elapsed().unwrap_or_default().as_secs(),
            active_cooldowns: self.store.entry_count(),
            server_time: format_time(&indian_time_now()),
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.snapshot())
}

/// Liveness check (process is alive)
async fn live_handler() -> StatusCode {
    StatusCode::OK
}

/// Create the probe router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/live", get(live_handler))
        .with_state(state)
}

/// Bind and serve probes until the process exits.
pub async fn start_health_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Liveness endpoint listening on {}", addr);

    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
