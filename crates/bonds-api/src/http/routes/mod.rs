//! Route table.

pub mod auth;
pub mod bonds;
pub mod settlement;
pub mod transactions;
pub mod users;

use super::{ApiError, AppState, Envelope};
use crate::middleware::MetricsSnapshot;
use crate::VERSION;
use axum::{
    extract::{OriginalUri, State},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SERVICE_NAME: &str = "Sovereign Bonds API";

/// Every route, unlayered. `settlement_key` guards the settlement routes.
pub fn router(settlement_key: Option<&str>) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/auth", auth::router())
        .nest("/api/bonds", bonds::router())
        .nest("/api/transactions", transactions::router())
        .nest("/api/users", users::router())
        .nest("/api/settlement", settlement::router(settlement_key))
        .fallback(not_found)
}

#[derive(Serialize)]
struct Endpoints {
    bonds: &'static str,
    users: &'static str,
    transactions: &'static str,
    auth: &'static str,
}

#[derive(Serialize)]
struct ServiceInfo {
    message: &'static str,
    version: &'static str,
    endpoints: Endpoints,
}

async fn root() -> Envelope<ServiceInfo> {
    Envelope::data(ServiceInfo {
        message: "Sovereign debt tokenization API",
        version: VERSION,
        endpoints: Endpoints {
            bonds: "/api/bonds",
            users: "/api/users",
            transactions: "/api/transactions",
            auth: "/api/auth",
        },
    })
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
    service: &'static str,
    version: &'static str,
    requests: MetricsSnapshot,
}

async fn health(State(state): State<AppState>) -> Envelope<Health> {
    Envelope::data(Health {
        status: "OK",
        timestamp: state.clock.now(),
        service: SERVICE_NAME,
        version: VERSION,
        requests: state.metrics.snapshot(),
    })
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::route_not_found(uri.path())
}
