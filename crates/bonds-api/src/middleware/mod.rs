//! Middleware stack for the bonds API.
//!
//! Layer order: Request → BodyLimit → CORS → Tracing → RateLimit (`/api` only) → Handler.
//! Settlement routes additionally sit behind [`SettlementKeyLayer`].

pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod settlement;
pub mod tracing;

pub use cors::create_cors_layer;
pub use metrics::{ApiMetrics, MetricsSnapshot};
pub use rate_limit::{RateLimitLayer, RateLimitState};
pub use settlement::{constant_time_compare, SettlementKeyLayer};
pub use tracing::TracingLayer;
