//! Sovereign Bonds API - REST backend for a tokenized sovereign bond platform.
//!
//! Investors register, verify their email, sign in with an optional TOTP
//! second factor, browse the bond catalog and place investments that an
//! external settlement process later confirms on-chain.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     HTTP (axum, /api/*)                      │
//! │  BodyLimit → CORS → Tracing → RateLimit → routes             │
//! └──────┬──────────────┬──────────────┬──────────────┬──────────┘
//!        │              │              │              │
//!   AuthService    BondCatalog       Ledger        Accounts
//!        │              │              │              │
//!        └──────────────┴──────┬───────┴──────────────┘
//!                              │
//!              ports (repositories, clock, notifier)
//!                              │
//!                  adapters (in-memory, system clock)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sovereign_bonds_api::{BondsService, ServiceConfig};
//!
//! let service = BondsService::new(ServiceConfig::default())?;
//! service.serve().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod accounts;
pub mod adapters;
pub mod auth;
pub mod catalog;
pub mod domain;
pub mod http;
pub mod ledger;
pub mod middleware;
pub mod ports;
pub mod service;

// Re-exports for public API
pub use accounts::Accounts;
pub use auth::AuthService;
pub use catalog::BondCatalog;
pub use domain::config::ServiceConfig;
pub use domain::error::{BondsError, BondsResult};
pub use http::{ApiError, AppState};
pub use ledger::Ledger;
pub use middleware::ApiMetrics;
pub use service::{BondsService, ServiceError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
