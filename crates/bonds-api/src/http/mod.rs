//! REST surface: envelope, error rendering, extractors and routes.

pub mod envelope;
pub mod error;
pub mod extract;
pub mod routes;

pub use envelope::Envelope;
pub use error::{reveal_internal_details, ApiError};
pub use extract::{AuthenticatedUser, JsonBody, PathParam, QueryParams};

use crate::accounts::Accounts;
use crate::auth::AuthService;
use crate::catalog::BondCatalog;
use crate::ledger::Ledger;
use crate::middleware::ApiMetrics;
use crate::ports::Clock;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub catalog: Arc<BondCatalog>,
    pub ledger: Arc<Ledger>,
    pub accounts: Arc<Accounts>,
    pub metrics: Arc<ApiMetrics>,
    pub clock: Arc<dyn Clock>,
}

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;
