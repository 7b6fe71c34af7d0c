//! Bonds service: wiring, demo seeding and the HTTP server.

use crate::accounts::Accounts;
use crate::adapters::seed::{demo_bonds, demo_transactions, demo_users, DEMO_PASSWORD};
use crate::adapters::{
    InMemoryBondRepository, InMemoryTransactionRepository, InMemoryUserRepository, LogNotifier,
    SystemClock,
};
use crate::auth::AuthService;
use crate::catalog::BondCatalog;
use crate::domain::{BondsError, BondsResult, ConfigError, ServiceConfig};
use crate::http::{reveal_internal_details, routes, AppState};
use crate::ledger::{ConfirmRequest, Ledger};
use crate::middleware::{create_cors_layer, ApiMetrics, RateLimitLayer, TracingLayer};
use crate::ports::{BondRepository, Clock, CodeNotifier, TransactionRepository, UserRepository};
use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tracing::{debug, error, info};

/// Prefix the request limiter applies to.
pub const RATE_LIMIT_SCOPE: &str = "/api";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("initialization failed: {0}")]
    Init(#[from] BondsError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts from one demo seeding pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub bonds: usize,
    pub users: usize,
    pub transactions: usize,
}

pub struct BondsService {
    config: ServiceConfig,
    state: AppState,
    rate_limit: RateLimitLayer,
    seeded: SeedReport,
}

impl BondsService {
    /// Build the service on the system clock, logging codes instead of mailing them.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(LogNotifier))
    }

    pub fn with_parts(
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn CodeNotifier>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let users: Arc<dyn UserRepository> = Arc::new(InMemoryUserRepository::new());
        let bond_repo = if config.seed_demo_data {
            InMemoryBondRepository::with_bonds(demo_bonds())
        } else {
            InMemoryBondRepository::new()
        };
        let bonds: Arc<dyn BondRepository> = Arc::new(bond_repo);
        let transactions: Arc<dyn TransactionRepository> =
            Arc::new(InMemoryTransactionRepository::new());

        let auth = Arc::new(AuthService::new(
            &config.auth,
            config.limits.clone(),
            Arc::clone(&users),
            Arc::clone(&clock),
            notifier,
        )?);
        let catalog = Arc::new(BondCatalog::new(
            Arc::clone(&bonds),
            Arc::clone(&transactions),
            Arc::clone(&clock),
        ));
        let ledger = Arc::new(Ledger::new(
            Arc::clone(&bonds),
            Arc::clone(&transactions),
            Arc::clone(&users),
            Arc::clone(&clock),
            config.fees.fee_bps,
            config.settlement.clone(),
        ));
        let accounts = Arc::new(Accounts::new(
            Arc::clone(&users),
            Arc::clone(&bonds),
            Arc::clone(&transactions),
            Arc::clone(&clock),
            config.limits.clone(),
        ));
        let metrics = Arc::new(ApiMetrics::new());
        let rate_limit = RateLimitLayer::new(
            config.rate_limit.clone(),
            Arc::clone(&metrics),
            RATE_LIMIT_SCOPE,
        );

        let state = AppState {
            auth,
            catalog,
            ledger,
            accounts,
            metrics,
            clock,
        };

        let seeded = if config.seed_demo_data {
            seed(
                &state,
                users.as_ref(),
                bonds.as_ref(),
                transactions.as_ref(),
                &config,
            )?
        } else {
            SeedReport::default()
        };
        if seeded != SeedReport::default() {
            info!(
                bonds = seeded.bonds,
                users = seeded.users,
                transactions = seeded.transactions,
                "Seeded demo data"
            );
        }

        Ok(Self {
            config,
            state,
            rate_limit,
            seeded,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn seeded(&self) -> SeedReport {
        self.seeded
    }

    pub fn metrics(&self) -> Arc<ApiMetrics> {
        Arc::clone(&self.state.metrics)
    }

    /// Full HTTP surface with the middleware stack applied.
    pub fn router(&self) -> Router {
        let mut router = routes::router(self.config.settlement.api_key.as_deref())
            .with_state(self.state.clone());

        if !self.config.environment.is_production() {
            router = router.layer(axum::middleware::map_response(reveal_internal_details));
        }

        // Outermost first
        let middleware = ServiceBuilder::new()
            .layer(DefaultBodyLimit::max(self.config.http.body_limit))
            .layer(create_cors_layer(&self.config.cors))
            .layer(TracingLayer::new(Arc::clone(&self.state.metrics)))
            .layer(self.rate_limit.clone());

        router.layer(middleware)
    }

    /// Drop expired codes, stale lockout windows and idle rate-limit buckets.
    pub fn sweep(&self) -> SweepReport {
        let (codes, attempts) = self.state.auth.sweep();
        let buckets = self
            .rate_limit
            .state()
            .cleanup(self.config.rate_limit.window);
        SweepReport {
            codes,
            attempts,
            buckets,
        }
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> Result<(), ServiceError> {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(
            addr = %addr,
            environment = self.config.environment.as_str(),
            "Starting HTTP server"
        );

        let router = self.router();
        let service = Arc::new(self);
        let sweeper = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let mut interval =
                    tokio::time::interval(service.config.maintenance.sweep_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    let report = service.sweep();
                    debug!(
                        codes = report.codes,
                        attempts = report.attempts,
                        buckets = report.buckets,
                        "Maintenance sweep"
                    );
                }
            })
        };

        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        sweeper.abort();
        info!("Bonds API stopped");
        result.map_err(ServiceError::from)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub codes: usize,
    pub attempts: usize,
    pub buckets: usize,
}

fn seed(
    state: &AppState,
    users: &dyn UserRepository,
    bonds: &dyn BondRepository,
    transactions: &dyn TransactionRepository,
    config: &ServiceConfig,
) -> BondsResult<SeedReport> {
    let bond_list = bonds.list()?;
    let hash = state.auth.hasher().hash(DEMO_PASSWORD)?;
    let demo = demo_users(&hash, &config.limits);
    let user_count = demo.len();

    let investor = demo.first().map(|u| u.id);
    for user in demo {
        users.insert(user)?;
    }

    let mut settled = 0;
    if let Some(investor) = investor {
        for (new, block) in demo_transactions(investor, &bond_list, config.fees.fee_bps)? {
            let tx = transactions.insert(new)?;
            state.ledger.confirm(
                tx.id,
                &ConfirmRequest {
                    block_number: Some(block),
                },
            )?;
            settled += 1;
        }
    }

    Ok(SeedReport {
        bonds: bond_list.len(),
        users: user_count,
        transactions: settled,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::seed::DEMO_TOTP_SECRET;
    use crate::adapters::{ManualClock, OutboxNotifier};
    use crate::auth::{totp, LoginOutcome, LoginRequest, VerifyTwoFactorRequest};
    use crate::domain::config::Argon2Config;
    use crate::domain::{Environment, TransactionStatus};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::TimeZone;
    use tower::ServiceExt;

    fn test_config(seed: bool) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.seed_demo_data = seed;
        config.auth.argon2 = Argon2Config {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    fn build(config: ServiceConfig) -> BondsService {
        let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap());
        BondsService::with_parts(config, Arc::new(clock), Arc::new(OutboxNotifier::new())).unwrap()
    }

    /// Password then TOTP for the 2FA-enabled demo investor.
    fn login_demo(state: &AppState) -> (String, String) {
        let outcome = state
            .auth
            .login(&LoginRequest {
                email: "jean.dupont@email.com".into(),
                password: DEMO_PASSWORD.into(),
            })
            .unwrap();
        let LoginOutcome::TwoFactorRequired { temp_token } = outcome else {
            panic!("demo investor has 2FA enabled");
        };
        let code = totp::code_at(DEMO_TOTP_SECRET, state.clock.now().timestamp()).unwrap();
        let grant = state
            .auth
            .verify_two_factor(&VerifyTwoFactorRequest {
                temp_token: temp_token.clone(),
                token: code,
            })
            .unwrap();
        (temp_token, grant.token)
    }

    #[test]
    fn test_seed_demo_data() {
        let service = build(test_config(true));
        let report = service.seeded();
        assert_eq!(report.bonds, 3);
        assert_eq!(report.users, 2);
        assert_eq!(report.transactions, 2);

        let state = service.state();
        let (_, grant) = login_demo(&state);
        let jean = state.auth.authenticate(Some(&grant)).unwrap();
        let portfolio = state.accounts.portfolio(&jean).unwrap();
        assert_eq!(portfolio.holdings.len(), 2);
        assert_eq!(portfolio.total_invested.amount, 3_250_000 + 1_950_000);
        assert!(portfolio
            .recent_activity
            .iter()
            .all(|a| a.status == TransactionStatus::Completed));
    }

    #[test]
    fn test_no_seed() {
        let service = build(test_config(false));
        assert_eq!(service.seeded(), SeedReport::default());
        assert!(service.state().catalog.list(&Default::default()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config(false);
        config.environment = Environment::Production;
        let result = BondsService::with_parts(
            config,
            Arc::new(ManualClock::default()),
            Arc::new(OutboxNotifier::new()),
        );
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_sweep_on_fresh_service() {
        let service = build(test_config(false));
        assert_eq!(service.sweep(), SweepReport::default());
    }

    #[tokio::test]
    async fn test_health_through_middleware() {
        let service = build(test_config(false));
        let response = service
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["status"], "OK");
        assert_eq!(json["data"]["service"], routes::SERVICE_NAME);
        assert_eq!(service.metrics().snapshot().total, 1);
    }
}
