//! Service configuration with validation.
//!
//! Every section has a `Default` so a bare `ServiceConfig::default()` is a
//! runnable development setup. Files are TOML; durations are written as
//! `"30s"`, `"15m"`, `"7d"`.

use super::money::{Currency, Money};
use super::user::InvestmentTier;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Signing secret used when none is configured. Rejected in production.
pub const DEFAULT_JWT_SECRET: &str = "sovereign-bonds-development-secret-change-me";

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Deployment environment
    pub environment: Environment,
    /// Authentication and session configuration
    pub auth: AuthConfig,
    /// Investment limits per verification tier
    pub limits: LimitsConfig,
    /// Transaction fees
    pub fees: FeeConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Settlement collaborator configuration
    pub settlement: SettlementConfig,
    /// Background maintenance
    pub maintenance: MaintenanceConfig,
    /// Log output
    pub log: LogConfig,
    /// Load demo bonds, users and transactions at startup
    pub seed_demo_data: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            environment: Environment::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            fees: FeeConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            settlement: SettlementConfig::default(),
            maintenance: MaintenanceConfig::default(),
            log: LogConfig::default(),
            seed_demo_data: true,
        }
    }
}

impl ServiceConfig {
    /// Parse a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.http.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a port: {port}")))?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(origin) = lookup("FRONTEND_URL") {
            self.cors.allowed_origins = vec![origin];
        }
        if let Some(env) = lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            self.environment = match env.trim().to_ascii_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                _ => Environment::Development,
            };
        }
        if let Some(key) = lookup("SETTLEMENT_API_KEY") {
            self.settlement.api_key = Some(key).filter(|k| !k.is_empty());
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::InsecureSecret("JWT secret cannot be empty".into()));
        }
        if self.environment.is_production() && self.auth.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureSecret(
                "default JWT secret is not allowed in production".into(),
            ));
        }

        if self.http.body_limit == 0 {
            return Err(ConfigError::InvalidLimit("body_limit cannot be 0".into()));
        }

        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidRateLimit("max_requests cannot be 0".into()));
        }
        if self.rate_limit.window.is_zero() {
            return Err(ConfigError::InvalidRateLimit("window cannot be 0".into()));
        }

        for (name, ttl) in [
            ("session_ttl", self.auth.session_ttl),
            ("two_factor_ttl", self.auth.two_factor_ttl),
            ("email_code_ttl", self.auth.email_code_ttl),
            ("reset_code_ttl", self.auth.reset_code_ttl),
            ("lockout_window", self.auth.lockout_window),
            ("sweep_interval", self.maintenance.sweep_interval),
        ] {
            if ttl.is_zero() {
                return Err(ConfigError::InvalidTimeout(format!("{name} cannot be 0")));
            }
        }

        if self.auth.lockout_threshold == 0 {
            return Err(ConfigError::Invalid("lockout_threshold cannot be 0".into()));
        }
        if self.auth.totp_issuer.is_empty()
            || !self
                .auth
                .totp_issuer
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ConfigError::Invalid(
                "totp_issuer must be non-empty and URI-safe".into(),
            ));
        }

        if self.fees.fee_bps > 10_000 {
            return Err(ConfigError::Invalid("fee_bps cannot exceed 10000".into()));
        }

        let tiers = self.limits.ordered();
        if tiers.windows(2).any(|w| w[0] > w[1]) {
            return Err(ConfigError::InvalidLimit(
                "tier limits must not decrease with verification level".into(),
            ));
        }

        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| o == "*") {
            return Err(ConfigError::Invalid(
                "CORS credentials cannot be combined with a wildcard origin".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 3001)
    pub port: u16,
    /// Max request body size in bytes (default: 10MB)
    pub body_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3001,
            body_limit: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Deployment environment. Controls error detail exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC-SHA256 signing secret for session tokens
    pub jwt_secret: String,
    /// Lifetime of a session token
    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,
    /// Lifetime of the intermediate token issued when 2FA is required
    #[serde(with = "humantime_serde")]
    pub two_factor_ttl: Duration,
    /// Lifetime of an email verification code
    #[serde(with = "humantime_serde")]
    pub email_code_ttl: Duration,
    /// Lifetime of a password reset code
    #[serde(with = "humantime_serde")]
    pub reset_code_ttl: Duration,
    /// Failures that trigger a lockout
    pub lockout_threshold: u32,
    /// Sliding window for counting failures
    #[serde(with = "humantime_serde")]
    pub lockout_window: Duration,
    /// Accepted TOTP drift in 30 second steps, each direction
    pub totp_skew: u8,
    /// Issuer label in provisioning URIs
    pub totp_issuer: String,
    /// Password hashing cost
    pub argon2: Argon2Config,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            session_ttl: Duration::from_secs(7 * 24 * 3600),
            two_factor_ttl: Duration::from_secs(10 * 60),
            email_code_ttl: Duration::from_secs(15 * 60),
            reset_code_ttl: Duration::from_secs(30 * 60),
            lockout_threshold: 5,
            lockout_window: Duration::from_secs(15 * 60),
            totp_skew: 2,
            totp_issuer: "SovereignBonds".to_string(),
            argon2: Argon2Config::default(),
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        // OWASP minimum for argon2id
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Investment limits reached at each verification milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub currency: Currency,
    pub base: i64,
    pub email_verified: i64,
    pub kyc_submitted: i64,
    pub two_factor: i64,
    pub kyc_verified: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            currency: Currency::Xof,
            base: 650_000,
            email_verified: 3_250_000,
            kyc_submitted: 6_500_000,
            two_factor: 32_500_000,
            kyc_verified: 65_000_000,
        }
    }
}

impl LimitsConfig {
    pub fn limit_for(&self, tier: InvestmentTier) -> Money {
        let amount = match tier {
            InvestmentTier::Base => self.base,
            InvestmentTier::EmailVerified => self.email_verified,
            InvestmentTier::KycSubmitted => self.kyc_submitted,
            InvestmentTier::TwoFactor => self.two_factor,
            InvestmentTier::KycVerified => self.kyc_verified,
        };
        Money::new(amount, self.currency)
    }

    fn ordered(&self) -> [i64; 5] {
        [
            self.base,
            self.email_verified,
            self.kyc_submitted,
            self.two_factor,
            self.kyc_verified,
        ]
    }
}

/// Transaction fee configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Fee in basis points of the invested amount (50 = 0.5%)
    pub fee_bps: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self { fee_bps: 50 }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
    /// Allow credentials
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            max_age: 86400, // 24 hours
            allow_credentials: true,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Requests allowed per IP per window
    pub max_requests: u32,
    /// Window over which `max_requests` replenish
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    /// IPs exempt from rate limiting
    pub whitelist: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            whitelist: Vec::new(),
        }
    }
}

/// Settlement collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Key required on the confirmation endpoint (None = endpoint disabled)
    pub api_key: Option<String>,
    /// Network label reported on transaction details
    pub network: String,
    /// Prefix joined with the transaction hash to build an explorer link
    pub explorer_base_url: String,
    /// Confirmations reported once a transaction carries a block number
    pub confirmations: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            network: "Polygon".to_string(),
            explorer_base_url: "https://polygonscan.com/tx/".to_string(),
            confirmations: 25,
        }
    }
}

/// Background maintenance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Interval between sweeps of expired codes, attempts and buckets
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be parsed
    #[error("config parse error: {0}")]
    Parse(String),
    /// Signing secret missing or unsafe
    #[error("insecure secret: {0}")]
    InsecureSecret(String),
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid size or amount limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        let unit = |digits: &str, scale: u64, err: &'static str| {
            digits
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|n| n.checked_mul(scale))
                .ok_or(err)
        };
        // "ms" before "s"
        if let Some(ms) = s.strip_suffix("ms") {
            unit(ms, 1, "invalid milliseconds").map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            unit(secs, 1, "invalid seconds").map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            unit(mins, 60, "invalid minutes").map(Duration::from_secs)
        } else if let Some(hours) = s.strip_suffix('h') {
            unit(hours, 3600, "invalid hours").map(Duration::from_secs)
        } else if let Some(days) = s.strip_suffix('d') {
            unit(days, 86_400, "invalid days").map(Duration::from_secs)
        } else {
            // Try parsing as plain seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.port, 3001);
        assert_eq!(config.fees.fee_bps, 50);
        assert_eq!(config.auth.lockout_threshold, 5);
        assert_eq!(config.http_addr().port(), 3001);
    }

    #[test]
    fn test_production_rejects_default_secret() {
        let mut config = ServiceConfig::default();
        config.environment = Environment::Production;
        assert!(matches!(config.validate(), Err(ConfigError::InsecureSecret(_))));

        config.auth.jwt_secret = "a-real-secret-from-the-vault".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wildcard_origin_with_credentials() {
        let mut config = ServiceConfig::default();
        config.cors.allowed_origins = vec!["*".into()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.cors.allow_credentials = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_decreasing_limits_rejected() {
        let mut config = ServiceConfig::default();
        config.limits.two_factor = 1;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_rate_limit_validation() {
        let mut config = ServiceConfig::default();
        config.rate_limit.max_requests = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PORT", "8080"),
            ("JWT_SECRET", "from-env"),
            ("FRONTEND_URL", "https://app.example.com"),
            ("NODE_ENV", "production"),
            ("SETTLEMENT_API_KEY", "settle-key"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.auth.jwt_secret, "from-env");
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.settlement.api_key.as_deref(), Some("settle-key"));
    }

    #[test]
    fn test_bad_port_env() {
        let mut config = ServiceConfig::default();
        let result = config.apply_env(|k| (k == "PORT").then(|| "not-a-port".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_partial_sections() {
        let config = ServiceConfig::from_toml_str(
            r#"
            environment = "production"
            seed_demo_data = false

            [http]
            port = 4000

            [auth]
            jwt_secret = "toml-secret"
            session_ttl = "1d"
            lockout_window = "10m"
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 4000);
        assert_eq!(config.http.body_limit, 10 * 1024 * 1024);
        assert!(config.environment.is_production());
        assert!(!config.seed_demo_data);
        assert_eq!(config.auth.session_ttl, Duration::from_secs(86_400));
        assert_eq!(config.auth.lockout_window, Duration::from_secs(600));
        assert_eq!(config.auth.email_code_ttl, Duration::from_secs(900));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration_units() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Ok(Duration::from_secs(900)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("7d"), Ok(Duration::from_secs(604_800)));
        assert_eq!(parse_duration("42"), Ok(Duration::from_secs(42)));
        assert!(parse_duration("soon").is_err());
    }
}
