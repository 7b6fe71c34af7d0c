//! `bonds-api` binary.
//!
//! Configuration comes from the TOML file named by `BONDS_CONFIG` (optional),
//! then environment overrides such as `PORT`, `JWT_SECRET` and `FRONTEND_URL`.

use anyhow::{Context, Result};
use sovereign_bonds_api::domain::config::LogConfig;
use sovereign_bonds_api::{BondsService, ServiceConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "BONDS_CONFIG";

fn load_config() -> Result<ServiceConfig> {
    let mut config = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {path}"))?;
            ServiceConfig::from_toml_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        Err(_) => ServiceConfig::default(),
    };
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("applying environment overrides")?;
    Ok(config)
}

fn init_logging(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config.log);

    info!(
        version = sovereign_bonds_api::VERSION,
        environment = config.environment.as_str(),
        "Starting Sovereign Bonds API"
    );

    let service = BondsService::new(config).context("building service")?;
    service.serve().await.context("serving HTTP")?;
    Ok(())
}
