use std::{env, net::SocketAddr};

use anyhow::Context;
use risk_engine::RiskConfig;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub risk: RiskConfig,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:transfers.db?mode=rwc".to_string());
        let bind_addr: SocketAddr = env::var("TRANSFER_API_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("invalid TRANSFER_API_BIND")?;
        let risk = RiskConfig::from_env().context("invalid risk configuration")?;
        Ok(Self {
            database_url,
            bind_addr,
            risk,
        })
    }
}
