use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use risk_engine::{AnomalyGuard, MemoryScoreStore, RiskEngine};
use tracing::{debug, info};
use transfer_api::{router, ServiceConfig, TransferService};
use transfer_ledger::TransferLedger;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| {
                "info,transfer_api=debug,risk_engine=debug,sqlx=warn".to_string()
            }),
        )
        .init();

    let config = ServiceConfig::from_env()?;

    let ledger = TransferLedger::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open ledger at {}", config.database_url))?;

    let store = Arc::new(MemoryScoreStore::new());
    tokio::spawn(sweep_score_cache(store.clone()));

    let engine = RiskEngine::from_config(&config.risk, store)
        .context("failed to build risk engine")?;
    let guard = AnomalyGuard::new(config.risk.anomaly_multiplier);
    let service = Arc::new(TransferService::new(ledger, engine, guard));

    let app = router(service);

    info!(
        "transfer-api listening on {} (policy {}, hold_at {}, block_at {})",
        config.bind_addr,
        config.risk.policy_version,
        config.risk.policy.hold_at(),
        config.risk.policy.block_at()
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn sweep_score_cache(store: Arc<MemoryScoreStore>) {
    let mut ticker = tokio::time::interval(CACHE_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        let purged = store.purge_expired();
        if purged > 0 {
            debug!("purged {purged} expired risk scores");
        }
    }
}
