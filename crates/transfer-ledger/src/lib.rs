//! SQLite-backed ledger for the transfer service.
//!
//! Owns users, accounts, the per-user history and the device registry. Every balance
//! change goes through [`transfer::commit_transfer`], which keeps the debit, the credit
//! and both history rows in one transaction.

pub mod error;
pub mod repos;
pub mod schema;
pub mod signals;
pub mod transfer;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use risk_engine::{BehaviorSignals, ReceivingHistory};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub use error::{LedgerError, LedgerResult};
pub use repos::{AccountRepo, DeviceRepo, EntryRepo, NewEntry, NewUser, UserRepo};
pub use transfer::{amount_to_cents, CompletedTransfer, HoldRequest, Party, TransferCommit};

const MAX_CONNECTIONS: u32 = 8;

/// Handle over the connection pool. Cheap to clone.
#[derive(Clone)]
pub struct TransferLedger {
    pool: SqlitePool,
}

impl TransferLedger {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn connect(url: &str) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        schema::ensure_schema(&pool).await?;
        info!("ledger ready at {url}");
        Ok(Self { pool })
    }

    /// Private in-memory database on a single connection.
    pub async fn in_memory() -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        schema::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn commit_transfer(
        &self,
        commit: &TransferCommit<'_>,
    ) -> LedgerResult<CompletedTransfer> {
        transfer::commit_transfer(&self.pool, commit).await
    }

    pub async fn record_hold(&self, hold: &HoldRequest<'_>) -> LedgerResult<String> {
        transfer::record_hold(&self.pool, hold).await
    }

    pub async fn behavior_signals(
        &self,
        user_id: &str,
        device_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> LedgerResult<BehaviorSignals> {
        signals::behavior_signals(&self.pool, user_id, device_id, now).await
    }

    pub async fn receiving_history(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<ReceivingHistory> {
        signals::receiving_history(&self.pool, user_id, now).await
    }
}
