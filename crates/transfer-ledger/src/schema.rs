//! Table layout and row mapping.
//!
//! Money is stored as integer cents and timestamps as unix milliseconds so that
//! guards and windows are plain integer comparisons inside SQLite.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;
use transfer_models::{from_cents, Account, EntryStatus, EntryType, LedgerEntry, UserProfile};

use crate::error::{LedgerError, LedgerResult};

const SCHEMA: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        name TEXT NOT NULL,
        last_country TEXT,
        usual_activity_hour INTEGER,
        receive_anomaly_protection INTEGER NOT NULL DEFAULT 0,
        created_at_ms INTEGER NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        balance_cents INTEGER NOT NULL CHECK (balance_cents >= 0),
        currency TEXT NOT NULL DEFAULT 'USD',
        created_at_ms INTEGER NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts (user_id, created_at_ms)",
    "
    CREATE TABLE IF NOT EXISTS ledger_entries (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
        entry_type TEXT NOT NULL,
        status TEXT NOT NULL,
        risk_score REAL,
        description TEXT NOT NULL,
        created_at_ms INTEGER NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_entries_user_time ON ledger_entries (user_id, created_at_ms)",
    "
    CREATE TRIGGER IF NOT EXISTS ledger_entries_risk_score_immutable
    BEFORE UPDATE OF risk_score ON ledger_entries
    WHEN OLD.risk_score IS NOT NEW.risk_score
    BEGIN
        SELECT RAISE(ABORT, 'risk_score is immutable');
    END
    ",
    "
    CREATE TABLE IF NOT EXISTS known_devices (
        user_id TEXT NOT NULL REFERENCES users(id),
        device_id TEXT NOT NULL,
        first_seen_ms INTEGER NOT NULL,
        PRIMARY KEY (user_id, device_id)
    )
    ",
];

pub async fn ensure_schema(pool: &SqlitePool) -> LedgerResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

pub(crate) fn millis_to_datetime(ms: i64) -> LedgerResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| LedgerError::CorruptRow(format!("timestamp out of range: {ms}")))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub last_country: Option<String>,
    pub usual_activity_hour: Option<i64>,
    pub receive_anomaly_protection: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: String,
    pub user_id: String,
    pub balance_cents: i64,
    pub currency: String,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub entry_type: String,
    pub status: String,
    pub risk_score: Option<f64>,
    pub description: String,
    pub created_at_ms: i64,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            last_country: row.last_country,
            usual_activity_hour: row
                .usual_activity_hour
                .and_then(|hour| u32::try_from(hour).ok())
                .filter(|hour| *hour < 24),
            receive_anomaly_protection: row.receive_anomaly_protection,
        }
    }
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            balance: from_cents(row.balance_cents),
            currency: row.currency,
        }
    }
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = LedgerError;

    fn try_from(row: EntryRow) -> LedgerResult<Self> {
        let entry_type = EntryType::parse(&row.entry_type).ok_or_else(|| {
            LedgerError::CorruptRow(format!("entry {} has type {}", row.id, row.entry_type))
        })?;
        let status = EntryStatus::parse(&row.status).ok_or_else(|| {
            LedgerError::CorruptRow(format!("entry {} has status {}", row.id, row.status))
        })?;
        Ok(Self {
            amount: from_cents(row.amount_cents),
            entry_type,
            status,
            risk_score: row.risk_score,
            created_at: millis_to_datetime(row.created_at_ms)?,
            id: row.id,
            user_id: row.user_id,
            description: row.description,
        })
    }
}
