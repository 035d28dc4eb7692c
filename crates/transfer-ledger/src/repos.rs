//! Lookups and plain inserts. Balance mutation lives in [`crate::transfer`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use transfer_models::{to_cents, Account, EntryStatus, EntryType, LedgerEntry, UserProfile};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::schema::{AccountRow, EntryRow, UserRow};

/// Fields needed to register a user. Registration itself happens elsewhere; this is
/// used by seeding and tests.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub last_country: Option<String>,
    pub usual_activity_hour: Option<u32>,
    pub receive_anomaly_protection: bool,
}

pub struct UserRepo;

impl UserRepo {
    pub async fn insert(
        pool: &SqlitePool,
        user: &NewUser,
        now: DateTime<Utc>,
    ) -> LedgerResult<UserProfile> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, name, last_country, usual_activity_hour,
                 receive_anomaly_protection, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.last_country)
        .bind(user.usual_activity_hour.map(i64::from))
        .bind(user.receive_anomaly_protection)
        .bind(now.timestamp_millis())
        .execute(pool)
        .await?;
        Self::get_by_id(pool, &id).await
    }

    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> LedgerResult<UserProfile> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| LedgerError::not_found("User", id))
    }

    /// Case-insensitive email lookup.
    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> LedgerResult<Option<UserProfile>> {
        let row =
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
                .bind(email.trim())
                .fetch_optional(pool)
                .await?;
        Ok(row.map(UserProfile::from))
    }

    pub async fn set_receive_protection(
        pool: &SqlitePool,
        id: &str,
        enabled: bool,
    ) -> LedgerResult<bool> {
        let result = sqlx::query("UPDATE users SET receive_anomaly_protection = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("User", id));
        }
        Ok(enabled)
    }
}

pub struct AccountRepo;

impl AccountRepo {
    pub async fn insert(
        pool: &SqlitePool,
        user_id: &str,
        balance: Decimal,
        currency: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let cents = to_cents(balance)
            .filter(|cents| *cents >= 0)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("opening balance {balance}")))?;
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO accounts (id, user_id, balance_cents, currency, created_at_ms)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(cents)
        .bind(currency)
        .bind(now.timestamp_millis())
        .execute(pool)
        .await?;
        Self::get_by_id(pool, &id).await
    }

    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> LedgerResult<Account> {
        sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Account::from)
            .ok_or_else(|| LedgerError::not_found("Account", id))
    }

    /// The user's oldest account, which transfers debit and credit.
    pub async fn primary_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> LedgerResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE user_id = ? ORDER BY created_at_ms, id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(Account::from))
    }

    pub async fn total_balance(pool: &SqlitePool) -> LedgerResult<Decimal> {
        let (cents,): (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(balance_cents), 0) FROM accounts")
                .fetch_one(pool)
                .await?;
        Ok(transfer_models::from_cents(cents))
    }
}

/// A history row written outside the transfer path (salary, card spend, ...).
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub user_id: &'a str,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub risk_score: Option<f64>,
    pub description: &'a str,
    pub created_at: DateTime<Utc>,
}

pub struct EntryRepo;

impl EntryRepo {
    pub async fn insert(pool: &SqlitePool, entry: &NewEntry<'_>) -> LedgerResult<LedgerEntry> {
        let cents = to_cents(entry.amount)
            .filter(|cents| *cents > 0)
            .ok_or_else(|| LedgerError::InvalidAmount(entry.amount.to_string()))?;
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (id, user_id, amount_cents, entry_type, status, risk_score,
                 description, created_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(entry.user_id)
        .bind(cents)
        .bind(entry.entry_type.as_str())
        .bind(entry.status.as_str())
        .bind(entry.risk_score)
        .bind(entry.description)
        .bind(entry.created_at.timestamp_millis())
        .execute(pool)
        .await?;
        Self::get_by_id(pool, &id).await
    }

    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> LedgerResult<LedgerEntry> {
        sqlx::query_as::<_, EntryRow>("SELECT * FROM ledger_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| LedgerError::not_found("LedgerEntry", id))?
            .try_into()
    }

    /// Newest first.
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: u32,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM ledger_entries
            WHERE user_id = ?
            ORDER BY created_at_ms DESC, id
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(LedgerEntry::try_from)
        .collect()
    }

    /// Newest entries of the user whose risk score is above `min_score`.
    pub async fn flagged_for_user(
        pool: &SqlitePool,
        user_id: &str,
        min_score: f64,
        limit: u32,
    ) -> LedgerResult<Vec<LedgerEntry>> {
        sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM ledger_entries
            WHERE user_id = ? AND risk_score IS NOT NULL AND risk_score > ?
            ORDER BY created_at_ms DESC, id
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(min_score)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(LedgerEntry::try_from)
        .collect()
    }

    pub async fn count_for_user(pool: &SqlitePool, user_id: &str) -> LedgerResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ledger_entries WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}

pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn is_known(pool: &SqlitePool, user_id: &str, device_id: &str) -> LedgerResult<bool> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM known_devices WHERE user_id = ? AND device_id = ?")
                .bind(user_id)
                .bind(device_id)
                .fetch_one(pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn remember(
        pool: &SqlitePool,
        user_id: &str,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO known_devices (user_id, device_id, first_seen_ms)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(device_id)
        .bind(now.timestamp_millis())
        .execute(pool)
        .await?;
        Ok(())
    }
}
