//! Atomic balance movement.
//!
//! The debit is a single guarded `UPDATE ... WHERE balance_cents >= amount` inside the
//! same SQLite transaction as the credit and both history inserts. The guard is
//! evaluated against the balance at commit time, so concurrent debits of one account
//! serialize on the write lock and can never overdraw it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};
use transfer_models::{from_cents, min_transfer_amount, to_cents, EntryStatus, EntryType};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// One side of a transfer.
#[derive(Debug, Clone, Copy)]
pub struct Party<'a> {
    pub user_id: &'a str,
    pub account_id: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone)]
pub struct TransferCommit<'a> {
    pub sender: Party<'a>,
    pub recipient: Party<'a>,
    pub amount: Decimal,
    pub risk_score: f64,
    pub description: Option<&'a str>,
    pub device_id: Option<&'a str>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransfer {
    pub sender_entry_id: String,
    pub recipient_entry_id: String,
    pub new_balance: Decimal,
}

#[derive(Debug, Clone)]
pub struct HoldRequest<'a> {
    pub sender_id: &'a str,
    pub recipient_name: &'a str,
    pub amount: Decimal,
    pub risk_score: f64,
    pub description: Option<&'a str>,
    pub now: DateTime<Utc>,
}

/// Validates an amount and converts it to cents.
pub fn amount_to_cents(amount: Decimal) -> LedgerResult<i64> {
    if amount < min_transfer_amount() {
        return Err(LedgerError::InvalidAmount(format!(
            "minimum transfer amount is {}",
            min_transfer_amount()
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} has more than two decimal places"
        )));
    }
    to_cents(amount).ok_or_else(|| LedgerError::InvalidAmount(format!("{amount} is too large")))
}

fn with_note(base: String, description: Option<&str>) -> String {
    match description.map(str::trim).filter(|d| !d.is_empty()) {
        Some(note) => format!("{base}: {note}"),
        None => base,
    }
}

#[allow(clippy::too_many_arguments)]
async fn insert_entry(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: &str,
    cents: i64,
    entry_type: EntryType,
    status: EntryStatus,
    risk_score: Option<f64>,
    description: &str,
    now: DateTime<Utc>,
) -> LedgerResult<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO ledger_entries
            (id, user_id, amount_cents, entry_type, status, risk_score, description, created_at_ms)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(cents)
    .bind(entry_type.as_str())
    .bind(status.as_str())
    .bind(risk_score)
    .bind(description)
    .bind(now.timestamp_millis())
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Debits the sender, credits the recipient and writes both COMPLETED entries, all or
/// nothing. Also remembers the sender's device once the transfer went through.
pub async fn commit_transfer(
    pool: &SqlitePool,
    commit: &TransferCommit<'_>,
) -> LedgerResult<CompletedTransfer> {
    if commit.sender.user_id == commit.recipient.user_id
        || commit.sender.account_id == commit.recipient.account_id
    {
        return Err(LedgerError::SelfTransfer);
    }
    let cents = amount_to_cents(commit.amount)?;

    let mut tx = pool.begin().await?;

    let debit = sqlx::query(
        r#"
        UPDATE accounts SET balance_cents = balance_cents - ?1
        WHERE id = ?2 AND balance_cents >= ?1
        "#,
    )
    .bind(cents)
    .bind(commit.sender.account_id)
    .execute(&mut *tx)
    .await?;

    if debit.rows_affected() == 0 {
        let available: Option<i64> =
            sqlx::query_scalar("SELECT balance_cents FROM accounts WHERE id = ?")
                .bind(commit.sender.account_id)
                .fetch_optional(&mut *tx)
                .await?;
        tx.rollback().await?;
        return Err(match available {
            Some(available) => {
                warn!(
                    "transfer from {} rejected at commit: balance {} below {}",
                    commit.sender.user_id,
                    from_cents(available),
                    commit.amount
                );
                LedgerError::InsufficientFunds {
                    required: commit.amount,
                    available: from_cents(available),
                }
            }
            None => LedgerError::not_found("Account", commit.sender.account_id),
        });
    }

    let credit = sqlx::query("UPDATE accounts SET balance_cents = balance_cents + ? WHERE id = ?")
        .bind(cents)
        .bind(commit.recipient.account_id)
        .execute(&mut *tx)
        .await?;
    if credit.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(LedgerError::not_found("Account", commit.recipient.account_id));
    }

    let sender_entry_id = insert_entry(
        &mut tx,
        commit.sender.user_id,
        cents,
        EntryType::OutgoingTransfer,
        EntryStatus::Completed,
        Some(commit.risk_score),
        &with_note(format!("Transfer to {}", commit.recipient.name), commit.description),
        commit.now,
    )
    .await?;
    let recipient_entry_id = insert_entry(
        &mut tx,
        commit.recipient.user_id,
        cents,
        EntryType::Income,
        EntryStatus::Completed,
        None,
        &format!("Received from {}", commit.sender.name),
        commit.now,
    )
    .await?;

    if let Some(device_id) = commit.device_id {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO known_devices (user_id, device_id, first_seen_ms)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(commit.sender.user_id)
        .bind(device_id)
        .bind(commit.now.timestamp_millis())
        .execute(&mut *tx)
        .await?;
    }

    let (balance_cents,): (i64,) =
        sqlx::query_as("SELECT balance_cents FROM accounts WHERE id = ?")
            .bind(commit.sender.account_id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;
    info!(
        "transfer committed: {} -> {} amount {} score {}",
        commit.sender.user_id, commit.recipient.user_id, commit.amount, commit.risk_score
    );

    Ok(CompletedTransfer {
        sender_entry_id,
        recipient_entry_id,
        new_balance: from_cents(balance_cents),
    })
}

/// Writes the single PENDING entry of a held transfer. Balances are untouched.
pub async fn record_hold(pool: &SqlitePool, hold: &HoldRequest<'_>) -> LedgerResult<String> {
    let cents = amount_to_cents(hold.amount)?;
    let mut tx = pool.begin().await?;
    let id = insert_entry(
        &mut tx,
        hold.sender_id,
        cents,
        EntryType::OutgoingTransfer,
        EntryStatus::Pending,
        Some(hold.risk_score),
        &with_note(
            format!("Transfer to {} (under review)", hold.recipient_name),
            hold.description,
        ),
        hold.now,
    )
    .await?;
    tx.commit().await?;
    warn!(
        "transfer from {} held for review: amount {} score {}",
        hold.sender_id, hold.amount, hold.risk_score
    );
    Ok(id)
}
