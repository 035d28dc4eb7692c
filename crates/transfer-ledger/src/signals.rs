//! Behavior windows read by the risk pipeline and the anomaly guard.

use chrono::{DateTime, Duration, Utc};
use risk_engine::{BehaviorSignals, ReceivingHistory};
use sqlx::SqlitePool;
use transfer_models::{from_cents, EntryStatus, EntryType};

use crate::error::LedgerResult;
use crate::repos::{DeviceRepo, UserRepo};

fn window_start(now: DateTime<Utc>, window: Duration) -> i64 {
    (now - window).timestamp_millis()
}

/// Counts entries the user initiated (everything except incoming credits).
async fn initiated_since(pool: &SqlitePool, user_id: &str, since_ms: i64) -> LedgerResult<u32> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM ledger_entries
        WHERE user_id = ? AND entry_type != ? AND status != ? AND created_at_ms >= ?
        "#,
    )
    .bind(user_id)
    .bind(EntryType::Income.as_str())
    .bind(EntryStatus::Blocked.as_str())
    .bind(since_ms)
    .fetch_one(pool)
    .await?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

pub async fn behavior_signals(
    pool: &SqlitePool,
    user_id: &str,
    device_id: Option<&str>,
    now: DateTime<Utc>,
) -> LedgerResult<BehaviorSignals> {
    let user = UserRepo::get_by_id(pool, user_id).await?;
    let week_ago = window_start(now, Duration::days(7));

    let (amount_cents, entry_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0), COUNT(*) FROM ledger_entries
        WHERE user_id = ? AND status != ? AND created_at_ms >= ?
        "#,
    )
    .bind(user_id)
    .bind(EntryStatus::Blocked.as_str())
    .bind(week_ago)
    .fetch_one(pool)
    .await?;

    let tx_count_1m =
        initiated_since(pool, user_id, window_start(now, Duration::seconds(60))).await?;
    let tx_count_1h = initiated_since(pool, user_id, window_start(now, Duration::hours(1))).await?;

    let (devices_seen,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM known_devices WHERE user_id = ? AND first_seen_ms >= ?",
    )
    .bind(user_id)
    .bind(week_ago)
    .fetch_one(pool)
    .await?;

    let device_recognized = match device_id {
        Some(device_id) => DeviceRepo::is_known(pool, user_id, device_id).await?,
        None => false,
    };

    Ok(BehaviorSignals {
        amount_total_7d: from_cents(amount_cents),
        entry_count_7d: u32::try_from(entry_count).unwrap_or(u32::MAX),
        tx_count_1m,
        tx_count_1h,
        devices_seen_7d: u32::try_from(devices_seen).unwrap_or(u32::MAX),
        device_recognized,
        last_country: user.last_country,
        usual_activity_hour: user.usual_activity_hour,
    })
}

/// Completed incoming credits of the user over the trailing 7 days.
pub async fn receiving_history(
    pool: &SqlitePool,
    user_id: &str,
    now: DateTime<Utc>,
) -> LedgerResult<ReceivingHistory> {
    let (total_cents, count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount_cents), 0), COUNT(*) FROM ledger_entries
        WHERE user_id = ? AND entry_type = ? AND status = ? AND created_at_ms >= ?
        "#,
    )
    .bind(user_id)
    .bind(EntryType::Income.as_str())
    .bind(EntryStatus::Completed.as_str())
    .bind(window_start(now, Duration::days(7)))
    .fetch_one(pool)
    .await?;
    Ok(ReceivingHistory {
        total: from_cents(total_cents),
        count: u32::try_from(count).unwrap_or(u32::MAX),
    })
}
