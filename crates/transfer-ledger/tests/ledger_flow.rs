//! End-to-end ledger behavior against SQLite.

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;
use transfer_ledger::{
    AccountRepo, DeviceRepo, EntryRepo, HoldRequest, LedgerError, NewEntry, NewUser, Party,
    TransferCommit, TransferLedger, UserRepo,
};
use transfer_models::{Account, EntryStatus, EntryType, UserProfile};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap()
}

async fn user_with_balance(
    ledger: &TransferLedger,
    email: &str,
    name: &str,
    balance: rust_decimal::Decimal,
) -> (UserProfile, Account) {
    let user = UserRepo::insert(
        ledger.pool(),
        &NewUser {
            email: email.to_string(),
            name: name.to_string(),
            last_country: Some("US".to_string()),
            usual_activity_hour: Some(14),
            receive_anomaly_protection: false,
        },
        now(),
    )
    .await
    .unwrap();
    let account = AccountRepo::insert(ledger.pool(), &user.id, balance, "USD", now())
        .await
        .unwrap();
    (user, account)
}

fn commit<'a>(
    sender: &'a (UserProfile, Account),
    recipient: &'a (UserProfile, Account),
    amount: rust_decimal::Decimal,
) -> TransferCommit<'a> {
    TransferCommit {
        sender: Party {
            user_id: &sender.0.id,
            account_id: &sender.1.id,
            name: &sender.0.name,
        },
        recipient: Party {
            user_id: &recipient.0.id,
            account_id: &recipient.1.id,
            name: &recipient.0.name,
        },
        amount,
        risk_score: 12.5,
        description: Some("dinner"),
        device_id: Some("dev-1"),
        now: now(),
    }
}

#[tokio::test]
async fn completed_transfer_moves_money_and_writes_both_entries() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let john = user_with_balance(&ledger, "john@example.com", "John", dec!(100)).await;
    let jane = user_with_balance(&ledger, "jane@example.com", "Jane", dec!(0)).await;

    let done = ledger.commit_transfer(&commit(&john, &jane, dec!(50))).await.unwrap();
    assert_eq!(done.new_balance, dec!(50));

    let john_acct = AccountRepo::get_by_id(ledger.pool(), &john.1.id).await.unwrap();
    let jane_acct = AccountRepo::get_by_id(ledger.pool(), &jane.1.id).await.unwrap();
    assert_eq!(john_acct.balance, dec!(50));
    assert_eq!(jane_acct.balance, dec!(50));
    assert_eq!(AccountRepo::total_balance(ledger.pool()).await.unwrap(), dec!(100));

    let outgoing = EntryRepo::get_by_id(ledger.pool(), &done.sender_entry_id).await.unwrap();
    assert_eq!(outgoing.entry_type, EntryType::OutgoingTransfer);
    assert_eq!(outgoing.status, EntryStatus::Completed);
    assert_eq!(outgoing.amount, dec!(50));
    assert_eq!(outgoing.risk_score, Some(12.5));
    assert_eq!(outgoing.description, "Transfer to Jane: dinner");

    let income = EntryRepo::get_by_id(ledger.pool(), &done.recipient_entry_id).await.unwrap();
    assert_eq!(income.entry_type, EntryType::Income);
    assert_eq!(income.status, EntryStatus::Completed);
    assert_eq!(income.user_id, jane.0.id);
    assert_eq!(income.risk_score, None);
    assert_eq!(income.description, "Received from John");

    assert!(DeviceRepo::is_known(ledger.pool(), &john.0.id, "dev-1").await.unwrap());
}

#[tokio::test]
async fn insufficient_funds_leaves_no_trace() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let john = user_with_balance(&ledger, "john@example.com", "John", dec!(30)).await;
    let jane = user_with_balance(&ledger, "jane@example.com", "Jane", dec!(5)).await;

    let err = ledger
        .commit_transfer(&commit(&john, &jane, dec!(30.01)))
        .await
        .unwrap_err();
    match err {
        LedgerError::InsufficientFunds { required, available } => {
            assert_eq!(required, dec!(30.01));
            assert_eq!(available, dec!(30));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(AccountRepo::get_by_id(ledger.pool(), &john.1.id).await.unwrap().balance, dec!(30));
    assert_eq!(AccountRepo::get_by_id(ledger.pool(), &jane.1.id).await.unwrap().balance, dec!(5));
    assert_eq!(EntryRepo::count_for_user(ledger.pool(), &john.0.id).await.unwrap(), 0);
    assert_eq!(EntryRepo::count_for_user(ledger.pool(), &jane.0.id).await.unwrap(), 0);
    assert!(!DeviceRepo::is_known(ledger.pool(), &john.0.id, "dev-1").await.unwrap());
}

#[tokio::test]
async fn self_transfer_and_bad_amounts_are_rejected() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let john = user_with_balance(&ledger, "john@example.com", "John", dec!(100)).await;
    let jane = user_with_balance(&ledger, "jane@example.com", "Jane", dec!(0)).await;

    let err = ledger.commit_transfer(&commit(&john, &john, dec!(10))).await.unwrap_err();
    assert!(matches!(err, LedgerError::SelfTransfer));

    let err = ledger.commit_transfer(&commit(&john, &jane, dec!(0.001))).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    assert_eq!(AccountRepo::total_balance(ledger.pool()).await.unwrap(), dec!(100));
}

#[tokio::test]
async fn hold_records_pending_entry_without_moving_money() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let john = user_with_balance(&ledger, "john@example.com", "John", dec!(100)).await;
    let jane = user_with_balance(&ledger, "jane@example.com", "Jane", dec!(0)).await;

    let id = ledger
        .record_hold(&HoldRequest {
            sender_id: &john.0.id,
            recipient_name: &jane.0.name,
            amount: dec!(75),
            risk_score: 55.0,
            description: None,
            now: now(),
        })
        .await
        .unwrap();

    let entry = EntryRepo::get_by_id(ledger.pool(), &id).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Pending);
    assert_eq!(entry.entry_type, EntryType::OutgoingTransfer);
    assert_eq!(entry.risk_score, Some(55.0));
    assert_eq!(entry.description, "Transfer to Jane (under review)");

    assert_eq!(AccountRepo::get_by_id(ledger.pool(), &john.1.id).await.unwrap().balance, dec!(100));
    assert_eq!(EntryRepo::count_for_user(ledger.pool(), &jane.0.id).await.unwrap(), 0);
}

#[tokio::test]
async fn risk_score_cannot_be_rewritten() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let john = user_with_balance(&ledger, "john@example.com", "John", dec!(100)).await;
    let jane = user_with_balance(&ledger, "jane@example.com", "Jane", dec!(0)).await;
    let done = ledger.commit_transfer(&commit(&john, &jane, dec!(10))).await.unwrap();

    let result = sqlx::query("UPDATE ledger_entries SET risk_score = 99 WHERE id = ?")
        .bind(&done.sender_entry_id)
        .execute(ledger.pool())
        .await;
    assert!(result.is_err());

    // Other columns stay writable.
    sqlx::query("UPDATE ledger_entries SET description = 'edited' WHERE id = ?")
        .bind(&done.sender_entry_id)
        .execute(ledger.pool())
        .await
        .unwrap();
    let entry = EntryRepo::get_by_id(ledger.pool(), &done.sender_entry_id).await.unwrap();
    assert_eq!(entry.risk_score, Some(12.5));
}

#[tokio::test]
async fn email_lookup_ignores_case() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let jane = user_with_balance(&ledger, "jane@example.com", "Jane", dec!(0)).await;

    let found = UserRepo::find_by_email(ledger.pool(), "  JANE@Example.com ")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, jane.0.id);
    assert!(UserRepo::find_by_email(ledger.pool(), "nobody@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn behavior_signals_respect_windows() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let john = user_with_balance(&ledger, "john@example.com", "John", dec!(1000)).await;
    let pool = ledger.pool();

    let entries = [
        (dec!(100), EntryType::Expense, EntryStatus::Completed, Duration::days(2)),
        (dec!(300), EntryType::Income, EntryStatus::Completed, Duration::days(3)),
        (dec!(40), EntryType::OutgoingTransfer, EntryStatus::Completed, Duration::seconds(30)),
        (dec!(60), EntryType::OutgoingTransfer, EntryStatus::Pending, Duration::minutes(20)),
        (dec!(900), EntryType::OutgoingTransfer, EntryStatus::Blocked, Duration::seconds(10)),
        (dec!(5000), EntryType::Expense, EntryStatus::Completed, Duration::days(8)),
    ];
    for (amount, entry_type, status, age) in entries {
        EntryRepo::insert(
            pool,
            &NewEntry {
                user_id: &john.0.id,
                amount,
                entry_type,
                status,
                risk_score: None,
                description: "history",
                created_at: now() - age,
            },
        )
        .await
        .unwrap();
    }
    DeviceRepo::remember(pool, &john.0.id, "dev-1", now() - Duration::days(1)).await.unwrap();
    DeviceRepo::remember(pool, &john.0.id, "dev-old", now() - Duration::days(30)).await.unwrap();

    let signals = ledger.behavior_signals(&john.0.id, Some("dev-1"), now()).await.unwrap();
    assert_eq!(signals.amount_total_7d, dec!(500));
    assert_eq!(signals.entry_count_7d, 4);
    assert_eq!(signals.avg_amount_7d(), Some(dec!(125)));
    assert_eq!(signals.tx_count_1m, 1);
    assert_eq!(signals.tx_count_1h, 2);
    assert_eq!(signals.devices_seen_7d, 1);
    assert!(signals.device_recognized);
    assert_eq!(signals.last_country.as_deref(), Some("US"));
    assert_eq!(signals.usual_activity_hour, Some(14));

    let unknown = ledger.behavior_signals(&john.0.id, None, now()).await.unwrap();
    assert!(!unknown.device_recognized);

    let received = ledger.receiving_history(&john.0.id, now()).await.unwrap();
    assert_eq!(received.count, 1);
    assert_eq!(received.total, dec!(300));
}

#[tokio::test]
async fn signals_for_unknown_user_is_not_found() {
    let ledger = TransferLedger::in_memory().await.unwrap();
    let err = ledger.behavior_signals("ghost", None, now()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn file_backed_ledger_persists_across_reconnects() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());

    let (john_id, account_id) = {
        let ledger = TransferLedger::connect(&url).await.unwrap();
        let john = user_with_balance(&ledger, "john@example.com", "John", dec!(24580.50)).await;
        UserRepo::set_receive_protection(ledger.pool(), &john.0.id, true).await.unwrap();
        ledger.pool().close().await;
        (john.0.id, john.1.id)
    };

    let ledger = TransferLedger::connect(&url).await.unwrap();
    let john = UserRepo::get_by_id(ledger.pool(), &john_id).await.unwrap();
    assert!(john.receive_anomaly_protection);
    let primary = AccountRepo::primary_for_user(ledger.pool(), &john_id).await.unwrap().unwrap();
    assert_eq!(primary.id, account_id);
    assert_eq!(primary.balance, dec!(24580.50));
}
