use std::env;

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};
use transfer_ledger::{
    AccountRepo, DeviceRepo, EntryRepo, NewEntry, NewUser, TransferLedger, UserRepo,
};
use transfer_models::{EntryStatus, EntryType};

struct DemoUser {
    email: &'static str,
    name: &'static str,
    country: &'static str,
    usual_hour: u32,
    protected: bool,
    balance: Decimal,
    device: &'static str,
    /// (amount, type, description, days ago)
    history: &'static [(Decimal, EntryType, &'static str, i64)],
}

const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        email: "john@example.com",
        name: "John Doe",
        country: "US",
        usual_hour: 14,
        protected: false,
        balance: dec!(24580.50),
        device: "john-laptop",
        history: &[
            (dec!(4200.00), EntryType::Income, "Salary", 6),
            (dec!(86.40), EntryType::Expense, "Groceries", 4),
            (dec!(1250.00), EntryType::Expense, "Rent", 3),
            (dec!(42.10), EntryType::Expense, "Fuel", 1),
        ],
    },
    DemoUser {
        email: "jane@example.com",
        name: "Jane Smith",
        country: "US",
        usual_hour: 10,
        protected: true,
        balance: dec!(1200.00),
        device: "jane-phone",
        history: &[
            (dec!(150.00), EntryType::Income, "Received from Alex", 5),
            (dec!(90.00), EntryType::Income, "Received from Sam", 2),
            (dec!(35.75), EntryType::Expense, "Coffee subscription", 1),
        ],
    },
];

#[derive(Debug, Serialize)]
struct SeededUser {
    id: String,
    email: String,
    account_id: String,
    balance: Decimal,
    history_entries: usize,
    receive_anomaly_protection: bool,
}

#[derive(Debug, Serialize)]
struct SeedReport {
    database_url: String,
    reset: bool,
    created: Vec<SeededUser>,
    skipped: Vec<String>,
    total_balance: Decimal,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info,sqlx=warn".to_string()))
        .init();

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:transfers.db?mode=rwc".to_string());
    let reset = env::var("SEED_RESET")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let ledger = TransferLedger::connect(&database_url)
        .await
        .with_context(|| format!("failed to open ledger at {database_url}"))?;

    if reset {
        warn!("SEED_RESET set, wiping existing data");
        for table in ["known_devices", "ledger_entries", "accounts", "users"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(ledger.pool())
                .await
                .with_context(|| format!("failed to clear {table}"))?;
        }
    }

    let now = Utc::now();
    let mut created = Vec::new();
    let mut skipped = Vec::new();

    for demo in DEMO_USERS {
        if UserRepo::find_by_email(ledger.pool(), demo.email).await?.is_some() {
            info!("{} already present, skipping", demo.email);
            skipped.push(demo.email.to_string());
            continue;
        }

        let user = UserRepo::insert(
            ledger.pool(),
            &NewUser {
                email: demo.email.to_string(),
                name: demo.name.to_string(),
                last_country: Some(demo.country.to_string()),
                usual_activity_hour: Some(demo.usual_hour),
                receive_anomaly_protection: demo.protected,
            },
            now,
        )
        .await
        .with_context(|| format!("failed to create {}", demo.email))?;
        let account = AccountRepo::insert(ledger.pool(), &user.id, demo.balance, "USD", now).await?;
        DeviceRepo::remember(ledger.pool(), &user.id, demo.device, now - Duration::days(30)).await?;

        for (amount, entry_type, description, days_ago) in demo.history {
            EntryRepo::insert(
                ledger.pool(),
                &NewEntry {
                    user_id: &user.id,
                    amount: *amount,
                    entry_type: *entry_type,
                    status: EntryStatus::Completed,
                    risk_score: None,
                    description,
                    created_at: now - Duration::days(*days_ago),
                },
            )
            .await?;
        }

        info!("seeded {} with balance {}", user.email, account.balance);
        created.push(SeededUser {
            id: user.id,
            email: user.email,
            account_id: account.id,
            balance: account.balance,
            history_entries: demo.history.len(),
            receive_anomaly_protection: user.receive_anomaly_protection,
        });
    }

    let report = SeedReport {
        database_url,
        reset,
        created,
        skipped,
        total_balance: AccountRepo::total_balance(ledger.pool()).await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
