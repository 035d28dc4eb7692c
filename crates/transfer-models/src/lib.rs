use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Smallest amount a transfer may move (one cent).
pub fn min_transfer_amount() -> Decimal {
    Decimal::new(1, 2)
}

/// Converts a currency amount into integer minor units.
///
/// Returns `None` when the amount carries more than two decimal places or does not
/// fit into an `i64`.
pub fn to_cents(amount: Decimal) -> Option<i64> {
    if amount.normalize().scale() > 2 {
        return None;
    }
    amount.checked_mul(Decimal::ONE_HUNDRED)?.trunc().to_i64()
}

pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    pub balance: Decimal,
    pub currency: String,
}

/// Risk-relevant view of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub last_country: Option<String>,
    pub usual_activity_hour: Option<u32>,
    pub receive_anomaly_protection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    OutgoingTransfer,
    Income,
    Expense,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::OutgoingTransfer => "OUTGOING_TRANSFER",
            EntryType::Income => "INCOME",
            EntryType::Expense => "EXPENSE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "OUTGOING_TRANSFER" => Some(EntryType::OutgoingTransfer),
            "INCOME" => Some(EntryType::Income),
            "EXPENSE" => Some(EntryType::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    Pending,
    Completed,
    Blocked,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Blocked => "BLOCKED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_uppercase().as_str() {
            "PENDING" => Some(EntryStatus::Pending),
            "COMPLETED" => Some(EntryStatus::Completed),
            "BLOCKED" => Some(EntryStatus::Blocked),
            _ => None,
        }
    }
}

/// A row of transaction history owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: String,
    pub amount: Decimal,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub risk_score: Option<f64>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Fixed feature contract sent to the external ML scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub avg_amount_7d: f64,
    pub tx_velocity_1h: f64,
    pub device_change_freq: f64,
    pub time_of_day_deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule_score: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Hold,
    Block,
}

/// Outcome of one pass through the scoring pipeline. Only persisted (as the entry's
/// risk score) when the transfer is held or completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub cache_key: String,
    pub final_score: f64,
    pub decision: Decision,
    /// `None` when the score was served from the cache.
    pub rule_score: Option<u32>,
    /// `None` when served from the cache or when the ML scorer was unavailable.
    pub ml_score: Option<f64>,
    pub reasons: Vec<String>,
    pub from_cache: bool,
    pub ttl_secs: u64,
    pub policy_version: String,
    pub assessment_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Safe,
    Suspicious,
    HighRisk,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub recipient_email: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub success: bool,
    pub new_balance: Decimal,
    pub risk_score: f64,
}

/// Structured body of every rejected transfer or verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionBody {
    pub error: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub recipient_email: Option<String>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub risk_score: f64,
    pub status: VerificationStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    pub receive_anomaly_protection: bool,
    pub alerts: Vec<SecurityAlert>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityUpdate {
    pub receive_anomaly_protection: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityUpdateReceipt {
    pub success: bool,
    pub receive_anomaly_protection: bool,
}

pub fn compute_assessment_hash(
    cache_key: &str,
    features: Option<&FeatureVector>,
    rules: Option<&RuleOutcome>,
    ml_score: Option<f64>,
    final_score: f64,
    decision: Decision,
    policy_version: &str,
) -> String {
    let normalized = json!({
      "cache_key": cache_key,
      "features": features,
      "rules": rules,
      "ml_score": ml_score,
      "final_score": final_score,
      "decision": decision,
      "policy_version": policy_version
    });
    let mut hasher = Sha256::new();
    hasher.update(normalized.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn cents_conversion_rejects_sub_cent_precision() {
        assert_eq!(to_cents(dec!(50.00)), Some(5000));
        assert_eq!(to_cents(dec!(0.01)), Some(1));
        assert_eq!(to_cents(dec!(12.5)), Some(1250));
        assert_eq!(to_cents(dec!(1.005)), None);
        assert_eq!(from_cents(2_458_050), dec!(24580.50));
    }

    #[test]
    fn cents_conversion_rejects_amounts_beyond_range() {
        assert_eq!(to_cents(Decimal::MAX), None);
        assert_eq!(to_cents(dec!(1000000000000000000000000000)), None);
        // fits a Decimal after scaling, not an i64
        assert_eq!(to_cents(dec!(100000000000000000000)), None);
        assert_eq!(to_cents(dec!(92233720368547758.07)), Some(i64::MAX));
    }

    #[test]
    fn entry_enums_round_trip_through_their_column_text() {
        for ty in [EntryType::OutgoingTransfer, EntryType::Income, EntryType::Expense] {
            assert_eq!(EntryType::parse(ty.as_str()), Some(ty));
        }
        for status in [EntryStatus::Pending, EntryStatus::Completed, EntryStatus::Blocked] {
            assert_eq!(EntryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntryType::parse("TRANSFER"), None);
    }

    #[test]
    fn assessment_hash_is_stable_and_sensitive_to_decision() {
        let rules = RuleOutcome {
            rule_score: 25,
            reasons: vec!["amount > 3x daily average".to_string()],
        };
        let a = compute_assessment_hash(
            "risk:a:b:10",
            None,
            Some(&rules),
            Some(40.0),
            40.5,
            Decision::Hold,
            "policy-v1",
        );
        let b = compute_assessment_hash(
            "risk:a:b:10",
            None,
            Some(&rules),
            Some(40.0),
            40.5,
            Decision::Hold,
            "policy-v1",
        );
        let c = compute_assessment_hash(
            "risk:a:b:10",
            None,
            Some(&rules),
            Some(40.0),
            40.5,
            Decision::Allow,
            "policy-v1",
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn transfer_request_accepts_numeric_amounts() {
        let body = r#"{"recipientEmail":"jane@example.com","amount":50.25}"#;
        let req: TransferRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.amount, Some(dec!(50.25)));
        assert_eq!(req.description, None);
    }
}
