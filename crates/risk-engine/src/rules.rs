//! Deterministic, explainable rule scoring.
//!
//! Each rule contributes a fixed weight when it fires. The total is capped at
//! [`MAX_RULE_SCORE`] so rules alone never carry block-level certainty.

use rust_decimal::Decimal;
use transfer_models::RuleOutcome;

pub const MAX_RULE_SCORE: u32 = 60;

const AMOUNT_SPIKE_WEIGHT: u32 = 25;
const NEW_DEVICE_WEIGHT: u32 = 20;
const VELOCITY_WEIGHT: u32 = 15;
const GEO_MISMATCH_WEIGHT: u32 = 20;

const AMOUNT_SPIKE_MULTIPLIER: i64 = 3;
const NEW_DEVICE_AMOUNT_THRESHOLD: i64 = 500;
const VELOCITY_LIMIT_1M: u32 = 3;
const UNKNOWN_COUNTRY: &str = "NA";

#[derive(Debug, Clone)]
pub struct RuleInput {
    pub amount: Decimal,
    /// Sender's trailing daily average; `None` when there is no history.
    pub avg_daily_amount: Option<Decimal>,
    pub is_new_device: bool,
    /// Sender's transaction count in the last 60 seconds.
    pub velocity_1m: u32,
    pub claimed_country: Option<String>,
    pub last_country: Option<String>,
}

pub fn evaluate_rules(input: &RuleInput) -> RuleOutcome {
    let mut score = 0u32;
    let mut reasons = Vec::new();

    if let Some(avg) = input.avg_daily_amount.filter(|avg| *avg > Decimal::ZERO) {
        if input.amount > avg * Decimal::from(AMOUNT_SPIKE_MULTIPLIER) {
            score += AMOUNT_SPIKE_WEIGHT;
            reasons.push("amount > 3x daily average".to_string());
        }
    }

    if input.is_new_device && input.amount > Decimal::from(NEW_DEVICE_AMOUNT_THRESHOLD) {
        score += NEW_DEVICE_WEIGHT;
        reasons.push("new device + high amount".to_string());
    }

    if input.velocity_1m > VELOCITY_LIMIT_1M {
        score += VELOCITY_WEIGHT;
        reasons.push("high transaction velocity".to_string());
    }

    let claimed = input.claimed_country.as_deref().unwrap_or(UNKNOWN_COUNTRY);
    let last = input.last_country.as_deref().unwrap_or(UNKNOWN_COUNTRY);
    if !claimed.trim().eq_ignore_ascii_case(last.trim()) {
        score += GEO_MISMATCH_WEIGHT;
        reasons.push("geo/IP mismatch".to_string());
    }

    RuleOutcome {
        rule_score: score.min(MAX_RULE_SCORE),
        reasons,
    }
}
