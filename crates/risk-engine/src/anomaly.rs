//! Recipient-side protection against abnormally large incoming transfers.
//!
//! Independent of sender risk and evaluated before any scoring.

use rust_decimal::Decimal;
use tracing::warn;

pub const ANOMALY_REASON: &str = "recipient anomaly protection triggered";
pub const DEFAULT_MULTIPLIER: i64 = 3;

/// Completed incoming amounts of the recipient over the trailing 7 days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceivingHistory {
    pub total: Decimal,
    pub count: u32,
}

impl ReceivingHistory {
    pub fn mean(&self) -> Option<Decimal> {
        (self.count > 0).then(|| self.total / Decimal::from(self.count))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Pass,
    Tripped { average: Decimal, threshold: Decimal },
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyGuard {
    multiplier: Decimal,
}

impl AnomalyGuard {
    pub fn new(multiplier: Decimal) -> Self {
        Self { multiplier }
    }

    pub fn check(
        &self,
        recipient_id: &str,
        protection_enabled: bool,
        amount: Decimal,
        history: &ReceivingHistory,
    ) -> GuardVerdict {
        if !protection_enabled {
            return GuardVerdict::Pass;
        }
        let Some(average) = history.mean().filter(|avg| *avg > Decimal::ZERO) else {
            return GuardVerdict::Pass;
        };
        let threshold = average * self.multiplier;
        if amount > threshold {
            warn!(
                "anomaly protection triggered: recipient {recipient_id} blocked incoming {amount} (threshold {threshold})"
            );
            return GuardVerdict::Tripped { average, threshold };
        }
        GuardVerdict::Pass
    }
}

impl Default for AnomalyGuard {
    fn default() -> Self {
        Self::new(Decimal::from(DEFAULT_MULTIPLIER))
    }
}
