use transfer_models::{Decision, VerificationStatus};

use crate::config::RiskConfigError;

/// Maps a unified score onto ALLOW / HOLD / BLOCK.
///
/// `score < hold_at` allows, `hold_at <= score < block_at` holds for review,
/// `score >= block_at` blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    hold_at: f64,
    block_at: f64,
}

impl DecisionPolicy {
    pub const DEFAULT_HOLD_AT: f64 = 40.0;
    pub const DEFAULT_BLOCK_AT: f64 = 80.0;

    pub fn new(hold_at: f64, block_at: f64) -> Result<Self, RiskConfigError> {
        let ordered = hold_at > 0.0 && hold_at < block_at && block_at <= 100.0;
        if !ordered || !hold_at.is_finite() || !block_at.is_finite() {
            return Err(RiskConfigError::Thresholds(format!(
                "decision policy needs 0 < hold_at < block_at <= 100, got hold_at={hold_at} block_at={block_at}"
            )));
        }
        Ok(Self { hold_at, block_at })
    }

    pub fn hold_at(&self) -> f64 {
        self.hold_at
    }

    pub fn block_at(&self) -> f64 {
        self.block_at
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score >= self.block_at {
            Decision::Block
        } else if score >= self.hold_at {
            Decision::Hold
        } else {
            Decision::Allow
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            hold_at: Self::DEFAULT_HOLD_AT,
            block_at: Self::DEFAULT_BLOCK_AT,
        }
    }
}

/// User-facing bands for the pre-submission preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationBands {
    suspicious_at: f64,
    high_risk_at: f64,
}

impl VerificationBands {
    pub fn new(suspicious_at: f64, high_risk_at: f64) -> Result<Self, RiskConfigError> {
        if !(suspicious_at > 0.0 && suspicious_at < high_risk_at && high_risk_at <= 100.0) {
            return Err(RiskConfigError::Thresholds(format!(
                "verification bands need 0 < suspicious_at < high_risk_at <= 100, got {suspicious_at}/{high_risk_at}"
            )));
        }
        Ok(Self {
            suspicious_at,
            high_risk_at,
        })
    }

    pub fn classify(&self, score: f64) -> (VerificationStatus, &'static str) {
        if score < self.suspicious_at {
            (VerificationStatus::Safe, "Behavior matches known pattern")
        } else if score < self.high_risk_at {
            (VerificationStatus::Suspicious, "Unusual pattern detected")
        } else {
            (VerificationStatus::HighRisk, "High risk anomaly detected")
        }
    }
}

impl Default for VerificationBands {
    fn default() -> Self {
        Self {
            suspicious_at: 30.0,
            high_risk_at: 70.0,
        }
    }
}
