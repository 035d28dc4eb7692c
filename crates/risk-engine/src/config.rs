use std::env;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::anomaly::DEFAULT_MULTIPLIER;
use crate::cache::DEFAULT_TTL_SECS;
use crate::policy::{DecisionPolicy, VerificationBands};

#[derive(Debug, Error)]
pub enum RiskConfigError {
    #[error("invalid thresholds: {0}")]
    Thresholds(String),

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("failed to build ML scorer client: {0}")]
    ScorerClient(String),
}

/// Tunables of the scoring pipeline, normally read from the environment.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// `None` disables the ML call; the rule score is then used as the ML component.
    pub ml_scorer_url: Option<String>,
    pub ml_timeout: Duration,
    pub cache_ttl_secs: u64,
    pub policy: DecisionPolicy,
    pub bands: VerificationBands,
    pub anomaly_multiplier: Decimal,
    pub policy_version: String,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            ml_scorer_url: Some("http://localhost:8000/score".to_string()),
            ml_timeout: Duration::from_millis(800),
            cache_ttl_secs: DEFAULT_TTL_SECS,
            policy: DecisionPolicy::default(),
            bands: VerificationBands::default(),
            anomaly_multiplier: Decimal::from(DEFAULT_MULTIPLIER),
            policy_version: "policy-v1".to_string(),
        }
    }
}

impl RiskConfig {
    pub fn from_env() -> Result<Self, RiskConfigError> {
        let defaults = Self::default();

        let ml_scorer_url = match env::var("ML_SCORER_URL") {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url),
            Err(_) => defaults.ml_scorer_url,
        };
        let ml_timeout = Duration::from_millis(parse_env("ML_TIMEOUT_MS", 800u64)?);
        let cache_ttl_secs = parse_env("RISK_CACHE_TTL_SECS", defaults.cache_ttl_secs)?;
        let policy = DecisionPolicy::new(
            parse_env("POLICY_HOLD_AT", DecisionPolicy::DEFAULT_HOLD_AT)?,
            parse_env("POLICY_BLOCK_AT", DecisionPolicy::DEFAULT_BLOCK_AT)?,
        )?;
        let bands = VerificationBands::new(
            parse_env("VERIFY_SUSPICIOUS_AT", 30.0)?,
            parse_env("VERIFY_HIGH_RISK_AT", 70.0)?,
        )?;
        let anomaly_multiplier: Decimal =
            parse_env("ANOMALY_MULTIPLIER", defaults.anomaly_multiplier)?;
        if anomaly_multiplier <= Decimal::ONE {
            return Err(RiskConfigError::Thresholds(format!(
                "ANOMALY_MULTIPLIER must be greater than 1, got {anomaly_multiplier}"
            )));
        }
        let policy_version =
            env::var("POLICY_VERSION").unwrap_or_else(|_| defaults.policy_version.clone());

        Ok(Self {
            ml_scorer_url,
            ml_timeout,
            cache_ttl_secs,
            policy,
            bands,
            anomaly_multiplier,
            policy_version,
        })
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, RiskConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RiskConfigError::InvalidValue {
                name: name.to_string(),
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = RiskConfig::default();
        assert_eq!(config.cache_ttl_secs, 600);
        assert_eq!(config.policy.hold_at(), 40.0);
        assert_eq!(config.policy.block_at(), 80.0);
        assert_eq!(config.anomaly_multiplier, Decimal::from(3));
    }

    #[test]
    fn parse_env_reports_bad_values() {
        env::set_var("RISK_ENGINE_TEST_BAD_NUMBER", "eighty");
        let err = parse_env("RISK_ENGINE_TEST_BAD_NUMBER", 80.0f64).unwrap_err();
        assert!(err.to_string().contains("RISK_ENGINE_TEST_BAD_NUMBER"));
        env::remove_var("RISK_ENGINE_TEST_BAD_NUMBER");

        assert_eq!(parse_env("RISK_ENGINE_TEST_UNSET", 7u64).unwrap(), 7);
    }
}
