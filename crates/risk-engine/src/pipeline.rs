use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use transfer_models::{compute_assessment_hash, RiskAssessment, VerificationStatus};

use crate::cache::{RiskCache, ScoreStore};
use crate::config::{RiskConfig, RiskConfigError};
use crate::features::{build_features, FeatureInput};
use crate::ml::{DisabledScorer, HttpMlScorer, MlScorer};
use crate::policy::{DecisionPolicy, VerificationBands};
use crate::rules::{evaluate_rules, RuleInput};
use crate::unifier::unify;

const DEFAULT_USUAL_HOUR: u32 = 12;

/// Sender history, loaded only when the cache misses.
#[derive(Debug, Clone, Default)]
pub struct BehaviorSignals {
    pub amount_total_7d: Decimal,
    pub entry_count_7d: u32,
    pub tx_count_1m: u32,
    pub tx_count_1h: u32,
    pub devices_seen_7d: u32,
    pub device_recognized: bool,
    pub last_country: Option<String>,
    pub usual_activity_hour: Option<u32>,
}

impl BehaviorSignals {
    pub fn avg_amount_7d(&self) -> Option<Decimal> {
        (self.entry_count_7d > 0).then(|| self.amount_total_7d / Decimal::from(self.entry_count_7d))
    }
}

#[derive(Debug, Clone)]
pub struct ScoringRequest<'a> {
    pub sender_id: &'a str,
    /// `None` on the preview path.
    pub recipient_id: Option<&'a str>,
    pub amount: Decimal,
    pub claimed_country: Option<&'a str>,
    pub now: DateTime<Utc>,
}

pub struct RiskEngine {
    scorer: Arc<dyn MlScorer>,
    cache: RiskCache,
    policy: DecisionPolicy,
    bands: VerificationBands,
    ml_timeout: Duration,
    policy_version: String,
}

impl RiskEngine {
    pub fn new(
        scorer: Arc<dyn MlScorer>,
        cache: RiskCache,
        policy: DecisionPolicy,
        bands: VerificationBands,
        ml_timeout: Duration,
        policy_version: impl Into<String>,
    ) -> Self {
        Self {
            scorer,
            cache,
            policy,
            bands,
            ml_timeout,
            policy_version: policy_version.into(),
        }
    }

    pub fn from_config(
        config: &RiskConfig,
        store: Arc<dyn ScoreStore>,
    ) -> Result<Self, RiskConfigError> {
        let scorer: Arc<dyn MlScorer> = match &config.ml_scorer_url {
            Some(url) => {
                info!("ML scorer enabled at {url}");
                Arc::new(
                    HttpMlScorer::new(url.clone(), config.ml_timeout)
                        .map_err(|err| RiskConfigError::ScorerClient(err.to_string()))?,
                )
            }
            None => {
                warn!("ML scorer disabled, rule score will stand in for the ML component");
                Arc::new(DisabledScorer)
            }
        };
        Ok(Self::new(
            scorer,
            RiskCache::new(store, config.cache_ttl_secs),
            config.policy,
            config.bands,
            config.ml_timeout,
            config.policy_version.clone(),
        ))
    }

    pub fn classify_preview(&self, score: f64) -> (VerificationStatus, &'static str) {
        self.bands.classify(score)
    }

    /// Scores a transfer and applies the decision policy.
    ///
    /// A cache hit returns the stored score without calling `load_signals`. On a miss
    /// the full pipeline runs and the unified score is cached. Errors only come from
    /// `load_signals`; ML failures fall back to the rule score.
    pub async fn assess<F, Fut, E>(
        &self,
        request: &ScoringRequest<'_>,
        load_signals: F,
    ) -> Result<RiskAssessment, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BehaviorSignals, E>>,
    {
        let cache_key = match request.recipient_id {
            Some(recipient_id) => {
                RiskCache::transfer_key(request.sender_id, recipient_id, request.amount)
            }
            None => RiskCache::preview_key(request.sender_id, request.amount),
        };

        if let Some(final_score) = self.cache.lookup(&cache_key).await {
            return Ok(self.cached_assessment(cache_key, final_score));
        }

        let signals = load_signals().await?;
        let rules = evaluate_rules(&RuleInput {
            amount: request.amount,
            avg_daily_amount: signals.avg_amount_7d(),
            is_new_device: !signals.device_recognized,
            velocity_1m: signals.tx_count_1m,
            claimed_country: request.claimed_country.map(str::to_string),
            last_country: signals.last_country.clone(),
        });
        let features = build_features(&FeatureInput {
            avg_amount_7d: signals
                .avg_amount_7d()
                .and_then(|avg| avg.to_f64())
                .unwrap_or(0.0),
            tx_velocity_1h: f64::from(signals.tx_count_1h),
            device_change_freq: f64::from(signals.devices_seen_7d),
            current_hour: request.now.hour(),
            usual_hour_mean: f64::from(signals.usual_activity_hour.unwrap_or(DEFAULT_USUAL_HOUR)),
        });

        let scored = tokio::time::timeout(self.ml_timeout, self.scorer.score(&features)).await;
        let ml_score = match scored {
            Ok(score) => score,
            Err(_) => {
                warn!("ML scorer timed out after {:?}", self.ml_timeout);
                None
            }
        };
        let ml_component = ml_score.unwrap_or_else(|| {
            warn!("ML scorer unavailable, falling back to rule score {}", rules.rule_score);
            f64::from(rules.rule_score)
        });

        let final_score = unify(rules.rule_score, ml_component);
        self.cache.store(&cache_key, final_score).await;
        let decision = self.policy.decide(final_score);
        debug!(
            "scored {cache_key}: rules={} ml={ml_score:?} final={final_score} reasons={:?}",
            rules.rule_score, rules.reasons
        );

        let hash = compute_assessment_hash(
            &cache_key,
            Some(&features),
            Some(&rules),
            ml_score,
            final_score,
            decision,
            &self.policy_version,
        );
        Ok(RiskAssessment {
            cache_key,
            final_score,
            decision,
            rule_score: Some(rules.rule_score),
            ml_score,
            reasons: rules.reasons,
            from_cache: false,
            ttl_secs: self.cache.ttl_secs(),
            policy_version: self.policy_version.clone(),
            assessment_hash: hash,
        })
    }

    fn cached_assessment(&self, cache_key: String, final_score: f64) -> RiskAssessment {
        let decision = self.policy.decide(final_score);
        let assessment_hash = compute_assessment_hash(
            &cache_key,
            None,
            None,
            None,
            final_score,
            decision,
            &self.policy_version,
        );
        RiskAssessment {
            cache_key,
            final_score,
            decision,
            rule_score: None,
            ml_score: None,
            reasons: Vec::new(),
            from_cache: true,
            ttl_secs: self.cache.ttl_secs(),
            policy_version: self.policy_version.clone(),
            assessment_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryScoreStore;
    use crate::ml::FixedScorer;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use transfer_models::{Decision, FeatureVector};

    struct CountingScorer {
        calls: AtomicUsize,
        answer: Option<f64>,
    }

    #[async_trait]
    impl MlScorer for CountingScorer {
        async fn score(&self, _features: &FeatureVector) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer
        }
    }

    struct StalledScorer;

    #[async_trait]
    impl MlScorer for StalledScorer {
        async fn score(&self, _features: &FeatureVector) -> Option<f64> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Some(0.0)
        }
    }

    fn engine(scorer: Arc<dyn MlScorer>) -> RiskEngine {
        RiskEngine::new(
            scorer,
            RiskCache::new(Arc::new(MemoryScoreStore::new()), 600),
            DecisionPolicy::default(),
            VerificationBands::default(),
            Duration::from_millis(800),
            "policy-test",
        )
    }

    fn request<'a>(recipient: Option<&'a str>, amount: Decimal) -> ScoringRequest<'a> {
        ScoringRequest {
            sender_id: "sender",
            recipient_id: recipient,
            amount,
            claimed_country: Some("US"),
            now: Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap(),
        }
    }

    fn familiar_sender() -> BehaviorSignals {
        BehaviorSignals {
            amount_total_7d: dec!(300),
            entry_count_7d: 3,
            tx_count_1m: 0,
            tx_count_1h: 1,
            devices_seen_7d: 1,
            device_recognized: true,
            last_country: Some("US".to_string()),
            usual_activity_hour: Some(13),
        }
    }

    #[tokio::test]
    async fn healthy_scorer_is_blended_with_rules() {
        let engine = engine(Arc::new(FixedScorer(10.0)));
        let assessment = engine
            .assess(&request(Some("recipient"), dec!(50)), || async {
                Ok::<_, Infallible>(familiar_sender())
            })
            .await
            .unwrap();
        assert_eq!(assessment.rule_score, Some(0));
        assert_eq!(assessment.ml_score, Some(10.0));
        assert_eq!(assessment.final_score, 7.0);
        assert_eq!(assessment.decision, Decision::Allow);
        assert!(!assessment.from_cache);
        assert_eq!(assessment.cache_key, "risk:sender:recipient:50");
    }

    #[tokio::test]
    async fn unavailable_scorer_still_resolves_with_rule_score() {
        let scorer = Arc::new(CountingScorer {
            calls: AtomicUsize::new(0),
            answer: None,
        });
        let engine = engine(scorer.clone());
        let mut signals = familiar_sender();
        signals.tx_count_1m = 5;
        signals.last_country = Some("DE".to_string());

        let assessment = engine
            .assess(&request(Some("recipient"), dec!(50)), move || async move {
                Ok::<_, Infallible>(signals)
            })
            .await
            .unwrap();
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(assessment.rule_score, Some(35));
        assert_eq!(assessment.ml_score, None);
        // 0.5 * 35 + 0.7 * 35
        assert_eq!(assessment.final_score, 42.0);
        assert_eq!(assessment.decision, Decision::Hold);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_scorer_is_cut_off_by_timeout() {
        let engine = engine(Arc::new(StalledScorer));
        let assessment = engine
            .assess(&request(Some("recipient"), dec!(50)), || async {
                Ok::<_, Infallible>(familiar_sender())
            })
            .await
            .unwrap();
        assert_eq!(assessment.ml_score, None);
        assert_eq!(assessment.final_score, 0.0);
        assert_eq!(assessment.decision, Decision::Allow);
    }

    #[tokio::test]
    async fn rules_alone_never_reach_block() {
        let engine = engine(Arc::new(DisabledScorer));
        let signals = BehaviorSignals {
            amount_total_7d: dec!(10),
            entry_count_7d: 1,
            tx_count_1m: 10,
            tx_count_1h: 10,
            devices_seen_7d: 4,
            device_recognized: false,
            last_country: Some("BR".to_string()),
            usual_activity_hour: Some(3),
        };
        let assessment = engine
            .assess(&request(Some("recipient"), dec!(9000)), move || async move {
                Ok::<_, Infallible>(signals)
            })
            .await
            .unwrap();
        assert_eq!(assessment.rule_score, Some(60));
        assert_eq!(assessment.final_score, 72.0);
        assert_eq!(assessment.decision, Decision::Hold);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_skips_signal_loading_and_scoring_until_ttl() {
        let scorer = Arc::new(CountingScorer {
            calls: AtomicUsize::new(0),
            answer: Some(20.0),
        });
        let engine = engine(scorer.clone());
        let req = request(Some("recipient"), dec!(75));

        let first = engine
            .assess(&req, || async { Ok::<_, Infallible>(familiar_sender()) })
            .await
            .unwrap();
        let loads = AtomicUsize::new(0);
        let second = engine
            .assess(&req, || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(BehaviorSignals::default())
            })
            .await
            .unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(second.from_cache);
        assert_eq!(second.final_score, first.final_score);
        assert_eq!(second.rule_score, None);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(601)).await;
        let third = engine
            .assess(&req, || async { Ok::<_, Infallible>(familiar_sender()) })
            .await
            .unwrap();
        assert!(!third.from_cache);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preview_and_transfer_use_separate_keys() {
        let engine = engine(Arc::new(FixedScorer(50.0)));
        let preview = engine
            .assess(&request(None, dec!(20)), || async {
                Ok::<_, Infallible>(familiar_sender())
            })
            .await
            .unwrap();
        assert_eq!(preview.cache_key, "risk:sender:preview:20");
        let transfer = engine
            .assess(&request(Some("recipient"), dec!(20)), || async {
                Ok::<_, Infallible>(familiar_sender())
            })
            .await
            .unwrap();
        assert!(!transfer.from_cache);
        assert_eq!(engine.classify_preview(preview.final_score).0, VerificationStatus::Suspicious);
    }

    #[tokio::test]
    async fn signal_errors_propagate() {
        let engine = engine(Arc::new(FixedScorer(0.0)));
        let result = engine
            .assess(&request(Some("recipient"), dec!(20)), || async {
                Err::<BehaviorSignals, _>("history unavailable")
            })
            .await;
        assert_eq!(result.unwrap_err(), "history unavailable");
    }
}
