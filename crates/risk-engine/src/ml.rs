//! Adapter for the external ML scoring service.
//!
//! A scorer answers `Some(score)` with a value in `[0, 100]`, or `None` when it is
//! unavailable. Failures never propagate: the pipeline substitutes the rule score.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use transfer_models::FeatureVector;

#[async_trait]
pub trait MlScorer: Send + Sync {
    async fn score(&self, features: &FeatureVector) -> Option<f64>;
}

#[derive(Debug, Deserialize)]
struct MlEnvelope {
    ml_score: Option<f64>,
    error: Option<String>,
}

/// Scores over HTTP: POST the feature vector, expect `{"ml_score": number}`.
#[derive(Debug, Clone)]
pub struct HttpMlScorer {
    client: reqwest::Client,
    url: String,
}

impl HttpMlScorer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MlScorer for HttpMlScorer {
    async fn score(&self, features: &FeatureVector) -> Option<f64> {
        match self.client.post(&self.url).json(features).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<MlEnvelope>().await {
                Ok(MlEnvelope {
                    error: Some(err), ..
                }) => {
                    warn!("ML scorer reported an error: {err}");
                    None
                }
                Ok(MlEnvelope {
                    ml_score: Some(score),
                    ..
                }) if score.is_finite() && (0.0..=100.0).contains(&score) => Some(score),
                Ok(envelope) => {
                    warn!("ML scorer returned an unusable score: {:?}", envelope.ml_score);
                    None
                }
                Err(err) => {
                    warn!("ML scorer response parse failed: {err}");
                    None
                }
            },
            Ok(resp) => {
                warn!("ML scorer returned non-2xx status: {}", resp.status());
                None
            }
            Err(err) => {
                warn!("ML scorer call failed: {err}");
                None
            }
        }
    }
}

/// Used when no scoring endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScorer;

#[async_trait]
impl MlScorer for DisabledScorer {
    async fn score(&self, _features: &FeatureVector) -> Option<f64> {
        None
    }
}

/// Always answers with the same score.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub f64);

#[async_trait]
impl MlScorer for FixedScorer {
    async fn score(&self, _features: &FeatureVector) -> Option<f64> {
        Some(self.0)
    }
}
