//! Risk scoring for peer-to-peer transfers.
//!
//! Leaf components (feature builder, rule engine, unifier, decision policy, anomaly
//! guard) are pure functions; the ML adapter and the score cache sit behind traits so
//! the [`RiskEngine`] pipeline can run against real services or in-process doubles.

pub mod anomaly;
pub mod cache;
pub mod config;
pub mod features;
pub mod ml;
pub mod pipeline;
pub mod policy;
pub mod rules;
pub mod unifier;

pub use anomaly::{AnomalyGuard, GuardVerdict, ReceivingHistory, ANOMALY_REASON};
pub use cache::{CacheError, MemoryScoreStore, RiskCache, ScoreStore};
pub use config::{RiskConfig, RiskConfigError};
pub use features::{build_features, FeatureInput};
pub use ml::{DisabledScorer, FixedScorer, HttpMlScorer, MlScorer};
pub use pipeline::{BehaviorSignals, RiskEngine, ScoringRequest};
pub use policy::{DecisionPolicy, VerificationBands};
pub use rules::{evaluate_rules, RuleInput};
pub use unifier::unify;
