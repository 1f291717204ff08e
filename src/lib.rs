//! Fraud Scoring Library
//!
//! Scores financial transactions with a pre-trained probabilistic classifier,
//! explains positive verdicts with independent rule checks, and persists the
//! result behind a role-aware store.

pub mod analytics;
pub mod config;
pub mod decision;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod reasoner;
pub mod store;
pub mod time_source;
pub mod types;

pub use analytics::FraudReport;
pub use config::AppConfig;
pub use error::{FraudError, FraudResult};
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::{Classifier, ClassifierAdapter, ModelState, Score};
pub use pipeline::{IngestReport, ScoringPipeline};
pub use store::{ListFilter, SqliteStore, TransactionStore};
pub use types::{
    RawAmount, RawTransaction, RequestContext, Role, ScoredTransaction, Transaction, Verdict,
    VerdictSource,
};
