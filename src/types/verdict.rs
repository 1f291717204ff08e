//! Verdict and scored transaction structures

use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Reason recorded when no classifier artifact could be loaded
pub const MODEL_NOT_AVAILABLE_REASON: &str = "Model not available";

/// Reason recorded by the fallback path for a high amount
pub const FALLBACK_HIGH_AMOUNT_REASON: &str = "Fallback detection: High amount";

/// Which path of the pipeline produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    /// Classifier probability plus decision threshold
    Model,
    /// Per-call rule-based substitute after an inference failure
    Fallback,
    /// Degraded state, no classifier loaded
    ModelUnavailable,
}

impl VerdictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictSource::Model => "model",
            VerdictSource::Fallback => "fallback",
            VerdictSource::ModelUnavailable => "model_unavailable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "model" => Some(VerdictSource::Model),
            "fallback" => Some(VerdictSource::Fallback),
            "model_unavailable" => Some(VerdictSource::ModelUnavailable),
            _ => None,
        }
    }
}

/// Fraud decision attached 1:1 to a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub is_fraud: bool,

    /// Fraud likelihood in [0, 1]
    pub fraud_score: f64,

    /// Human-readable justification, empty when not fraud
    pub fraud_reason: String,

    pub source: VerdictSource,
}

impl Verdict {
    /// Safe default returned while the pipeline is degraded.
    pub fn model_unavailable() -> Self {
        Self {
            is_fraud: false,
            fraud_score: 0.0,
            fraud_reason: MODEL_NOT_AVAILABLE_REASON.to_string(),
            source: VerdictSource::ModelUnavailable,
        }
    }
}

/// A transaction together with its verdict; the unit persisted and retrieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl ScoredTransaction {
    pub fn new(transaction: Transaction, verdict: Verdict) -> Self {
        Self {
            transaction,
            verdict,
        }
    }

    pub fn id(&self) -> &str {
        &self.transaction.id
    }
}
