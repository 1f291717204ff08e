//! Decision policies for the model and fallback paths

use crate::config::DetectionConfig;
use crate::types::verdict::{Verdict, VerdictSource, FALLBACK_HIGH_AMOUNT_REASON};

/// Default probability threshold
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Turns a classifier probability into a fraud decision.
///
/// The threshold is configuration, not learned. Raising it means fewer false
/// positives and more false negatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    pub threshold: f64,
}

impl DecisionPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn classify(&self, probability: f64) -> bool {
        probability > self.threshold
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Rule-based substitute used when the classifier fails on one call.
///
/// Looks only at the amount; the classifier score is never consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    pub amount_threshold: f64,
    pub fraud_score: f64,
    pub clear_score: f64,
}

impl FallbackPolicy {
    pub fn verdict(&self, amount: f64) -> Verdict {
        let is_fraud = amount > self.amount_threshold;
        Verdict {
            is_fraud,
            fraud_score: if is_fraud {
                self.fraud_score
            } else {
                self.clear_score
            },
            fraud_reason: if is_fraud {
                FALLBACK_HIGH_AMOUNT_REASON.to_string()
            } else {
                String::new()
            },
            source: VerdictSource::Fallback,
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            amount_threshold: 2000.0,
            fraud_score: 0.5,
            clear_score: 0.1,
        }
    }
}

impl From<&DetectionConfig> for DecisionPolicy {
    fn from(config: &DetectionConfig) -> Self {
        Self::new(config.threshold)
    }
}

impl From<&DetectionConfig> for FallbackPolicy {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            amount_threshold: config.fallback_amount_threshold,
            fraud_score: config.fallback_fraud_score,
            clear_score: config.fallback_clear_score,
        }
    }
}
