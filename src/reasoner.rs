//! Human-readable justification for fraud verdicts.
//!
//! The rules here are independent of the classifier's internals. They are a
//! cheap explainability layer and may disagree with what drove the score.

use crate::config::ReasonConfig;
use crate::types::transaction::Transaction;
use chrono::{DateTime, Timelike, Utc};

pub const HIGH_AMOUNT_REASON: &str = "Unusually high transaction amount. ";
pub const UNUSUAL_TIME_REASON: &str = "Unusual transaction time. ";
pub const UNUSUAL_LOCATION_REASON: &str = "Unusual location. ";
pub const CATCH_ALL_REASON: &str = "Multiple suspicious patterns detected.";

#[derive(Debug, Clone)]
pub struct FraudReasoner {
    high_amount: f64,
    quiet_hours_start: u32,
    quiet_hours_end: u32,
    /// Lower-cased
    location_marker: String,
}

impl FraudReasoner {
    pub fn new(config: &ReasonConfig) -> Self {
        Self {
            high_amount: config.high_amount,
            quiet_hours_start: config.quiet_hours_start,
            quiet_hours_end: config.quiet_hours_end,
            location_marker: config.location_marker.to_lowercase(),
        }
    }

    /// Explain a verdict. Empty when `is_fraud` is false.
    ///
    /// Triggers are checked in a fixed order and concatenated; the catch-all
    /// is used only when none fires.
    pub fn explain(&self, tx: &Transaction, is_fraud: bool, at: DateTime<Utc>) -> String {
        if !is_fraud {
            return String::new();
        }

        let mut reason = String::new();

        if tx.amount > self.high_amount {
            reason.push_str(HIGH_AMOUNT_REASON);
        }

        let hour = at.hour();
        if hour < self.quiet_hours_start || hour > self.quiet_hours_end {
            reason.push_str(UNUSUAL_TIME_REASON);
        }

        if !self.location_marker.is_empty()
            && tx.location.to_lowercase().contains(&self.location_marker)
        {
            reason.push_str(UNUSUAL_LOCATION_REASON);
        }

        if reason.is_empty() {
            reason.push_str(CATCH_ALL_REASON);
        }

        reason
    }
}

impl Default for FraudReasoner {
    fn default() -> Self {
        Self::new(&crate::config::AppConfig::default().reasons)
    }
}
