//! Transaction data structures

use crate::error::{FraudError, FraudResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A financial transaction as accepted by the scoring core.
///
/// Created once at the ingestion boundary and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (UUID v4)
    pub id: String,

    /// Creation instant
    pub timestamp: DateTime<Utc>,

    /// Non-negative amount in currency units
    pub amount: f64,

    pub merchant: String,

    pub category: String,

    pub description: String,

    pub location: String,

    /// Owning user
    pub user_id: String,

    pub card_type: String,
}

/// Amount as it arrives from the ingestion boundary: a number or its text form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    /// Coerce to a non-negative, finite real.
    pub fn coerce(&self) -> FraudResult<f64> {
        let value = match self {
            RawAmount::Number(n) => *n,
            RawAmount::Text(text) => text.trim().parse::<f64>().map_err(|_| {
                FraudError::InvalidInput(format!("amount {:?} is not numeric", text))
            })?,
        };

        if !value.is_finite() {
            return Err(FraudError::InvalidInput(format!(
                "amount {} is not finite",
                value
            )));
        }
        if value < 0.0 {
            return Err(FraudError::InvalidInput(format!(
                "amount {} is negative",
                value
            )));
        }

        Ok(value)
    }
}

/// Transaction fields as supplied by an HTTP form, a JSON line, or the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub amount: Option<RawAmount>,
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub card_type: String,
}

impl Transaction {
    /// Build a transaction from raw ingestion fields.
    ///
    /// Assigns a fresh id and stamps it with `now`. Only `amount` is coerced;
    /// the text fields are taken as-is.
    pub fn from_raw(raw: RawTransaction, user_id: &str, now: DateTime<Utc>) -> FraudResult<Self> {
        let amount = raw
            .amount
            .as_ref()
            .ok_or_else(|| FraudError::InvalidInput("amount is required".to_string()))?
            .coerce()?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            amount,
            merchant: raw.merchant,
            category: raw.category,
            description: raw.description,
            location: raw.location,
            user_id: user_id.to_string(),
            card_type: raw.card_type,
        })
    }

    /// Check the amount invariant on a transaction built by hand.
    pub fn validate(&self) -> FraudResult<()> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(FraudError::InvalidInput(format!(
                "transaction {} has invalid amount {}",
                self.id, self.amount
            )));
        }
        Ok(())
    }
}
