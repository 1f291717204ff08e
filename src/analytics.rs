//! Read-only fraud reporting view over the transaction store

use crate::error::{FraudError, FraudResult};
use crate::types::context::RequestContext;
use serde::{Deserialize, Serialize};

/// Number of merchants listed in [`FraudReport::top_fraud_merchants`]
pub const TOP_MERCHANT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantCount {
    pub merchant: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Aggregate fraud statistics, admin only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub total_transactions: u64,
    pub fraud_transactions: u64,
    /// Percentage rounded to two decimals, 0 when there are no transactions
    pub fraud_percentage: f64,
    pub top_fraud_merchants: Vec<MerchantCount>,
    pub fraud_by_category: Vec<CategoryCount>,
}

impl FraudReport {
    pub fn new(
        total_transactions: u64,
        fraud_transactions: u64,
        top_fraud_merchants: Vec<MerchantCount>,
        fraud_by_category: Vec<CategoryCount>,
    ) -> Self {
        Self {
            total_transactions,
            fraud_transactions,
            fraud_percentage: fraud_percentage(total_transactions, fraud_transactions),
            top_fraud_merchants,
            fraud_by_category,
        }
    }
}

pub fn fraud_percentage(total: u64, fraud: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = fraud as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Reporting is restricted to admins
pub fn require_admin(ctx: &RequestContext) -> FraudResult<()> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(FraudError::AccessDenied(format!(
            "user {} may not view fraud analytics",
            ctx.user_id
        )))
    }
}
