//! Feature extraction for fraud model inference.
//!
//! Maps a transaction onto the fixed 6-field vector the classifier was trained
//! on. Categorical text is reduced to bounded codes with a pinned hash so that
//! training and serving agree across processes and reimplementations.

use crate::error::FraudResult;
use crate::types::transaction::Transaction;
use chrono::{DateTime, Datelike, Timelike, Utc};
use xxhash_rust::xxh3::xxh3_64;

/// Identifier of the categorical hashing scheme. Bump when it changes.
pub const FEATURE_HASH_SCHEME: &str = "xxh3-64/v1";

/// Number of features produced
pub const FEATURE_COUNT: usize = 6;

pub const MERCHANT_CATEGORY_BUCKETS: u64 = 100;
pub const LOCATION_BUCKETS: u64 = 100;
pub const CARD_TYPE_BUCKETS: u64 = 10;

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "amount",
    "hour_of_day",
    "day_of_week",
    "merchant_category",
    "location_hash",
    "card_type_hash",
];

/// Numeric encoding of one transaction, valid for one scoring call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub amount: f64,
    /// 0..=23
    pub hour_of_day: u32,
    /// 0..=6, Monday is 0
    pub day_of_week: u32,
    /// 0..MERCHANT_CATEGORY_BUCKETS
    pub merchant_category: u64,
    /// 0..LOCATION_BUCKETS
    pub location_hash: u64,
    /// 0..CARD_TYPE_BUCKETS
    pub card_type_hash: u64,
}

impl FeatureVector {
    /// Model input in the order of [`FEATURE_NAMES`]
    pub fn to_array(&self) -> [f32; FEATURE_COUNT] {
        [
            self.amount as f32,
            self.hour_of_day as f32,
            self.day_of_week as f32,
            self.merchant_category as f32,
            self.location_hash as f32,
            self.card_type_hash as f32,
        ]
    }
}

/// Map free text to a code in `0..buckets`.
pub fn categorical_code(text: &str, buckets: u64) -> u64 {
    xxh3_64(text.as_bytes()) % buckets
}

/// Transforms transactions into model input features.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a transaction.
    ///
    /// `at` supplies hour-of-day and day-of-week. The caller chooses whether
    /// that is the scoring instant or the transaction's own timestamp.
    pub fn extract(&self, tx: &Transaction, at: DateTime<Utc>) -> FraudResult<FeatureVector> {
        tx.validate()?;

        Ok(FeatureVector {
            amount: tx.amount,
            hour_of_day: at.hour(),
            day_of_week: at.weekday().num_days_from_monday(),
            merchant_category: categorical_code(&tx.category, MERCHANT_CATEGORY_BUCKETS),
            location_hash: categorical_code(&tx.location, LOCATION_BUCKETS),
            card_type_hash: categorical_code(&tx.card_type, CARD_TYPE_BUCKETS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FraudError;
    use chrono::TimeZone;

    fn sample_tx() -> Transaction {
        Transaction {
            id: "tx_001".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            amount: 250.0,
            merchant: "Coffee House".to_string(),
            category: "food".to_string(),
            description: "latte".to_string(),
            location: "Springfield".to_string(),
            user_id: "user-1".to_string(),
            card_type: "visa".to_string(),
        }
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        // 2024-03-06 is a Wednesday
        let at = Utc.with_ymd_and_hms(2024, 3, 6, 3, 30, 0).unwrap();

        let features = extractor.extract(&sample_tx(), at).unwrap();

        assert_eq!(features.amount, 250.0);
        assert_eq!(features.hour_of_day, 3);
        assert_eq!(features.day_of_week, 2);
        assert!(features.merchant_category < MERCHANT_CATEGORY_BUCKETS);
        assert!(features.location_hash < LOCATION_BUCKETS);
        assert!(features.card_type_hash < CARD_TYPE_BUCKETS);
        assert_eq!(features.to_array().len(), FEATURE_NAMES.len());
    }

    #[test]
    fn test_same_instant_gives_identical_vectors() {
        let extractor = FeatureExtractor::new();
        let at = Utc.with_ymd_and_hms(2024, 7, 14, 18, 0, 0).unwrap();
        let tx = sample_tx();

        assert_eq!(
            extractor.extract(&tx, at).unwrap(),
            extractor.extract(&tx, at).unwrap()
        );
    }

    #[test]
    fn test_codes_are_pinned() {
        // Changing these values means retraining; bump FEATURE_HASH_SCHEME.
        assert_eq!(categorical_code("", 100), xxh3_64(b"") % 100);
        assert_eq!(
            categorical_code("groceries", 100),
            categorical_code("groceries", 100)
        );
        assert!(categorical_code("Foreign Co.", LOCATION_BUCKETS) < LOCATION_BUCKETS);
        assert!(categorical_code("", CARD_TYPE_BUCKETS) < CARD_TYPE_BUCKETS);
    }

    #[test]
    fn test_rejects_invalid_amount() {
        let mut tx = sample_tx();
        tx.amount = f64::NAN;
        let err = FeatureExtractor::new().extract(&tx, Utc::now()).unwrap_err();
        assert!(matches!(err, FraudError::InvalidInput(_)));
    }

    #[test]
    fn test_array_follows_feature_names() {
        let at = Utc.with_ymd_and_hms(2024, 3, 6, 3, 30, 0).unwrap();
        let features = FeatureExtractor::new().extract(&sample_tx(), at).unwrap();
        let array = features.to_array();

        assert_eq!(FEATURE_NAMES[0], "amount");
        assert_eq!(array[0], 250.0);
        assert_eq!(FEATURE_NAMES[1], "hour_of_day");
        assert_eq!(array[1], 3.0);
        assert_eq!(FEATURE_NAMES[5], "card_type_hash");
        assert_eq!(array[5], features.card_type_hash as f32);
    }
}
