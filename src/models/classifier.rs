//! Probabilistic binary classifier seam

use crate::error::FraudResult;
use crate::feature_extractor::FeatureVector;

/// A pre-trained binary classifier exposing the positive-class probability.
///
/// Implementations are read-only at serving time and shared across threads.
/// Any error returned from [`Classifier::predict_proba`] is scoped to that one
/// call.
pub trait Classifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Probability in [0, 1] that the transaction is fraudulent
    fn predict_proba(&self, features: &FeatureVector) -> FraudResult<f64>;
}
