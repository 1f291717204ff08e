//! Classifier adapter: single-initialization model handle with call-scoped
//! failure reporting.

use crate::error::{FraudError, FraudResult};
use crate::feature_extractor::FeatureVector;
use crate::models::classifier::Classifier;
use crate::models::loader::ModelLoader;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

type LoadFn = Box<dyn Fn() -> FraudResult<Arc<dyn Classifier>> + Send + Sync>;

/// Outcome of one scoring call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// Positive-class probability in [0, 1]
    Probability(f64),
    /// The loaded classifier failed on this call only
    InferenceFailed,
    /// No classifier is loaded
    Unavailable,
}

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    ModelUnavailable,
    Ready,
}

/// Metadata about the loaded artifact
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub path: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

struct LoadedClassifier {
    classifier: Arc<dyn Classifier>,
    info: ModelInfo,
}

/// Wraps a pre-trained classifier behind a lazily initialized, immutable
/// handle.
///
/// The first caller triggers the load; concurrent callers block on the same
/// attempt. A failed load leaves the adapter permanently degraded.
pub struct ClassifierAdapter {
    loader: LoadFn,
    path: Option<String>,
    slot: OnceCell<Option<LoadedClassifier>>,
}

impl ClassifierAdapter {
    /// Adapter for an ONNX artifact on disk, loaded on first use
    pub fn from_path(path: impl Into<String>, onnx_threads: usize) -> Self {
        let path = path.into();
        let artifact = path.clone();
        let loader: LoadFn = Box::new(move || {
            let model = ModelLoader::with_threads(onnx_threads)?.load_model(&artifact)?;
            Ok(Arc::new(model) as Arc<dyn Classifier>)
        });

        Self {
            loader,
            path: Some(path),
            slot: OnceCell::new(),
        }
    }

    /// Adapter whose classifier is produced by `loader` on first use
    pub fn from_loader<F>(loader: F) -> Self
    where
        F: Fn() -> FraudResult<Arc<dyn Classifier>> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            path: None,
            slot: OnceCell::new(),
        }
    }

    /// Adapter around an already constructed classifier
    pub fn from_classifier(classifier: Arc<dyn Classifier>) -> Self {
        let adapter = Self::from_loader(|| {
            Err(FraudError::ModelUnavailable(
                "classifier supplied at construction".to_string(),
            ))
        });
        let loaded = LoadedClassifier {
            info: ModelInfo {
                name: classifier.name().to_string(),
                path: None,
                loaded_at: Utc::now(),
            },
            classifier,
        };
        // A freshly created cell is always empty.
        let _ = adapter.slot.set(Some(loaded));
        adapter
    }

    /// Adapter that is degraded from the start
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::from_loader(move || Err(FraudError::ModelUnavailable(reason.clone())))
    }

    fn loaded(&self) -> Option<&LoadedClassifier> {
        self.slot
            .get_or_init(|| match (self.loader)() {
                Ok(classifier) => {
                    info!(model = %classifier.name(), "Classifier ready");
                    Some(LoadedClassifier {
                        info: ModelInfo {
                            name: classifier.name().to_string(),
                            path: self.path.clone(),
                            loaded_at: Utc::now(),
                        },
                        classifier,
                    })
                }
                Err(e) => {
                    warn!(
                        path = ?self.path,
                        error = %e,
                        "Classifier unavailable, pipeline is degraded"
                    );
                    None
                }
            })
            .as_ref()
    }

    /// Force the load now and report the resulting state
    pub fn load(&self) -> ModelState {
        self.state()
    }

    pub fn state(&self) -> ModelState {
        match self.loaded() {
            Some(_) => ModelState::Ready,
            None => ModelState::ModelUnavailable,
        }
    }

    pub fn model_info(&self) -> Option<&ModelInfo> {
        self.loaded().map(|l| &l.info)
    }

    /// Score a feature vector.
    ///
    /// Never fails: errors and out-of-range outputs are reported as
    /// [`Score::InferenceFailed`] for this call only.
    pub fn score(&self, features: &FeatureVector) -> Score {
        let Some(loaded) = self.loaded() else {
            return Score::Unavailable;
        };

        match loaded.classifier.predict_proba(features) {
            Ok(p) if (0.0..=1.0).contains(&p) => Score::Probability(p),
            Ok(p) => {
                warn!(
                    model = %loaded.info.name,
                    probability = p,
                    "Classifier returned a value outside [0, 1]"
                );
                Score::InferenceFailed
            }
            Err(e) => {
                warn!(model = %loaded.info.name, error = %e, "Classifier invocation failed");
                Score::InferenceFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier(f64);

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn predict_proba(&self, _features: &FeatureVector) -> FraudResult<f64> {
            Ok(self.0)
        }
    }

    /// Fails on every odd-numbered call
    struct FlakyClassifier {
        calls: AtomicUsize,
    }

    impl Classifier for FlakyClassifier {
        fn name(&self) -> &str {
            "flaky"
        }

        fn predict_proba(&self, _features: &FeatureVector) -> FraudResult<f64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n % 2 == 0 {
                Err(FraudError::InferenceFailure("boom".to_string()))
            } else {
                Ok(0.9)
            }
        }
    }

    fn features() -> FeatureVector {
        FeatureVector {
            amount: 100.0,
            hour_of_day: 12,
            day_of_week: 1,
            merchant_category: 5,
            location_hash: 7,
            card_type_hash: 3,
        }
    }

    #[test]
    fn test_ready_adapter_scores() {
        let adapter = ClassifierAdapter::from_classifier(Arc::new(FixedClassifier(0.42)));
        assert_eq!(adapter.state(), ModelState::Ready);
        assert_eq!(adapter.score(&features()), Score::Probability(0.42));
        assert_eq!(adapter.model_info().unwrap().name, "fixed");
    }

    #[test]
    fn test_missing_artifact_degrades() {
        let adapter = ClassifierAdapter::from_path("no/such/model.onnx", 1);
        assert_eq!(adapter.state(), ModelState::ModelUnavailable);
        assert_eq!(adapter.score(&features()), Score::Unavailable);
        assert!(adapter.model_info().is_none());
    }

    #[test]
    fn test_failure_is_call_scoped() {
        let adapter = ClassifierAdapter::from_classifier(Arc::new(FlakyClassifier {
            calls: AtomicUsize::new(0),
        }));

        assert_eq!(adapter.score(&features()), Score::InferenceFailed);
        assert_eq!(adapter.score(&features()), Score::Probability(0.9));
        assert_eq!(adapter.state(), ModelState::Ready);
    }

    #[test]
    fn test_out_of_range_probability_is_a_failure() {
        for p in [1.5, -0.1, f64::NAN] {
            let adapter = ClassifierAdapter::from_classifier(Arc::new(FixedClassifier(p)));
            assert_eq!(adapter.score(&features()), Score::InferenceFailed);
        }
    }

    #[test]
    fn test_loader_runs_once_across_threads() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let adapter = Arc::new(ClassifierAdapter::from_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedClassifier(0.2)) as Arc<dyn Classifier>)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let adapter = adapter.clone();
                std::thread::spawn(move || adapter.score(&features()))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Score::Probability(0.2));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_not_retried() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let adapter = ClassifierAdapter::from_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FraudError::ModelUnavailable("corrupt".to_string()))
        });

        assert_eq!(adapter.load(), ModelState::ModelUnavailable);
        assert_eq!(adapter.score(&features()), Score::Unavailable);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
