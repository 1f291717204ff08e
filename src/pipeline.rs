//! Scoring pipeline: feature extraction, classifier, decision, explanation.

use crate::config::{AppConfig, TimeBasis};
use crate::decision::{DecisionPolicy, FallbackPolicy};
use crate::error::{FraudError, FraudResult};
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::PipelineMetrics;
use crate::models::adapter::{ClassifierAdapter, ModelState, Score};
use crate::reasoner::FraudReasoner;
use crate::store::TransactionStore;
use crate::time_source::{SystemTimeSource, TimeSource};
use crate::types::context::RequestContext;
use crate::types::transaction::{RawTransaction, Transaction};
use crate::types::verdict::{ScoredTransaction, Verdict, VerdictSource};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Result of [`ScoringPipeline::ingest`].
///
/// The verdict is returned even when persisting it failed, so the caller can
/// decide whether to retry the store step.
#[derive(Debug)]
pub struct IngestReport {
    pub scored: ScoredTransaction,
    pub stored: Result<(), FraudError>,
}

/// Composes the feature extractor, classifier adapter and fraud reasoner into
/// one `analyze` operation.
///
/// Stateless per call apart from the shared, read-only classifier handle.
pub struct ScoringPipeline {
    extractor: FeatureExtractor,
    adapter: ClassifierAdapter,
    policy: DecisionPolicy,
    fallback: FallbackPolicy,
    reasoner: FraudReasoner,
    time_basis: TimeBasis,
    clock: Arc<dyn TimeSource>,
    metrics: Arc<PipelineMetrics>,
}

impl ScoringPipeline {
    /// Build a pipeline around `adapter` with the thresholds from `config`
    pub fn new(adapter: ClassifierAdapter, config: &AppConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            adapter,
            policy: DecisionPolicy::from(&config.detection),
            fallback: FallbackPolicy::from(&config.detection),
            reasoner: FraudReasoner::new(&config.reasons),
            time_basis: config.features.time_basis,
            clock: Arc::new(SystemTimeSource),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build a pipeline whose classifier is the ONNX artifact named in `config`.
    ///
    /// Loads eagerly unless `model.lazy_load` is set.
    pub fn from_config(config: &AppConfig) -> Self {
        let adapter = ClassifierAdapter::from_path(&config.model.path, config.model.onnx_threads);
        if !config.model.lazy_load {
            adapter.load();
        }
        Self::new(adapter, config)
    }

    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> ModelState {
        self.adapter.state()
    }

    /// The classifier handle, e.g. for [`ClassifierAdapter::model_info`]
    pub fn adapter(&self) -> &ClassifierAdapter {
        &self.adapter
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Score one transaction.
    ///
    /// Only a transaction with an invalid amount is an error; every other
    /// failure degrades to a defined verdict.
    pub fn analyze(&self, tx: &Transaction) -> FraudResult<Verdict> {
        let start_time = Instant::now();
        let verdict = self.decide(tx)?;
        self.metrics.record_verdict(start_time.elapsed(), &verdict);

        debug!(
            transaction_id = %tx.id,
            is_fraud = verdict.is_fraud,
            fraud_score = verdict.fraud_score,
            source = verdict.source.as_str(),
            "Transaction analyzed"
        );

        Ok(verdict)
    }

    fn decide(&self, tx: &Transaction) -> FraudResult<Verdict> {
        if self.adapter.state() == ModelState::ModelUnavailable {
            return Ok(Verdict::model_unavailable());
        }

        let at = match self.time_basis {
            TimeBasis::ScoringInstant => self.clock.now(),
            TimeBasis::EventTime => tx.timestamp,
        };
        let features = self.extractor.extract(tx, at)?;

        let probability = match self.adapter.score(&features) {
            Score::Probability(p) => p,
            Score::InferenceFailed => {
                warn!(transaction_id = %tx.id, "Using fallback detection for this transaction");
                return Ok(self.fallback.verdict(tx.amount));
            }
            // The state check above already covers this; kept total.
            Score::Unavailable => return Ok(Verdict::model_unavailable()),
        };

        let is_fraud = self.policy.classify(probability);
        let fraud_reason = self.reasoner.explain(tx, is_fraud, at);

        Ok(Verdict {
            is_fraud,
            fraud_score: probability,
            fraud_reason,
            source: VerdictSource::Model,
        })
    }

    /// Coerce raw fields, score, and persist for the caller in `ctx`.
    ///
    /// Invalid input is returned as an error and nothing is stored. A store
    /// failure is reported inside the returned [`IngestReport`].
    pub fn ingest(
        &self,
        ctx: &RequestContext,
        raw: RawTransaction,
        store: &dyn TransactionStore,
    ) -> FraudResult<IngestReport> {
        let tx = Transaction::from_raw(raw, &ctx.user_id, self.clock.now())?;
        let verdict = self.analyze(&tx)?;
        let scored = ScoredTransaction::new(tx, verdict);

        let stored = store.insert(ctx, &scored);
        if let Err(e) = &stored {
            self.metrics.record_store_failure();
            error!(
                transaction_id = %scored.transaction.id,
                error = %e,
                "Failed to store scored transaction"
            );
        }

        Ok(IngestReport { scored, stored })
    }
}
