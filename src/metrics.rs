//! Performance metrics and statistics tracking for the scoring pipeline.

use crate::types::verdict::{Verdict, VerdictSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline activity
pub struct PipelineMetrics {
    /// Total transactions scored
    pub transactions_scored: AtomicU64,
    /// Verdicts with is_fraud set
    pub fraud_flagged: AtomicU64,
    /// Failed persistence writes
    pub store_failures: AtomicU64,
    /// Verdicts by producing path
    verdicts_by_source: RwLock<HashMap<VerdictSource, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            verdicts_by_source: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one verdict
    pub fn record_verdict(&self, processing_time: Duration, verdict: &Verdict) {
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);
        if verdict.is_fraud {
            self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_source) = self.verdicts_by_source.write() {
            *by_source.entry(verdict.source).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (verdict.fraud_score.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or_default()
    }

    pub fn get_verdicts_by_source(&self) -> HashMap<VerdictSource, u64> {
        self.verdicts_by_source
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let flagged = self.fraud_flagged.load(Ordering::Relaxed);
        let store_failures = self.store_failures.load(Ordering::Relaxed);
        let fraud_rate = if scored > 0 {
            (flagged as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let by_source = self.get_verdicts_by_source();
        let score_dist = self.get_score_distribution();

        info!(
            scored = scored,
            flagged = flagged,
            fraud_rate = format!("{:.1}%", fraud_rate),
            store_failures = store_failures,
            throughput = format!("{:.1} tx/s", self.get_throughput()),
            "Scoring summary"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Processing time"
        );
        for source in [
            VerdictSource::Model,
            VerdictSource::Fallback,
            VerdictSource::ModelUnavailable,
        ] {
            let count = by_source.get(&source).copied().unwrap_or(0);
            info!(source = source.as_str(), count = count, "Verdicts by source");
        }

        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!(
                "  {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
