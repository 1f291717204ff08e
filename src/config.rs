//! Configuration management for the fraud scoring pipeline

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Which instant the temporal features are derived from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeBasis {
    /// Wall clock at scoring time. Two scorings of the same transaction at
    /// different moments can disagree.
    #[default]
    ScoringInstant,
    /// The transaction's own timestamp. Pure and replayable.
    EventTime,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
    pub reasons: ReasonConfig,
    pub features: FeatureConfig,
    pub store: StoreConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the ONNX artifact
    pub path: String,
    /// Defer loading until the first scoring call
    #[serde(default = "default_lazy_load")]
    pub lazy_load: bool,
    /// Number of intra-op threads for ONNX inference
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_lazy_load() -> bool {
    true
}

fn default_onnx_threads() -> usize {
    1
}

/// Decision thresholds for the model and fallback paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Probability above which a transaction is flagged.
    /// Raising it trades false positives for false negatives.
    pub threshold: f64,
    /// Amount above which the fallback path flags a transaction
    pub fallback_amount_threshold: f64,
    /// Score reported by the fallback path when it flags
    pub fallback_fraud_score: f64,
    /// Score reported by the fallback path when it does not flag
    pub fallback_clear_score: f64,
}

/// Trigger parameters for the explanation rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonConfig {
    pub high_amount: f64,
    /// Hours strictly below this are unusual
    pub quiet_hours_start: u32,
    /// Hours strictly above this are unusual
    pub quiet_hours_end: u32,
    /// Case-insensitive marker searched for in the location text
    pub location_marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub time_basis: TimeBasis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: String,
}

/// Batch ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of transactions scored concurrently
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration layered as defaults, then the file at `path` if it
    /// exists, then `FRAUD__SECTION__KEY` environment variables.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(
                Config::try_from(&AppConfig::default())
                    .context("Failed to serialize default configuration")?,
            )
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("FRAUD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    /// Reject values that would break the verdict invariants
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.detection.threshold) {
            anyhow::bail!(
                "detection.threshold must be within [0, 1], got {}",
                self.detection.threshold
            );
        }
        if !unit.contains(&self.detection.fallback_fraud_score)
            || !unit.contains(&self.detection.fallback_clear_score)
        {
            anyhow::bail!("detection fallback scores must be within [0, 1]");
        }
        if self.reasons.quiet_hours_start > 23 || self.reasons.quiet_hours_end > 23 {
            anyhow::bail!("reasons quiet hour bounds must be within 0..=23");
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                path: "model/fraud_detection_model.onnx".to_string(),
                lazy_load: default_lazy_load(),
                onnx_threads: default_onnx_threads(),
            },
            detection: DetectionConfig {
                threshold: 0.7,
                fallback_amount_threshold: 2000.0,
                fallback_fraud_score: 0.5,
                fallback_clear_score: 0.1,
            },
            reasons: ReasonConfig {
                high_amount: 1000.0,
                quiet_hours_start: 6,
                quiet_hours_end: 22,
                location_marker: "foreign".to_string(),
            },
            features: FeatureConfig {
                time_basis: TimeBasis::ScoringInstant,
            },
            store: StoreConfig {
                path: "instance/transactions.db".to_string(),
            },
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
