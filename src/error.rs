//! Error types for the scoring pipeline and transaction store

use thiserror::Error;

/// Errors surfaced by the library.
///
/// Only `InvalidInput`, `StoreFailure` and `AccessDenied` ever reach a caller of
/// [`crate::pipeline::ScoringPipeline`]. `ModelUnavailable` and `InferenceFailure`
/// are absorbed by the classifier adapter and turned into a defined verdict.
#[derive(Error, Debug)]
pub enum FraudError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    InferenceFailure(String),

    #[error("store failure: {0}")]
    StoreFailure(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    StoreLockPoisoned,

    #[error("store io error: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FraudError {
    /// True for errors raised by the persistence layer.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreFailure(_) | Self::StoreLockPoisoned | Self::StoreIo(_)
        )
    }
}

pub type FraudResult<T> = Result<T, FraudError>;
