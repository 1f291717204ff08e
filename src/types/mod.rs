//! Type definitions for the fraud scoring pipeline

pub mod context;
pub mod transaction;
pub mod verdict;

pub use context::{RequestContext, Role};
pub use transaction::{RawAmount, RawTransaction, Transaction};
pub use verdict::{ScoredTransaction, Verdict, VerdictSource};
