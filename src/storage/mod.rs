//! Audit persistence for score results, scoring failures and registry artifacts.

mod audit;
mod memory;

pub use audit::{AuditStore, RegistryChange, RegistryState};
pub use memory::MemoryAuditLog;

use crate::error::StorageError;
use crate::scoring::{ScoreResult, ScoringFailure};

/// Append-only destination for scoring records.
pub trait AuditSink: Send + Sync {
    fn record_score(&self, result: &ScoreResult) -> Result<(), StorageError>;

    fn record_failure(&self, failure: &ScoringFailure) -> Result<(), StorageError>;
}
