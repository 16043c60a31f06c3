//! In-process audit log for tests, benches and dry runs.

use super::AuditSink;
use crate::error::StorageError;
use crate::scoring::{ScoreResult, ScoringFailure};
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryAuditLog {
    scores: Mutex<Vec<ScoreResult>>,
    failures: Mutex<Vec<ScoringFailure>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scores(&self) -> Vec<ScoreResult> {
        self.scores.lock().clone()
    }

    pub fn failures(&self) -> Vec<ScoringFailure> {
        self.failures.lock().clone()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record_score(&self, result: &ScoreResult) -> Result<(), StorageError> {
        self.scores.lock().push(result.clone());
        Ok(())
    }

    fn record_failure(&self, failure: &ScoringFailure) -> Result<(), StorageError> {
        self.failures.lock().push(failure.clone());
        Ok(())
    }
}
