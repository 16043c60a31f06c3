//! Real-time scoring: transaction → features → active model → decision, with an audit
//! record for every call.

mod decision;
mod engine;
mod rules;

pub use decision::{Decision, DecisionPolicy};
pub use engine::ScoringService;
pub use rules::{evaluate_rules, RuleHit};

use crate::transactions::Transaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a successfully scored transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub id: String,
    pub transaction_id: String,
    pub fraud_probability: f64,
    pub decision: Decision,
    pub model_version: u64,
    pub feature_schema_version: u32,
    #[serde(default)]
    pub rule_hits: Vec<RuleHit>,
    pub scored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringErrorKind {
    InvalidTransaction,
    NoActiveModel,
    HistoryUnavailable,
    SchemaMismatch,
    ModelFailure,
    AuditWrite,
}

impl ScoringErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringErrorKind::InvalidTransaction => "invalid_transaction",
            ScoringErrorKind::NoActiveModel => "no_active_model",
            ScoringErrorKind::HistoryUnavailable => "history_unavailable",
            ScoringErrorKind::SchemaMismatch => "schema_mismatch",
            ScoringErrorKind::ModelFailure => "model_failure",
            ScoringErrorKind::AuditWrite => "audit_write",
        }
    }
}

/// Scoring error record, kept apart from score results. Holds the transaction so a
/// reviewer can act on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringFailure {
    pub id: String,
    pub transaction_id: String,
    pub kind: ScoringErrorKind,
    pub message: String,
    pub model_version: Option<u64>,
    pub decision: Decision,
    pub occurred_at: DateTime<Utc>,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(ScoreResult),
    Failed(ScoringFailure),
}

impl ScoreOutcome {
    pub fn transaction_id(&self) -> &str {
        match self {
            ScoreOutcome::Scored(r) => &r.transaction_id,
            ScoreOutcome::Failed(f) => &f.transaction_id,
        }
    }

    pub fn decision(&self) -> Decision {
        match self {
            ScoreOutcome::Scored(r) => r.decision,
            ScoreOutcome::Failed(f) => f.decision,
        }
    }

    pub fn fraud_probability(&self) -> Option<f64> {
        match self {
            ScoreOutcome::Scored(r) => Some(r.fraud_probability),
            ScoreOutcome::Failed(_) => None,
        }
    }

    pub fn model_version(&self) -> Option<u64> {
        match self {
            ScoreOutcome::Scored(r) => Some(r.model_version),
            ScoreOutcome::Failed(f) => f.model_version,
        }
    }

    pub fn result(&self) -> Option<&ScoreResult> {
        match self {
            ScoreOutcome::Scored(r) => Some(r),
            ScoreOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScoringFailure> {
        match self {
            ScoreOutcome::Scored(_) => None,
            ScoreOutcome::Failed(f) => Some(f),
        }
    }
}
