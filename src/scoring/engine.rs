//! Fail-closed scoring service.

use super::{evaluate_rules, DecisionPolicy, ScoreOutcome, ScoreResult, ScoringErrorKind, ScoringFailure};
use crate::alerts::{AlertSink, FraudAlert};
use crate::error::{FeatureError, ModelError, RegistryError};
use crate::features::FeatureExtractor;
use crate::registry::ModelRegistry;
use crate::storage::AuditSink;
use crate::transactions::{AccountHistory, Transaction};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

struct Fault {
    kind: ScoringErrorKind,
    message: String,
    model_version: Option<u64>,
}

impl Fault {
    fn new(kind: ScoringErrorKind, message: impl ToString, model_version: Option<u64>) -> Self {
        Self {
            kind,
            message: message.to_string(),
            model_version,
        }
    }
}

/// Scores transactions against whatever model the registry has active.
///
/// Holds only shared handles, so one instance serves concurrent callers.
pub struct ScoringService {
    registry: Arc<ModelRegistry>,
    history: Arc<dyn AccountHistory>,
    sink: Arc<dyn AuditSink>,
    extractor: FeatureExtractor,
    policy: DecisionPolicy,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl ScoringService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        history: Arc<dyn AccountHistory>,
        sink: Arc<dyn AuditSink>,
        extractor: FeatureExtractor,
        policy: DecisionPolicy,
    ) -> Self {
        Self {
            registry,
            history,
            sink,
            extractor,
            policy,
            alerts: None,
        }
    }

    /// Notify `sink` of every audited result that is flagged or trips a rule signal.
    pub fn with_alerts(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    /// Score one transaction. Never panics or errors: any failure becomes a recorded
    /// [`ScoringFailure`] carrying the policy's failure decision.
    pub fn score(&self, tx: &Transaction) -> ScoreOutcome {
        let fault = match self.evaluate(tx) {
            Ok(result) => match self.sink.record_score(&result) {
                Ok(()) => {
                    debug!(
                        transaction_id = %result.transaction_id,
                        model_version = result.model_version,
                        probability = result.fraud_probability,
                        decision = result.decision.as_str(),
                        "transaction scored"
                    );
                    if let Some(alerts) = &self.alerts {
                        if let Some(alert) = FraudAlert::for_result(tx, &result) {
                            alerts.notify(&alert);
                        }
                    }
                    return ScoreOutcome::Scored(result);
                }
                Err(e) => Fault::new(ScoringErrorKind::AuditWrite, e, Some(result.model_version)),
            },
            Err(fault) => fault,
        };
        ScoreOutcome::Failed(self.fail(tx, fault))
    }

    fn evaluate(&self, tx: &Transaction) -> Result<ScoreResult, Fault> {
        tx.validate()
            .map_err(|e| Fault::new(ScoringErrorKind::InvalidTransaction, e, None))?;

        // one pointer read per call; a concurrent publish cannot change the model mid-score
        let active = self.registry.get_active().map_err(|e| match e {
            RegistryError::NoActiveModel => Fault::new(ScoringErrorKind::NoActiveModel, e, None),
            other => Fault::new(ScoringErrorKind::ModelFailure, other, None),
        })?;
        let version = active.version();
        let schema_version = active.model.metadata().feature_schema_version;

        let history = self
            .history
            .recent(tx, self.extractor.window())
            .map_err(|e| Fault::new(ScoringErrorKind::HistoryUnavailable, e, Some(version)))?;

        let features = self
            .extractor
            .extract(tx, &history, schema_version)
            .map_err(|e: FeatureError| Fault::new(ScoringErrorKind::SchemaMismatch, e, Some(version)))?;

        let probability = active.model.predict(&features).map_err(|e| {
            let kind = match e {
                ModelError::FeatureSchemaMismatch { .. } => ScoringErrorKind::SchemaMismatch,
                _ => ScoringErrorKind::ModelFailure,
            };
            Fault::new(kind, e, Some(version))
        })?;

        let rule_hits = evaluate_rules(tx, &history);
        let decision = self.policy.decide(probability, &rule_hits);
        Ok(ScoreResult {
            id: Uuid::new_v4().to_string(),
            transaction_id: tx.id.clone(),
            fraud_probability: probability,
            decision,
            model_version: version,
            feature_schema_version: schema_version,
            rule_hits,
            scored_at: Utc::now(),
        })
    }

    fn fail(&self, tx: &Transaction, fault: Fault) -> ScoringFailure {
        let failure = ScoringFailure {
            id: Uuid::new_v4().to_string(),
            transaction_id: tx.id.clone(),
            kind: fault.kind,
            message: fault.message,
            model_version: fault.model_version,
            decision: self.policy.on_failure(),
            occurred_at: Utc::now(),
            transaction: tx.clone(),
        };
        warn!(
            transaction_id = %failure.transaction_id,
            kind = failure.kind.as_str(),
            decision = failure.decision.as_str(),
            error = %failure.message,
            "scoring failed"
        );
        if let Err(e) = self.sink.record_failure(&failure) {
            error!(transaction_id = %failure.transaction_id, error = %e, "failed to record scoring failure");
        }
        failure
    }
}
