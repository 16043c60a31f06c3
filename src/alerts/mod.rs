//! Fraud alerts: notify staff when a transaction is flagged or trips a rule signal.

mod webhook;

pub use webhook::WebhookAlerter;

use crate::scoring::{Decision, RuleHit, ScoreResult};
use crate::transactions::Transaction;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Rule signal without a flag
    Medium,
    /// Flagged by the model
    High,
    /// Flagged and a rule signal
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub transaction_id: String,
    pub account_id: String,
    pub severity: AlertSeverity,
    pub decision: Decision,
    pub fraud_probability: f64,
    pub model_version: u64,
    pub rule_hits: Vec<RuleHit>,
    pub raised_at: DateTime<Utc>,
}

impl FraudAlert {
    /// Alert for a scored transaction, or `None` when it was neither flagged nor hit a rule.
    pub fn for_result(tx: &Transaction, result: &ScoreResult) -> Option<Self> {
        let flagged = result.decision == Decision::Flag;
        let severity = match (flagged, !result.rule_hits.is_empty()) {
            (true, true) => AlertSeverity::Critical,
            (true, false) => AlertSeverity::High,
            (false, true) => AlertSeverity::Medium,
            (false, false) => return None,
        };
        Some(Self {
            transaction_id: result.transaction_id.clone(),
            account_id: tx.account_id.clone(),
            severity,
            decision: result.decision,
            fraud_probability: result.fraud_probability,
            model_version: result.model_version,
            rule_hits: result.rule_hits.clone(),
            raised_at: result.scored_at,
        })
    }
}

/// Delivery target for fraud alerts. Implementations must not block scoring for long.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &FraudAlert);
}

/// Writes alerts at or above `min_severity` to the log.
pub struct LogAlerts {
    min_severity: AlertSeverity,
}

impl LogAlerts {
    pub fn new(min_severity: AlertSeverity) -> Self {
        Self { min_severity }
    }
}

impl AlertSink for LogAlerts {
    fn notify(&self, alert: &FraudAlert) {
        if alert.severity < self.min_severity {
            return;
        }
        warn!(
            transaction_id = %alert.transaction_id,
            account_id = %alert.account_id,
            severity = alert.severity.as_str(),
            probability = alert.fraud_probability,
            rule_hits = ?alert.rule_hits,
            "fraud alert"
        );
    }
}

/// Keeps every alert in memory.
#[derive(Default)]
pub struct MemoryAlerts {
    alerts: Mutex<Vec<FraudAlert>>,
}

impl MemoryAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<FraudAlert> {
        self.alerts.lock().clone()
    }
}

impl AlertSink for MemoryAlerts {
    fn notify(&self, alert: &FraudAlert) {
        self.alerts.lock().push(alert.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::Channel;

    fn scored(decision: Decision, rule_hits: Vec<RuleHit>) -> (Transaction, ScoreResult) {
        let tx = Transaction::new("t1", "acct-7", 6200.0, Utc::now(), "money_transfer", Channel::Online);
        let result = ScoreResult {
            id: "r1".into(),
            transaction_id: "t1".into(),
            fraud_probability: 0.91,
            decision,
            model_version: 3,
            feature_schema_version: 2,
            rule_hits,
            scored_at: Utc::now(),
        };
        (tx, result)
    }

    #[test]
    fn severity_follows_flag_and_rule_hits() {
        let (tx, r) = scored(Decision::Allow, vec![]);
        assert!(FraudAlert::for_result(&tx, &r).is_none());

        let (tx, r) = scored(Decision::Flag, vec![]);
        assert_eq!(FraudAlert::for_result(&tx, &r).map(|a| a.severity), Some(AlertSeverity::High));

        let (tx, r) = scored(Decision::Allow, vec![RuleHit::AuthorizedPushPayment]);
        assert_eq!(FraudAlert::for_result(&tx, &r).map(|a| a.severity), Some(AlertSeverity::Medium));

        let (tx, r) = scored(Decision::Flag, vec![RuleHit::AccountTakeover]);
        let alert = FraudAlert::for_result(&tx, &r).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.account_id, "acct-7");
        assert_eq!(alert.model_version, 3);
    }

    #[test]
    fn severity_orders_low_to_high() {
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert!(AlertSeverity::High < AlertSeverity::Critical);
    }
}
