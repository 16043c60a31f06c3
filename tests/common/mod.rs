#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use fraud_sentinel::features::{schema, CURRENT_SCHEMA_VERSION};
use fraud_sentinel::model::{LogisticModel, ModelParameters, ValidationMetrics};
use fraud_sentinel::registry::{CandidateModel, ValidationReport};
use fraud_sentinel::drift::ScoreHistogram;
use fraud_sentinel::transactions::{AuthSignals, Channel, Label, LabelSource, Transaction};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap()
}

/// Labeled export where every tenth transaction is fraud (large online transfer to a new
/// payee at a high-risk merchant).
pub fn export(n: usize) -> (Vec<Transaction>, Vec<Label>) {
    let mut txs = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let ts = start() + Duration::minutes(41 * i as i64);
        let account = format!("acct-{}", i % 12);
        let fraud = i % 10 == 7;
        let tx = if fraud {
            Transaction::new(
                format!("tx-{i}"),
                account,
                3000.0 + (i % 5) as f64 * 450.0,
                ts,
                "money_transfer",
                Channel::Online,
            )
            .with_signals(AuthSignals {
                failed_login_attempts: (i % 4) as u32,
                new_beneficiary: true,
            })
        } else {
            Transaction::new(
                format!("tx-{i}"),
                account,
                15.0 + (i * 17 % 120) as f64,
                ts,
                if i % 3 == 0 { "grocery" } else { "restaurants" },
                Channel::CardPresent,
            )
            .with_geolocation(44.97, -93.26)
        };
        labels.push(Label {
            transaction_id: tx.id.clone(),
            is_fraud: fraud,
            labeled_at: ts + Duration::days(7),
            source: LabelSource::Investigator,
        });
        txs.push(tx);
    }
    (txs, labels)
}

pub fn passing_report() -> ValidationReport {
    ValidationReport {
        metrics: ValidationMetrics {
            precision: 0.75,
            recall: 0.8,
            auc: 0.92,
            threshold: 0.5,
            positives: 10,
            negatives: 90,
        },
        train_examples: 400,
        validation_examples: 100,
        validation_start: None,
        reference_scores: ScoreHistogram::from_scores(&[0.1, 0.15, 0.2, 0.3, 0.8], 10),
    }
}

/// Logistic candidate that returns `p` for every input.
pub fn constant_candidate(p: f64) -> CandidateModel {
    let n = schema(CURRENT_SCHEMA_VERSION).map(|s| s.len()).unwrap_or(0);
    CandidateModel {
        trained_at: Utc::now(),
        feature_schema_version: CURRENT_SCHEMA_VERSION,
        parameters: ModelParameters::Logistic(LogisticModel::from_coefficients(
            CURRENT_SCHEMA_VERSION,
            vec![0.0; n],
            (p / (1.0 - p)).ln(),
        )),
    }
}
