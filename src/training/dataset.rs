//! Label join, feature assembly and the time-ordered train/validation split.

use super::CancelToken;
use crate::config::ClassWeighting;
use crate::error::TrainingError;
use crate::features::{FeatureExtractor, FeatureVector};
use crate::model::Dataset;
use crate::transactions::{Label, Transaction};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One labeled transaction in feature space
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub features: FeatureVector,
    pub is_fraud: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TimeSplit {
    pub train: Vec<Example>,
    pub validation: Vec<Example>,
}

/// Latest label per transaction; on equal `labeled_at` the later record wins.
fn latest_labels(labels: &[Label]) -> HashMap<&str, &Label> {
    let mut latest: HashMap<&str, &Label> = HashMap::new();
    for label in labels {
        match latest.get(label.transaction_id.as_str()) {
            Some(prev) if prev.labeled_at > label.labeled_at => {}
            _ => {
                latest.insert(&label.transaction_id, label);
            }
        }
    }
    latest
}

/// Join labels onto transactions and extract features, oldest first (ties by id).
///
/// Every transaction in the export, labeled or not, is eligible as history, selected with the
/// same window the scoring service uses.
pub fn build_examples(
    transactions: &[Transaction],
    labels: &[Label],
    extractor: &FeatureExtractor,
    schema_version: u32,
    cancel: &CancelToken,
) -> Result<Vec<Example>, TrainingError> {
    let mut seen = HashSet::new();
    let mut by_account: HashMap<&str, Vec<&Transaction>> = HashMap::new();
    let mut duplicates = 0usize;
    for tx in transactions {
        if !seen.insert(tx.id.as_str()) {
            duplicates += 1;
            continue;
        }
        by_account.entry(tx.account_id.as_str()).or_default().push(tx);
    }
    if duplicates > 0 {
        warn!(duplicates, "duplicate transaction ids in export; keeping first occurrence");
    }

    let labels = latest_labels(labels);
    let mut labeled: Vec<(&Transaction, bool)> = by_account
        .values()
        .flatten()
        .filter_map(|tx| labels.get(tx.id.as_str()).map(|l| (*tx, l.is_fraud)))
        .collect();
    labeled.sort_by(|a, b| a.0.timestamp.cmp(&b.0.timestamp).then_with(|| a.0.id.cmp(&b.0.id)));
    debug!(
        transactions = seen.len(),
        labeled = labeled.len(),
        "joined labels to transactions"
    );

    let mut examples = Vec::with_capacity(labeled.len());
    for (tx, is_fraud) in labeled {
        if cancel.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }
        if let Err(e) = tx.validate() {
            warn!(transaction_id = %tx.id, error = %e, "skipping invalid transaction");
            continue;
        }
        let candidates = by_account
            .get(tx.account_id.as_str())
            .map(|v| v.iter().copied())
            .into_iter()
            .flatten();
        let history = extractor.window().select(tx, candidates);
        let features = extractor.extract(tx, &history, schema_version)?;
        examples.push(Example {
            features,
            is_fraud,
            timestamp: tx.timestamp,
        });
    }
    Ok(examples)
}

/// Oldest examples train, the newest `validation_fraction` validate.
pub fn time_split(mut examples: Vec<Example>, validation_fraction: f64) -> TimeSplit {
    let n = examples.len();
    let validation_len = ((n as f64 * validation_fraction).round().max(1.0) as usize).min(n);
    let validation = examples.split_off(n - validation_len);
    TimeSplit {
        train: examples,
        validation,
    }
}

/// (negative weight, positive weight) for the given labels
pub fn class_weights(labels: &[bool], weighting: ClassWeighting) -> (f64, f64) {
    let positives = labels.iter().filter(|l| **l).count();
    let negatives = labels.len() - positives;
    match weighting {
        ClassWeighting::None => (1.0, 1.0),
        ClassWeighting::Balanced if positives == 0 || negatives == 0 => (1.0, 1.0),
        ClassWeighting::Balanced => {
            let n = labels.len() as f64;
            (n / (2.0 * negatives as f64), n / (2.0 * positives as f64))
        }
    }
}

pub fn to_dataset(examples: &[Example], schema_version: u32, weighting: ClassWeighting) -> Dataset {
    let d = examples.first().map(|e| e.features.len()).unwrap_or(0);
    let features = Array2::from_shape_fn((examples.len(), d), |(i, j)| examples[i].features.values[j]);
    let labels: Vec<bool> = examples.iter().map(|e| e.is_fraud).collect();
    let (neg_w, pos_w) = class_weights(&labels, weighting);
    let weights = labels.iter().map(|&l| if l { pos_w } else { neg_w }).collect();
    Dataset {
        schema_version,
        features,
        labels,
        weights,
    }
}
