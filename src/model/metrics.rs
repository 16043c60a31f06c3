//! Held-out evaluation: precision and recall at the decision threshold, ROC AUC.

use crate::error::MetricsError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub auc: f64,
    /// Decision threshold precision/recall were measured at
    pub threshold: f64,
    pub positives: usize,
    pub negatives: usize,
}

impl ValidationMetrics {
    pub fn evaluate(scores: &[f64], labels: &[bool], threshold: f64) -> Result<Self, MetricsError> {
        if scores.len() != labels.len() {
            return Err(MetricsError::LengthMismatch {
                scores: scores.len(),
                labels: labels.len(),
            });
        }
        let positives = labels.iter().filter(|l| **l).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(MetricsError::SingleClass { positives, negatives });
        }

        let (mut tp, mut fp) = (0usize, 0usize);
        for (s, l) in scores.iter().zip(labels) {
            if *s >= threshold {
                if *l {
                    tp += 1;
                } else {
                    fp += 1;
                }
            }
        }
        let precision = if tp + fp == 0 {
            0.0
        } else {
            tp as f64 / (tp + fp) as f64
        };
        let recall = tp as f64 / positives as f64;

        Ok(Self {
            precision,
            recall,
            auc: auc(scores, labels, positives, negatives),
            threshold,
            positives,
            negatives,
        })
    }
}

/// Mann-Whitney U formulation with average ranks for ties.
fn auc(scores: &[f64], labels: &[bool], positives: usize, negatives: usize) -> f64 {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (rank_sum_pos - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}
