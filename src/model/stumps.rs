//! AdaBoost over single-split decision stumps. Probability is recovered from the
//! additive margin as sigmoid(2F).

use super::{check_input, finite_probability, sigmoid, Dataset, ModelMetadata, ScoringModel};
use crate::config::Algorithm;
use crate::error::{ModelError, TrainingError};
use crate::features::FeatureVector;
use crate::training::CancelToken;
use serde::{Deserialize, Serialize};

/// Candidate split points considered per feature
const MAX_SPLITS: usize = 32;
const MIN_ERROR: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StumpParams {
    pub rounds: usize,
}

/// Votes `polarity` when the feature exceeds `threshold`, `-polarity` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature: usize,
    pub threshold: f64,
    pub polarity: f64,
    pub alpha: f64,
}

impl Stump {
    fn vote(&self, x: f64) -> f64 {
        if x > self.threshold {
            self.polarity
        } else {
            -self.polarity
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StumpEnsemble {
    metadata: ModelMetadata,
    stumps: Vec<Stump>,
}

fn split_points(column: &[f64]) -> Vec<f64> {
    let mut values: Vec<f64> = column.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    if values.len() < 2 {
        return Vec::new();
    }
    let picked: Vec<f64> = if values.len() > MAX_SPLITS + 1 {
        (0..=MAX_SPLITS)
            .map(|i| values[i * (values.len() - 1) / MAX_SPLITS])
            .collect()
    } else {
        values
    };
    picked.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

impl StumpEnsemble {
    pub fn new(schema_version: u32, feature_count: usize, stumps: Vec<Stump>) -> Self {
        Self {
            metadata: ModelMetadata {
                algorithm: Algorithm::BoostedStumps,
                feature_schema_version: schema_version,
                feature_count,
            },
            stumps,
        }
    }

    pub fn fit(data: &Dataset, params: &StumpParams, cancel: &CancelToken) -> Result<Self, TrainingError> {
        let x = &data.features;
        let (n, d) = x.dim();
        if n == 0 {
            return Err(TrainingError::InsufficientData("empty training partition".into()));
        }
        let y: Vec<f64> = data.labels.iter().map(|&l| if l { 1.0 } else { -1.0 }).collect();
        let total: f64 = data.weights.iter().sum::<f64>().max(f64::EPSILON);
        let mut dist: Vec<f64> = data.weights.iter().map(|w| w / total).collect();

        let columns: Vec<Vec<f64>> = (0..d).map(|j| x.column(j).to_vec()).collect();
        let splits: Vec<Vec<f64>> = columns.iter().map(|c| split_points(c)).collect();

        let mut stumps = Vec::with_capacity(params.rounds);
        for _ in 0..params.rounds {
            if cancel.is_cancelled() {
                return Err(TrainingError::Cancelled);
            }

            // (error, feature, threshold, polarity)
            let mut best: Option<(f64, usize, f64, f64)> = None;
            for (j, thresholds) in splits.iter().enumerate() {
                for &t in thresholds {
                    let err_pos: f64 = columns[j]
                        .iter()
                        .zip(&y)
                        .zip(&dist)
                        .filter(|((xv, yv), _)| (if **xv > t { 1.0 } else { -1.0 }) != **yv)
                        .map(|(_, dw)| *dw)
                        .sum();
                    for (err, polarity) in [(err_pos, 1.0), (1.0 - err_pos, -1.0)] {
                        if best.map_or(true, |b| err < b.0) {
                            best = Some((err, j, t, polarity));
                        }
                    }
                }
            }

            let Some((err, feature, threshold, polarity)) = best else {
                break;
            };
            if err >= 0.5 {
                break;
            }
            let err = err.max(MIN_ERROR);
            let alpha = 0.5 * ((1.0 - err) / err).ln();
            let stump = Stump {
                feature,
                threshold,
                polarity,
                alpha,
            };

            for i in 0..n {
                dist[i] *= (-alpha * y[i] * stump.vote(columns[feature][i])).exp();
            }
            let norm: f64 = dist.iter().sum();
            dist.iter_mut().for_each(|w| *w /= norm);
            stumps.push(stump);
        }

        tracing::debug!(rounds = stumps.len(), "boosted stumps fitted");
        Ok(Self::new(data.schema_version, d, stumps))
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn stumps(&self) -> &[Stump] {
        &self.stumps
    }
}

impl ScoringModel for StumpEnsemble {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        check_input(&self.metadata, features)?;
        let margin: f64 = self
            .stumps
            .iter()
            .map(|s| s.alpha * s.vote(features.values[s.feature]))
            .sum();
        finite_probability(sigmoid(2.0 * margin))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
