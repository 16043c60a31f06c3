//! L2-regularized logistic regression on standardized features, fitted by batch gradient descent.

use super::{check_input, finite_probability, sigmoid, Dataset, ModelMetadata, ScoringModel};
use crate::config::Algorithm;
use crate::error::{ModelError, TrainingError};
use crate::features::FeatureVector;
use crate::training::CancelToken;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    metadata: ModelMetadata,
    /// Per-feature standardization learned on the training partition
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    /// Build from raw coefficients; means/scales default to the identity transform.
    pub fn from_coefficients(schema_version: u32, weights: Vec<f64>, bias: f64) -> Self {
        let n = weights.len();
        Self {
            metadata: ModelMetadata {
                algorithm: Algorithm::Logistic,
                feature_schema_version: schema_version,
                feature_count: n,
            },
            means: vec![0.0; n],
            scales: vec![1.0; n],
            weights,
            bias,
        }
    }

    pub fn fit(data: &Dataset, params: &LogisticParams, cancel: &CancelToken) -> Result<Self, TrainingError> {
        let x = &data.features;
        let (n, d) = x.dim();
        if n == 0 {
            return Err(TrainingError::InsufficientData("empty training partition".into()));
        }

        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let z = (x - &means) / &scales;

        let y: Array1<f64> = data.labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let w = Array1::from(data.weights.clone());
        let wsum = w.sum().max(f64::EPSILON);

        let mut coef = Array1::<f64>::zeros(d);
        let mut bias = 0.0;
        for _ in 0..params.epochs {
            if cancel.is_cancelled() {
                return Err(TrainingError::Cancelled);
            }
            let p = (z.dot(&coef) + bias).mapv(sigmoid);
            let residual = (p - &y) * &w;
            let mut grad = z.t().dot(&residual) / wsum;
            grad.scaled_add(params.l2, &coef);
            coef.scaled_add(-params.learning_rate, &grad);
            bias -= params.learning_rate * residual.sum() / wsum;
        }

        Ok(Self {
            metadata: ModelMetadata {
                algorithm: Algorithm::Logistic,
                feature_schema_version: data.schema_version,
                feature_count: d,
            },
            means: means.to_vec(),
            scales: scales.to_vec(),
            weights: coef.to_vec(),
            bias,
        })
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl ScoringModel for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        check_input(&self.metadata, features)?;
        let logit = self.bias
            + features
                .values
                .iter()
                .zip(&self.means)
                .zip(&self.scales)
                .zip(&self.weights)
                .map(|(((x, m), s), w)| (x - m) / s * w)
                .sum::<f64>();
        finite_probability(sigmoid(logit))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
