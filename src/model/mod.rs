//! Scoring models. Anything that can `predict` a fraud probability and describe the
//! schema it was trained on can sit behind the registry.

mod logistic;
mod metrics;
mod stumps;

pub use logistic::{LogisticModel, LogisticParams};
pub use metrics::ValidationMetrics;
pub use stumps::{Stump, StumpEnsemble, StumpParams};

use crate::config::Algorithm;
use crate::error::ModelError;
use crate::features::FeatureVector;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a model was trained against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub algorithm: Algorithm,
    pub feature_schema_version: u32,
    pub feature_count: usize,
}

/// Binary fraud classifier capability
pub trait ScoringModel: Send + Sync {
    /// Fraud probability in [0, 1].
    fn predict(&self, features: &FeatureVector) -> Result<f64, ModelError>;

    fn metadata(&self) -> &ModelMetadata;
}

/// Serialized parameters of any supported classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ModelParameters {
    Logistic(LogisticModel),
    BoostedStumps(StumpEnsemble),
}

impl ModelParameters {
    pub fn metadata(&self) -> &ModelMetadata {
        match self {
            ModelParameters::Logistic(m) => m.metadata(),
            ModelParameters::BoostedStumps(m) => m.metadata(),
        }
    }

    /// Instantiate a shareable scorer from these parameters.
    pub fn to_model(&self) -> Arc<dyn ScoringModel> {
        match self {
            ModelParameters::Logistic(m) => Arc::new(m.clone()),
            ModelParameters::BoostedStumps(m) => Arc::new(m.clone()),
        }
    }
}

/// Labeled design matrix, one row per example in schema order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub schema_version: u32,
    pub features: Array2<f64>,
    pub labels: Vec<bool>,
    /// Per-example sample weight
    pub weights: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|l| **l).count()
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Reject vectors built for another schema, or carrying NaN/inf.
pub(crate) fn check_input(meta: &ModelMetadata, features: &FeatureVector) -> Result<(), ModelError> {
    if features.schema_version != meta.feature_schema_version || features.len() != meta.feature_count {
        return Err(ModelError::FeatureSchemaMismatch {
            expected_version: meta.feature_schema_version,
            expected_len: meta.feature_count,
            actual_version: features.schema_version,
            actual_len: features.len(),
        });
    }
    if let Some(idx) = features.values.iter().position(|v| !v.is_finite()) {
        return Err(ModelError::NonFiniteInput(idx));
    }
    Ok(())
}

pub(crate) fn finite_probability(p: f64) -> Result<f64, ModelError> {
    if p.is_finite() {
        Ok(p.clamp(0.0, 1.0))
    } else {
        Err(ModelError::NonFiniteOutput)
    }
}
