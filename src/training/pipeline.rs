//! Train a candidate, evaluate it on the newest slice, and hand it to the registry.

use super::{build_examples, time_split, to_dataset, CancelToken, Example};
use crate::config::{Algorithm, ServiceConfig, TrainingConfig};
use crate::drift::ScoreHistogram;
use crate::error::{RegistryError, TrainingError};
use crate::features::FeatureExtractor;
use crate::model::{
    LogisticModel, LogisticParams, ModelParameters, StumpEnsemble, StumpParams, ValidationMetrics,
};
use crate::registry::{CandidateModel, ModelArtifact, ModelRegistry, ValidationReport};
use crate::transactions::{HistoryWindow, Label, Transaction};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// A trained candidate and its held-out evaluation
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub candidate: CandidateModel,
    pub report: ValidationReport,
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Published {
        artifact: Arc<ModelArtifact>,
        report: ValidationReport,
    },
    Rejected {
        reasons: Vec<String>,
        report: ValidationReport,
    },
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    decision_threshold: f64,
    drift_bins: usize,
    extractor: FeatureExtractor,
    registry: Arc<ModelRegistry>,
}

fn both_classes(examples: &[Example]) -> (usize, usize) {
    let positives = examples.iter().filter(|e| e.is_fraud).count();
    (positives, examples.len() - positives)
}

impl TrainingPipeline {
    pub fn new(config: &ServiceConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            config: config.training.clone(),
            decision_threshold: config.scoring.decision_threshold,
            drift_bins: config.drift.bins,
            extractor: FeatureExtractor::new(HistoryWindow::from(&config.history)),
            registry,
        }
    }

    /// Build a candidate from a labeled export without touching the registry.
    pub fn train(
        &self,
        transactions: &[Transaction],
        labels: &[Label],
        cancel: &CancelToken,
    ) -> Result<TrainingRun, TrainingError> {
        let schema_version = self.config.feature_schema_version;
        let examples = build_examples(transactions, labels, &self.extractor, schema_version, cancel)?;
        if examples.len() < self.config.min_examples {
            return Err(TrainingError::InsufficientData(format!(
                "{} labeled examples, need at least {}",
                examples.len(),
                self.config.min_examples
            )));
        }

        let split = time_split(examples, self.config.validation_fraction);
        for (name, part) in [("training", &split.train), ("validation", &split.validation)] {
            let (positives, negatives) = both_classes(part);
            if positives == 0 || negatives == 0 {
                return Err(TrainingError::InsufficientData(format!(
                    "{name} partition needs both classes (fraud: {positives}, legitimate: {negatives})"
                )));
            }
        }
        info!(
            algorithm = ?self.config.algorithm,
            schema = schema_version,
            train = split.train.len(),
            validation = split.validation.len(),
            "training started"
        );

        let data = to_dataset(&split.train, schema_version, self.config.class_weighting);
        let parameters = match self.config.algorithm {
            Algorithm::Logistic => ModelParameters::Logistic(LogisticModel::fit(
                &data,
                &LogisticParams {
                    learning_rate: self.config.learning_rate,
                    epochs: self.config.epochs,
                    l2: self.config.l2,
                },
                cancel,
            )?),
            Algorithm::BoostedStumps => ModelParameters::BoostedStumps(StumpEnsemble::fit(
                &data,
                &StumpParams {
                    rounds: self.config.boosting_rounds,
                },
                cancel,
            )?),
        };

        let model = parameters.to_model();
        let scores = split
            .validation
            .iter()
            .map(|e| model.predict(&e.features))
            .collect::<Result<Vec<f64>, _>>()?;
        let labels: Vec<bool> = split.validation.iter().map(|e| e.is_fraud).collect();
        let metrics = ValidationMetrics::evaluate(&scores, &labels, self.decision_threshold)?;

        let report = ValidationReport {
            metrics,
            train_examples: split.train.len(),
            validation_examples: split.validation.len(),
            validation_start: split.validation.first().map(|e| e.timestamp),
            reference_scores: ScoreHistogram::from_scores(&scores, self.drift_bins),
        };
        info!(
            auc = report.metrics.auc,
            recall = report.metrics.recall,
            precision = report.metrics.precision,
            "candidate trained"
        );

        Ok(TrainingRun {
            candidate: CandidateModel {
                trained_at: Utc::now(),
                feature_schema_version: schema_version,
                parameters,
            },
            report,
        })
    }

    /// Train and submit the candidate. A gate rejection is an outcome, not an error, and is
    /// never retried.
    pub fn run(
        &self,
        transactions: &[Transaction],
        labels: &[Label],
        cancel: &CancelToken,
    ) -> Result<PipelineOutcome, TrainingError> {
        let TrainingRun { candidate, report } = self.train(transactions, labels, cancel)?;
        if cancel.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }
        match self.registry.publish(candidate, &report) {
            Ok(artifact) => Ok(PipelineOutcome::Published { artifact, report }),
            Err(RegistryError::ValidationRejected { reasons }) => {
                warn!(reasons = ?reasons, "candidate not published");
                Ok(PipelineOutcome::Rejected { reasons, report })
            }
            Err(e) => Err(e.into()),
        }
    }
}
