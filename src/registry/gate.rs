//! Quality gate a candidate must clear before activation.

use super::{CandidateModel, ValidationReport};
use crate::config::QualityGateConfig;
use crate::features::schema;

#[derive(Debug, Clone)]
pub struct QualityGate {
    config: QualityGateConfig,
}

impl QualityGate {
    pub fn new(config: QualityGateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityGateConfig {
        &self.config
    }

    /// Every reason the candidate fails; empty means it passes.
    pub fn evaluate(&self, candidate: &CandidateModel, report: &ValidationReport) -> Vec<String> {
        let mut reasons = Vec::new();
        let m = &report.metrics;
        let c = &self.config;

        match schema(candidate.feature_schema_version) {
            None => reasons.push(format!(
                "unknown feature schema v{}",
                candidate.feature_schema_version
            )),
            Some(layout) => {
                let meta = candidate.parameters.metadata();
                if meta.feature_schema_version != candidate.feature_schema_version
                    || meta.feature_count != layout.len()
                {
                    reasons.push(format!(
                        "parameters expect v{} with {} features, candidate declares v{} ({} features)",
                        meta.feature_schema_version,
                        meta.feature_count,
                        candidate.feature_schema_version,
                        layout.len()
                    ));
                }
            }
        }
        if !(m.auc >= c.min_auc) {
            reasons.push(format!("auc {:.4} below minimum {:.4}", m.auc, c.min_auc));
        }
        if !(m.recall >= c.min_recall) {
            reasons.push(format!("recall {:.4} below minimum {:.4}", m.recall, c.min_recall));
        }
        if !(m.precision >= c.min_precision) {
            reasons.push(format!(
                "precision {:.4} below minimum {:.4}",
                m.precision, c.min_precision
            ));
        }
        if m.positives < c.min_validation_positives {
            reasons.push(format!(
                "validation slice has {} fraud examples, need {}",
                m.positives, c.min_validation_positives
            ));
        }
        reasons
    }
}
