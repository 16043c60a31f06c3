//! Versioned model artifacts and the candidates/validation reports they are built from.

use crate::config::Algorithm;
use crate::drift::ScoreHistogram;
use crate::model::{ModelParameters, ValidationMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A trained model proposed for activation. Carries no version until accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateModel {
    pub trained_at: DateTime<Utc>,
    pub feature_schema_version: u32,
    pub parameters: ModelParameters,
}

/// Evaluation of a candidate on the held-out (newest) slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub metrics: ValidationMetrics,
    pub train_examples: usize,
    pub validation_examples: usize,
    /// Timestamp of the oldest validation example
    pub validation_start: Option<DateTime<Utc>>,
    /// Score distribution on the validation slice, the drift reference
    pub reference_scores: ScoreHistogram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub feature_schema_version: u32,
    pub validation_metrics: ValidationMetrics,
    pub reference_scores: ScoreHistogram,
    pub parameters: ModelParameters,
    /// SHA-256 of the serialized parameters
    pub checksum: String,
}

/// Artifact metadata without parameters, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub version: u64,
    pub active: bool,
    pub algorithm: Algorithm,
    pub trained_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub feature_schema_version: u32,
    pub validation_metrics: ValidationMetrics,
    pub checksum: String,
}

fn parameters_checksum(parameters: &ModelParameters) -> String {
    let bytes = serde_json::to_vec(parameters).unwrap_or_default();
    Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl ModelArtifact {
    pub fn from_candidate(version: u64, candidate: CandidateModel, report: &ValidationReport) -> Self {
        let checksum = parameters_checksum(&candidate.parameters);
        Self {
            version,
            trained_at: candidate.trained_at,
            published_at: Utc::now(),
            feature_schema_version: candidate.feature_schema_version,
            validation_metrics: report.metrics.clone(),
            reference_scores: report.reference_scores.clone(),
            parameters: candidate.parameters,
            checksum,
        }
    }

    pub fn verify_checksum(&self) -> bool {
        parameters_checksum(&self.parameters) == self.checksum
    }

    pub fn summary(&self, active: bool) -> ArtifactSummary {
        ArtifactSummary {
            version: self.version,
            active,
            algorithm: self.parameters.metadata().algorithm,
            trained_at: self.trained_at,
            published_at: self.published_at,
            feature_schema_version: self.feature_schema_version,
            validation_metrics: self.validation_metrics.clone(),
            checksum: self.checksum.clone(),
        }
    }
}
