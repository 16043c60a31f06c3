//! Score-distribution drift: population stability index between the scores an artifact
//! produced on its validation slice and the scores it is producing in production.

use crate::config::DriftConfig;
use crate::registry::ModelArtifact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Floor for empty bins so the log term stays finite
const MIN_PROPORTION: f64 = 1e-4;

/// Share of scores per equal-width bin over [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    pub proportions: Vec<f64>,
    pub samples: usize,
}

impl ScoreHistogram {
    pub fn from_scores(scores: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let mut counts = vec![0usize; bins];
        for s in scores.iter().filter(|s| s.is_finite()) {
            let idx = ((s.clamp(0.0, 1.0) * bins as f64) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        let samples: usize = counts.iter().sum();
        let proportions = counts
            .iter()
            .map(|&c| if samples == 0 { 0.0 } else { c as f64 / samples as f64 })
            .collect();
        Self { proportions, samples }
    }

    pub fn bins(&self) -> usize {
        self.proportions.len()
    }
}

/// PSI = Σ (actual − expected) · ln(actual / expected)
pub fn population_stability_index(expected: &ScoreHistogram, actual: &ScoreHistogram) -> f64 {
    expected
        .proportions
        .iter()
        .zip(&actual.proportions)
        .map(|(&e, &a)| {
            let (e, a) = (e.max(MIN_PROPORTION), a.max(MIN_PROPORTION));
            (a - e) * (a / e).ln()
        })
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    InsufficientData,
    Stable,
    Moderate,
    Significant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub model_version: u64,
    pub psi: Option<f64>,
    pub status: DriftStatus,
    pub samples: usize,
    pub reference_samples: usize,
    pub assessed_at: DateTime<Utc>,
}

pub struct DriftMonitor {
    config: DriftConfig,
}

impl DriftMonitor {
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    /// How many recent production scores an assessment should be given.
    pub fn window(&self) -> usize {
        self.config.window
    }

    /// Compare recent production scores against the artifact's validation reference.
    pub fn assess(&self, artifact: &ModelArtifact, recent_scores: &[f64]) -> DriftReport {
        let reference = &artifact.reference_scores;
        let mut report = DriftReport {
            model_version: artifact.version,
            psi: None,
            status: DriftStatus::InsufficientData,
            samples: recent_scores.len(),
            reference_samples: reference.samples,
            assessed_at: Utc::now(),
        };
        if recent_scores.len() < self.config.min_samples || reference.samples == 0 {
            return report;
        }

        let actual = ScoreHistogram::from_scores(recent_scores, reference.bins());
        let psi = population_stability_index(reference, &actual);
        report.psi = Some(psi);
        report.status = if psi >= self.config.significant_psi {
            DriftStatus::Significant
        } else if psi >= self.config.moderate_psi {
            DriftStatus::Moderate
        } else {
            DriftStatus::Stable
        };
        if report.status == DriftStatus::Significant {
            warn!(
                model_version = artifact.version,
                psi,
                samples = report.samples,
                "score distribution drifted; retraining recommended"
            );
        }
        report
    }
}
