//! Model registry: versioned artifacts plus a single active pointer.

mod artifact;
mod gate;

pub use artifact::{ArtifactSummary, CandidateModel, ModelArtifact, ValidationReport};
pub use gate::QualityGate;

use crate::error::RegistryError;
use crate::model::ScoringModel;
use crate::storage::{AuditStore, RegistryChange};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// The activated artifact together with its instantiated scorer.
#[derive(Clone)]
pub struct ActiveModel {
    pub artifact: Arc<ModelArtifact>,
    pub model: Arc<dyn ScoringModel>,
}

impl ActiveModel {
    fn load(artifact: Arc<ModelArtifact>) -> Self {
        let model = artifact.parameters.to_model();
        Self { artifact, model }
    }

    pub fn version(&self) -> u64 {
        self.artifact.version
    }
}

impl std::fmt::Debug for ActiveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveModel")
            .field("version", &self.artifact.version)
            .field("schema", &self.artifact.feature_schema_version)
            .finish()
    }
}

struct Inventory {
    artifacts: BTreeMap<u64, Arc<ModelArtifact>>,
    next_version: u64,
}

/// Publishing and rollback are serialized on `writer`. The replacement `ActiveModel` is
/// fully built before it is stored; readers load `active` without taking a lock.
pub struct ModelRegistry {
    gate: QualityGate,
    max_retained: usize,
    store: Option<Arc<AuditStore>>,
    writer: Mutex<Inventory>,
    active: ArcSwapOption<ActiveModel>,
}

impl ModelRegistry {
    /// Registry without persistence.
    pub fn new(gate: QualityGate, max_retained: usize) -> Self {
        Self {
            gate,
            max_retained: max_retained.max(1),
            store: None,
            writer: Mutex::new(Inventory {
                artifacts: BTreeMap::new(),
                next_version: 1,
            }),
            active: ArcSwapOption::empty(),
        }
    }

    /// Registry backed by the audit store; restores retained artifacts and the active pointer.
    pub fn open(gate: QualityGate, max_retained: usize, store: Arc<AuditStore>) -> Result<Self, RegistryError> {
        let mut artifacts = BTreeMap::new();
        for artifact in store.load_artifacts()? {
            if !artifact.verify_checksum() {
                return Err(RegistryError::ChecksumMismatch {
                    version: artifact.version,
                });
            }
            artifacts.insert(artifact.version, Arc::new(artifact));
        }
        let state = store.registry_state()?;
        let next_version = artifacts
            .keys()
            .next_back()
            .map(|v| v + 1)
            .unwrap_or(1)
            .max(state.next_version.unwrap_or(1));

        let active = match state.active_version {
            Some(v) => match artifacts.get(&v) {
                Some(a) => Some(ActiveModel::load(a.clone())),
                None => {
                    warn!(version = v, "stored active version has no retained artifact");
                    None
                }
            },
            None => None,
        };
        info!(
            retained = artifacts.len(),
            active = ?active.as_ref().map(ActiveModel::version),
            next_version,
            "model registry restored"
        );

        Ok(Self {
            gate,
            max_retained: max_retained.max(1),
            store: Some(store),
            writer: Mutex::new(Inventory {
                artifacts,
                next_version,
            }),
            active: ArcSwapOption::new(active.map(Arc::new)),
        })
    }

    /// Last successfully activated model.
    pub fn get_active(&self) -> Result<ActiveModel, RegistryError> {
        self.active
            .load_full()
            .map(|active| ActiveModel::clone(&active))
            .ok_or(RegistryError::NoActiveModel)
    }

    pub fn active_version(&self) -> Option<u64> {
        self.active.load_full().map(|active| active.version())
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    /// Activate `candidate` if its validation report passes the quality gate.
    ///
    /// Rejected candidates consume no version and leave the active model untouched.
    pub fn publish(
        &self,
        candidate: CandidateModel,
        report: &ValidationReport,
    ) -> Result<Arc<ModelArtifact>, RegistryError> {
        let reasons = self.gate.evaluate(&candidate, report);
        if !reasons.is_empty() {
            warn!(
                auc = report.metrics.auc,
                recall = report.metrics.recall,
                reasons = ?reasons,
                "candidate model rejected"
            );
            return Err(RegistryError::ValidationRejected { reasons });
        }

        let mut inventory = self.writer.lock();
        let version = inventory.next_version;
        let artifact = Arc::new(ModelArtifact::from_candidate(version, candidate, report));
        let replacement = ActiveModel::load(artifact.clone());
        let pruned = self.prune_plan(&inventory, version);

        if let Some(store) = &self.store {
            store.apply_registry_change(&RegistryChange {
                insert: Some(&artifact),
                active_version: version,
                next_version: version + 1,
                remove: &pruned,
            })?;
        }

        inventory.next_version = version + 1;
        inventory.artifacts.insert(version, artifact.clone());
        for v in &pruned {
            inventory.artifacts.remove(v);
        }
        self.active.store(Some(Arc::new(replacement)));

        info!(
            version,
            schema = artifact.feature_schema_version,
            auc = artifact.validation_metrics.auc,
            recall = artifact.validation_metrics.recall,
            precision = artifact.validation_metrics.precision,
            pruned = ?pruned,
            "model published and activated"
        );
        Ok(artifact)
    }

    /// Reactivate a retained artifact.
    pub fn rollback(&self, version: u64) -> Result<Arc<ModelArtifact>, RegistryError> {
        let inventory = self.writer.lock();
        let artifact = inventory
            .artifacts
            .get(&version)
            .cloned()
            .ok_or(RegistryError::VersionNotFound(version))?;
        let replacement = ActiveModel::load(artifact.clone());

        if let Some(store) = &self.store {
            store.apply_registry_change(&RegistryChange {
                insert: None,
                active_version: version,
                next_version: inventory.next_version,
                remove: &[],
            })?;
        }
        let previous = self.active.swap(Some(Arc::new(replacement))).map(|a| a.version());
        info!(version, previous = ?previous, "model rolled back");
        Ok(artifact)
    }

    /// Retained artifacts, oldest first.
    pub fn artifacts(&self) -> Vec<Arc<ModelArtifact>> {
        self.writer.lock().artifacts.values().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<ArtifactSummary> {
        let active = self.active_version();
        self.artifacts()
            .iter()
            .map(|a| a.summary(active == Some(a.version)))
            .collect()
    }

    /// Versions dropped once `new_active` is activated: everything but the active
    /// artifact and the newest `max_retained - 1` others.
    fn prune_plan(&self, inventory: &Inventory, new_active: u64) -> Vec<u64> {
        inventory
            .artifacts
            .keys()
            .rev()
            .filter(|v| **v != new_active)
            .skip(self.max_retained - 1)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests;
