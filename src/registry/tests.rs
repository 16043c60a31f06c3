use super::*;
use crate::config::QualityGateConfig;
use crate::drift::ScoreHistogram;
use crate::features::{schema, FeatureVector, CURRENT_SCHEMA_VERSION};
use crate::model::{LogisticModel, ModelParameters, ValidationMetrics};
use chrono::Utc;

fn report(auc: f64) -> ValidationReport {
    ValidationReport {
        metrics: ValidationMetrics {
            precision: 0.7,
            recall: 0.8,
            auc,
            threshold: 0.5,
            positives: 12,
            negatives: 88,
        },
        train_examples: 400,
        validation_examples: 100,
        validation_start: Some(Utc::now()),
        reference_scores: ScoreHistogram::from_scores(&[0.05, 0.1, 0.2, 0.85], 10),
    }
}

fn candidate(bias: f64) -> CandidateModel {
    let n = schema(CURRENT_SCHEMA_VERSION).map(|s| s.len()).unwrap_or(0);
    CandidateModel {
        trained_at: Utc::now(),
        feature_schema_version: CURRENT_SCHEMA_VERSION,
        parameters: ModelParameters::Logistic(LogisticModel::from_coefficients(
            CURRENT_SCHEMA_VERSION,
            vec![0.0; n],
            bias,
        )),
    }
}

fn registry(max_retained: usize) -> ModelRegistry {
    ModelRegistry::new(QualityGate::new(QualityGateConfig::default()), max_retained)
}

fn publish_n(registry: &ModelRegistry, n: usize) {
    for i in 0..n {
        registry.publish(candidate(i as f64 * 0.1), &report(0.9)).unwrap();
    }
}

#[test]
fn no_active_model_before_first_publish() {
    let r = registry(3);
    assert!(matches!(r.get_active(), Err(RegistryError::NoActiveModel)));
    assert_eq!(r.active_version(), None);
    assert!(r.artifacts().is_empty());
}

#[test]
fn publish_activates_with_increasing_versions() {
    let r = registry(5);
    publish_n(&r, 2);
    let active = r.get_active().unwrap();
    assert_eq!(active.version(), 2);
    assert_eq!(active.artifact.feature_schema_version, CURRENT_SCHEMA_VERSION);
    assert!(active.artifact.verify_checksum());
    let zeros = FeatureVector {
        schema_version: CURRENT_SCHEMA_VERSION,
        transaction_id: "t".into(),
        values: vec![0.0; active.model.metadata().feature_count],
    };
    let p = active.model.predict(&zeros).unwrap();
    assert!((0.0..=1.0).contains(&p));
}

#[test]
fn low_auc_candidate_is_rejected_and_active_unchanged() {
    let r = registry(10);
    publish_n(&r, 4);
    match r.publish(candidate(1.0), &report(0.60)) {
        Err(RegistryError::ValidationRejected { reasons }) => {
            assert_eq!(reasons.len(), 1);
            assert!(reasons[0].contains("auc"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(r.get_active().unwrap().version(), 4);
    // rejected candidates do not consume a version
    let next = r.publish(candidate(1.0), &report(0.9)).unwrap();
    assert_eq!(next.version, 5);
}

#[test]
fn rejection_lists_every_failed_check() {
    let r = registry(3);
    let mut bad = report(0.5);
    bad.metrics.recall = 0.1;
    bad.metrics.positives = 0;
    let mut mislabeled = candidate(0.0);
    mislabeled.feature_schema_version = 1;
    match r.publish(mislabeled, &bad) {
        Err(RegistryError::ValidationRejected { reasons }) => assert_eq!(reasons.len(), 4),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn rollback_reactivates_retained_version() {
    let r = registry(10);
    publish_n(&r, 6);
    assert_eq!(r.get_active().unwrap().version(), 6);
    let artifact = r.rollback(5).unwrap();
    assert_eq!(artifact.version, 5);
    assert_eq!(r.get_active().unwrap().version(), 5);
    let active: Vec<u64> = r.summaries().iter().filter(|s| s.active).map(|s| s.version).collect();
    assert_eq!(active, vec![5]);
}

#[test]
fn pruned_versions_cannot_be_rolled_back() {
    let r = registry(3);
    publish_n(&r, 5);
    let versions: Vec<u64> = r.artifacts().iter().map(|a| a.version).collect();
    assert_eq!(versions, vec![3, 4, 5]);
    assert!(matches!(r.rollback(1), Err(RegistryError::VersionNotFound(1))));
    assert!(matches!(r.rollback(42), Err(RegistryError::VersionNotFound(42))));
}

#[test]
fn retention_counts_from_the_newly_activated_version() {
    let r = registry(2);
    publish_n(&r, 3);
    r.rollback(2).unwrap();
    // v4 becomes active and only the newest other artifact is kept
    r.publish(candidate(0.0), &report(0.9)).unwrap();
    let versions: Vec<u64> = r.artifacts().iter().map(|a| a.version).collect();
    assert_eq!(versions, vec![3, 4]);
}

#[test]
fn concurrent_readers_always_see_a_complete_model() {
    let r = Arc::new(registry(4));
    publish_n(&r, 1);
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let r = r.clone();
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let active = r.get_active().unwrap();
                    assert_eq!(active.artifact.version, active.version());
                    assert!(active.artifact.verify_checksum());
                }
            })
        })
        .collect();
    publish_n(&r, 10);
    for h in readers {
        h.join().unwrap();
    }
    assert_eq!(r.active_version(), Some(11));
}

#[test]
fn swap_does_not_wait_for_outstanding_readers() {
    let r = registry(4);
    publish_n(&r, 1);
    let held = r.active.load();
    publish_n(&r, 1);
    assert_eq!(Option::as_ref(&*held).map(|a| a.version()), Some(1));
    assert_eq!(r.get_active().unwrap().version(), 2);
    drop(held);

    // readers never touch the writer lock
    let _writer = r.writer.lock();
    assert_eq!(r.active_version(), Some(2));
}

#[test]
fn persisted_registry_restores_active_and_versions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");
    {
        let store = Arc::new(AuditStore::open(&path, b"test-secret").unwrap());
        let r = ModelRegistry::open(QualityGate::new(QualityGateConfig::default()), 3, store).unwrap();
        publish_n(&r, 4);
        r.rollback(3).unwrap();
    }
    let store = Arc::new(AuditStore::open(&path, b"test-secret").unwrap());
    let r = ModelRegistry::open(QualityGate::new(QualityGateConfig::default()), 3, store).unwrap();
    assert_eq!(r.active_version(), Some(3));
    let versions: Vec<u64> = r.artifacts().iter().map(|a| a.version).collect();
    assert_eq!(versions, vec![2, 3, 4]);
    assert_eq!(r.publish(candidate(0.0), &report(0.9)).unwrap().version, 5);
}
