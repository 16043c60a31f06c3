//! Integration test: config load, training into a persisted registry, scoring with audit,
//! rollback, drift and encrypted failure records.

mod common;

use chrono::{Duration, Utc};
use fraud_sentinel::{
    config::{QualityGateConfig, ServiceConfig},
    drift::{DriftMonitor, DriftStatus},
    error::{ModelError, RegistryError, StorageError},
    features::{FeatureExtractor, FeatureVector},
    registry::{ModelRegistry, QualityGate},
    scoring::{Decision, DecisionPolicy, ScoreOutcome, ScoringErrorKind, ScoringService},
    storage::AuditStore,
    training::{CancelToken, PipelineOutcome, TrainingPipeline},
    transactions::{AuthSignals, Channel, HistoryWindow, InMemoryHistory, Transaction},
};
use std::path::Path;
use std::sync::Arc;

fn open_store(dir: &Path) -> Arc<AuditStore> {
    Arc::new(AuditStore::open(&dir.join("audit.db"), b"integration-secret").unwrap())
}

fn open_registry(config: &ServiceConfig, store: Arc<AuditStore>) -> Arc<ModelRegistry> {
    let gate = QualityGate::new(config.quality_gate.clone());
    Arc::new(ModelRegistry::open(gate, config.registry.max_retained, store).unwrap())
}

fn service(
    config: &ServiceConfig,
    registry: Arc<ModelRegistry>,
    history: Arc<InMemoryHistory>,
    store: Arc<AuditStore>,
) -> ScoringService {
    ScoringService::new(
        registry,
        history,
        store,
        FeatureExtractor::new(HistoryWindow::from(&config.history)),
        DecisionPolicy::new(config.scoring.clone()),
    )
}

#[test]
fn config_load_default() {
    let c = ServiceConfig::load(Path::new("nonexistent.json")).unwrap();
    assert_eq!(c.scoring.decision_threshold, 0.5);
    assert_eq!(c.quality_gate.min_auc, 0.75);
    assert_eq!(c.history.max_transactions, 50);
    assert!(!c.scoring.fail_open);
}

#[test]
fn config_rejects_out_of_range_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"scoring": {"decision_threshold": 1.5}}"#).unwrap();
    assert!(ServiceConfig::load(&path).is_err());
}

#[test]
fn train_publish_score_and_audit() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::default();
    let store = open_store(dir.path());
    let registry = open_registry(&config, store.clone());

    let (txs, labels) = common::export(400);
    let pipeline = TrainingPipeline::new(&config, registry.clone());
    let version = match pipeline.run(&txs, &labels, &CancelToken::new()).unwrap() {
        PipelineOutcome::Published { artifact, report } => {
            assert!(report.metrics.auc >= config.quality_gate.min_auc);
            assert_eq!(report.validation_examples, 80);
            artifact.version
        }
        PipelineOutcome::Rejected { reasons, .. } => panic!("rejected: {reasons:?}"),
    };
    assert_eq!(version, 1);

    let history = Arc::new(InMemoryHistory::from(&config.history));
    history.extend(&txs);
    let svc = service(&config, registry, history, store.clone());

    let ts = common::start() + Duration::days(20);
    let legit = Transaction::new("live-1", "acct-3", 42.0, ts, "grocery", Channel::CardPresent)
        .with_geolocation(44.97, -93.26);
    let fraud = Transaction::new("live-2", "acct-3", 3900.0, ts, "money_transfer", Channel::Online)
        .with_signals(AuthSignals {
            failed_login_attempts: 1,
            new_beneficiary: true,
        });

    let legit_outcome = svc.score(&legit);
    let fraud_outcome = svc.score(&fraud);
    let (pl, pf) = (
        legit_outcome.fraud_probability().unwrap(),
        fraud_outcome.fraud_probability().unwrap(),
    );
    assert!((0.0..=1.0).contains(&pl) && (0.0..=1.0).contains(&pf));
    assert!(pf > pl, "fraud {pf} should outrank legit {pl}");
    assert_eq!(legit_outcome.decision(), Decision::Allow);
    assert_eq!(fraud_outcome.decision(), Decision::Flag);

    let stored = store.scores_for_transaction("live-2").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].model_version, 1);
    assert_eq!(stored[0].decision, Decision::Flag);
    // allow decisions are audited as well
    assert_eq!(store.scores_for_transaction("live-1").unwrap().len(), 1);
}

#[test]
fn large_online_purchase_without_history_is_flagged() {
    let config = ServiceConfig::default();
    let registry = Arc::new(ModelRegistry::new(QualityGate::new(config.quality_gate.clone()), 5));
    registry
        .publish(common::constant_candidate(0.82), &common::passing_report())
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path());
    let svc = service(&config, registry, Arc::new(InMemoryHistory::from(&config.history)), store);

    let tx = Transaction::new("tx-5000", "new-member", 5000.0, Utc::now(), "electronics", Channel::Online);
    match svc.score(&tx) {
        ScoreOutcome::Scored(result) => {
            assert!((result.fraud_probability - 0.82).abs() < 1e-9);
            assert_eq!(result.decision, Decision::Flag);
        }
        ScoreOutcome::Failed(f) => panic!("scoring failed: {}", f.message),
    }
}

#[test]
fn rescoring_without_registry_change_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::default();
    let store = open_store(dir.path());
    let registry = open_registry(&config, store.clone());
    let (txs, labels) = common::export(300);
    TrainingPipeline::new(&config, registry.clone())
        .run(&txs, &labels, &CancelToken::new())
        .unwrap();

    let history = Arc::new(InMemoryHistory::from(&config.history));
    history.extend(&txs);
    let svc = service(&config, registry, history.clone(), store);
    let tx = txs[250].clone();
    let first = svc.score(&tx);
    let second = svc.score(&tx);
    assert_eq!(first.fraud_probability(), second.fraud_probability());
    assert_eq!(first.decision(), second.decision());
}

#[test]
fn rescoring_after_recording_into_a_full_window_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.history.max_transactions = 3;
    let store = open_store(dir.path());
    let registry = open_registry(&config, store.clone());
    let (txs, labels) = common::export(300);
    let outcome = TrainingPipeline::new(&config, registry.clone())
        .run(&txs, &labels, &CancelToken::new())
        .unwrap();
    assert!(matches!(outcome, PipelineOutcome::Published { .. }));

    let history = Arc::new(InMemoryHistory::from(&config.history));
    history.extend(&txs);
    // newest entry plus its three predecessors
    assert_eq!(history.account_len("acct-3"), 4);
    let svc = service(&config, registry, history.clone(), store);

    // scored then recorded, as the scoring endpoint does
    let tx = Transaction::new("live-9", "acct-3", 640.0, common::start() + Duration::days(20), "electronics", Channel::Online);
    let first = svc.score(&tx);
    history.record(&tx);
    let second = svc.score(&tx);
    assert!(first.fraud_probability().is_some());
    assert_eq!(first.fraud_probability(), second.fraud_probability());
    assert_eq!(first.decision(), second.decision());
}

#[test]
fn rejected_retrain_keeps_previous_model_and_rollback_restores() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::default();
    let store = open_store(dir.path());
    let registry = open_registry(&config, store.clone());
    for p in [0.1, 0.2, 0.3, 0.4, 0.5, 0.6] {
        registry
            .publish(common::constant_candidate(p), &common::passing_report())
            .unwrap();
    }
    assert_eq!(registry.get_active().unwrap().version(), 6);

    let mut weak = common::passing_report();
    weak.metrics.auc = 0.60;
    let err = registry.publish(common::constant_candidate(0.9), &weak).unwrap_err();
    assert!(matches!(err, RegistryError::ValidationRejected { .. }));
    assert_eq!(registry.get_active().unwrap().version(), 6);

    registry.rollback(5).unwrap();
    assert_eq!(registry.get_active().unwrap().version(), 5);

    // pointer survives a restart
    drop(registry);
    let reopened = open_registry(&config, store);
    assert_eq!(reopened.active_version(), Some(5));
}

#[test]
fn mismatched_feature_vector_is_refused_by_the_model() {
    let candidate = common::constant_candidate(0.5);
    let model = candidate.parameters.to_model();
    let v1 = FeatureVector {
        schema_version: 1,
        transaction_id: "t".into(),
        values: vec![0.0; 18],
    };
    assert!(matches!(
        model.predict(&v1),
        Err(ModelError::FeatureSchemaMismatch { .. })
    ));
}

#[test]
fn failures_are_encrypted_at_rest() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::default();
    let store = open_store(dir.path());
    // empty registry: every call fails closed
    let registry = Arc::new(ModelRegistry::new(QualityGate::new(QualityGateConfig::default()), 3));
    let svc = service(&config, registry, Arc::new(InMemoryHistory::from(&config.history)), store.clone());

    let tx = Transaction::new("tx-secret", "acct-plaintext-marker", 75.0, Utc::now(), "grocery", Channel::Atm);
    let outcome = svc.score(&tx);
    assert_eq!(outcome.decision(), Decision::Review);

    let failures = store.recent_failures(10).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ScoringErrorKind::NoActiveModel);
    assert_eq!(failures[0].transaction, tx);
    assert_eq!(store.score_count().unwrap(), 0);

    let raw = rusqlite::Connection::open(dir.path().join("audit.db")).unwrap();
    let payload: String = raw
        .query_row("SELECT payload_enc FROM scoring_failures", [], |row| row.get(0))
        .unwrap();
    assert!(!payload.contains("acct-plaintext-marker"));

    let wrong_key = AuditStore::open(&dir.path().join("audit.db"), b"other-secret").unwrap();
    assert!(matches!(wrong_key.recent_failures(10), Err(StorageError::Crypto)));
}

#[test]
fn drift_report_from_audited_scores() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServiceConfig::default();
    config.drift.min_samples = 20;
    let store = open_store(dir.path());
    let registry = open_registry(&config, store.clone());
    registry
        .publish(common::constant_candidate(0.95), &common::passing_report())
        .unwrap();
    let svc = service(&config, registry.clone(), Arc::new(InMemoryHistory::from(&config.history)), store.clone());
    for i in 0..30 {
        let tx = Transaction::new(format!("d-{i}"), "acct", 10.0, Utc::now(), "grocery", Channel::Mobile);
        svc.score(&tx);
    }

    let monitor = DriftMonitor::new(config.drift.clone());
    let active = registry.get_active().unwrap();
    let recent = store.recent_probabilities(active.version(), monitor.window()).unwrap();
    assert_eq!(recent.len(), 30);
    let report = monitor.assess(&active.artifact, &recent);
    // every production score lands in the top bin, far from the validation reference
    assert_eq!(report.status, DriftStatus::Significant);
}

#[test]
fn prune_removes_old_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig::default();
    let store = open_store(dir.path());
    let registry = Arc::new(ModelRegistry::new(QualityGate::new(QualityGateConfig::default()), 3));
    registry
        .publish(common::constant_candidate(0.2), &common::passing_report())
        .unwrap();
    let svc = service(&config, registry, Arc::new(InMemoryHistory::from(&config.history)), store.clone());
    let tx = Transaction::new("p-1", "acct", 10.0, Utc::now(), "grocery", Channel::Mobile);
    svc.score(&tx);
    assert_eq!(store.score_count().unwrap(), 1);
    assert_eq!(store.prune_before(Utc::now() - Duration::days(1)).unwrap(), 0);
    assert_eq!(store.prune_before(Utc::now() + Duration::seconds(1)).unwrap(), 1);
    assert_eq!(store.score_count().unwrap(), 0);
}
