//! Fraud Sentinel entrypoint: scoring API, offline training and registry operations.

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use fraud_sentinel::{
    alerts::{AlertSink, LogAlerts, WebhookAlerter},
    api::{self, handlers::ScoreResponse, AppState},
    drift::DriftMonitor,
    features::FeatureExtractor,
    logging::StructuredLogger,
    registry::{ModelRegistry, QualityGate},
    scoring::{DecisionPolicy, ScoringService},
    storage::AuditStore,
    training::{CancelToken, PipelineOutcome, TrainingPipeline},
    transactions::{read_labels, read_transactions, HistoryWindow, InMemoryHistory},
    ServiceConfig,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const STORE_SECRET_ENV: &str = "FRAUD_SENTINEL_STORE_SECRET";

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, env = "FRAUD_SENTINEL_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scoring API
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Train a candidate from a labeled export and publish it if it passes the quality gate
    Train {
        /// Transactions, one JSON object per line
        #[arg(long)]
        transactions: PathBuf,
        /// Labels, one JSON object per line
        #[arg(long)]
        labels: PathBuf,
        /// Evaluate only; do not submit to the registry
        #[arg(long)]
        dry_run: bool,
    },
    /// Score a JSON-lines file of transactions against the active model
    Score {
        #[arg(long)]
        transactions: PathBuf,
    },
    /// List retained model artifacts
    Models,
    /// Reactivate a retained model version
    Rollback { version: u64 },
    /// Report score drift of the active model
    Drift,
    /// Delete score and failure records older than the given age
    Prune {
        #[arg(long, default_value_t = 90)]
        older_than_days: i64,
    },
}

fn open_store(config: &ServiceConfig) -> Result<Arc<AuditStore>, BoxError> {
    let secret = std::env::var(STORE_SECRET_ENV).map_err(|_| format!("{STORE_SECRET_ENV} is not set"))?;
    std::fs::create_dir_all(&config.data_dir)?;
    Ok(Arc::new(AuditStore::open(&config.store_path(), secret.as_bytes())?))
}

fn open_registry(config: &ServiceConfig, store: Arc<AuditStore>) -> Result<Arc<ModelRegistry>, BoxError> {
    let gate = QualityGate::new(config.quality_gate.clone());
    Ok(Arc::new(ModelRegistry::open(gate, config.registry.max_retained, store)?))
}

fn emit(record: &impl serde::Serialize) -> Result<(), BoxError> {
    let stdout = std::io::stdout();
    StructuredLogger::emit_json(record, &mut stdout.lock())?;
    Ok(())
}

fn alert_sink(config: &ServiceConfig) -> Result<Arc<dyn AlertSink>, BoxError> {
    let sink: Arc<dyn AlertSink> = match config.alerts.webhook_url {
        Some(_) => Arc::new(WebhookAlerter::spawn(&config.alerts)?),
        None => Arc::new(LogAlerts::new(config.alerts.min_severity)),
    };
    Ok(sink)
}

fn scoring_service(
    config: &ServiceConfig,
    registry: Arc<ModelRegistry>,
    history: Arc<InMemoryHistory>,
    store: Arc<AuditStore>,
) -> Result<ScoringService, BoxError> {
    let service = ScoringService::new(
        registry,
        history,
        store,
        FeatureExtractor::new(HistoryWindow::from(&config.history)),
        DecisionPolicy::new(config.scoring.clone()),
    );
    Ok(service.with_alerts(alert_sink(config)?))
}

fn serve(config: &ServiceConfig, bind: Option<String>) -> Result<(), BoxError> {
    let store = open_store(config)?;
    let registry = open_registry(config, store.clone())?;
    // nothing to score with; refuse to start rather than review every transaction
    let active = registry.get_active()?;
    info!(version = active.version(), "active model loaded");

    let history = Arc::new(InMemoryHistory::from(&config.history));
    let state = AppState {
        scoring: Arc::new(scoring_service(config, registry.clone(), history.clone(), store.clone())?),
        registry,
        store,
        history,
        drift: Arc::new(DriftMonitor::new(config.drift.clone())),
    };
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for shutdown signal");
            }
            info!("shutting down");
        };
        api::serve(state, &bind, shutdown).await
    })?;
    Ok(())
}

fn train(config: &ServiceConfig, transactions: PathBuf, labels: PathBuf, dry_run: bool) -> Result<(), BoxError> {
    let store = open_store(config)?;
    let registry = open_registry(config, store)?;
    let txs = read_transactions(&transactions)?;
    let labels = read_labels(&labels)?;
    info!(transactions = txs.len(), labels = labels.len(), "training export loaded");

    let cancel = CancelToken::new();
    let handle = cancel.clone();
    ctrlc::set_handler(move || handle.cancel())?;

    let pipeline = TrainingPipeline::new(config, registry);
    if dry_run {
        let run = pipeline.train(&txs, &labels, &cancel)?;
        emit(&json!({
            "status": "evaluated",
            "algorithm": run.candidate.parameters.metadata().algorithm,
            "feature_schema_version": run.candidate.feature_schema_version,
            "report": run.report,
        }))?;
        return Ok(());
    }
    match pipeline.run(&txs, &labels, &cancel)? {
        PipelineOutcome::Published { artifact, report } => emit(&json!({
            "status": "published",
            "version": artifact.version,
            "report": report,
        })),
        PipelineOutcome::Rejected { reasons, report } => emit(&json!({
            "status": "rejected",
            "reasons": reasons,
            "report": report,
        })),
    }
}

fn score_batch(config: &ServiceConfig, transactions: PathBuf) -> Result<(), BoxError> {
    let store = open_store(config)?;
    let registry = open_registry(config, store.clone())?;
    let mut txs = read_transactions(&transactions)?;
    txs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let history = Arc::new(InMemoryHistory::from(&config.history));
    let service = scoring_service(config, registry, history.clone(), store)?;
    for tx in &txs {
        let outcome = service.score(tx);
        if tx.validate().is_ok() {
            history.record(tx);
        }
        emit(&ScoreResponse::from(&outcome))?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let config = ServiceConfig::load(&cli.config)?;
    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %cli.config.display(), data_dir = ?config.data_dir, "fraud sentinel starting");

    match cli.command {
        Commands::Serve { bind } => serve(&config, bind),
        Commands::Train {
            transactions,
            labels,
            dry_run,
        } => train(&config, transactions, labels, dry_run),
        Commands::Score { transactions } => score_batch(&config, transactions),
        Commands::Models => {
            let registry = open_registry(&config, open_store(&config)?)?;
            for summary in registry.summaries() {
                emit(&summary)?;
            }
            Ok(())
        }
        Commands::Rollback { version } => {
            let registry = open_registry(&config, open_store(&config)?)?;
            let artifact = registry.rollback(version)?;
            emit(&artifact.summary(true))
        }
        Commands::Drift => {
            let store = open_store(&config)?;
            let registry = open_registry(&config, store.clone())?;
            let active = registry.get_active()?;
            let monitor = DriftMonitor::new(config.drift.clone());
            let recent = store.recent_probabilities(active.version(), monitor.window())?;
            emit(&monitor.assess(&active.artifact, &recent))
        }
        Commands::Prune { older_than_days } => {
            let store = open_store(&config)?;
            let cutoff = Utc::now() - Duration::days(older_than_days.max(0));
            let removed = store.prune_before(cutoff)?;
            info!(removed, cutoff = %cutoff, "audit records pruned");
            emit(&json!({ "removed": removed, "cutoff": cutoff }))
        }
    }
}

fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    run(cli).map_err(|e| {
        error!(error = %e, "command failed");
        e
    })
}
