//! Service configuration. Loaded from a JSON file; every section falls back to defaults.

use crate::alerts::AlertSeverity;
use crate::error::ConfigError;
use crate::features::CURRENT_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest accepted history look-back (ten years).
pub const MAX_HISTORY_AGE_SECS: i64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Data directory (audit store)
    pub data_dir: PathBuf,
    /// Decision policy applied to model output
    pub scoring: ScoringConfig,
    /// Minimum validation metrics before a candidate may become active
    pub quality_gate: QualityGateConfig,
    /// Account history window used for features
    pub history: HistoryConfig,
    /// Offline training job parameters
    pub training: TrainingConfig,
    pub registry: RegistryConfig,
    /// Score distribution drift thresholds
    pub drift: DriftConfig,
    pub server: ServerConfig,
    /// Fraud alert delivery
    pub alerts: AlertsConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Probability at or above which a transaction is flagged (0.0–1.0)
    pub decision_threshold: f64,
    /// Allow (instead of review) transactions whose scoring failed
    pub fail_open: bool,
    /// Flag any transaction that trips a rule signal regardless of probability
    pub escalate_rule_hits: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    pub min_auc: f64,
    pub min_recall: f64,
    pub min_precision: f64,
    /// Fraud examples required in the held-out slice
    pub min_validation_positives: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Most recent transactions considered per account
    pub max_transactions: usize,
    /// Oldest transaction considered, relative to the scored one (seconds)
    pub max_age_secs: i64,
    /// Accounts kept by the in-process history
    pub max_accounts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Logistic,
    BoostedStumps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    /// Weight fraud examples by the negative/positive ratio
    Balanced,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub algorithm: Algorithm,
    pub feature_schema_version: u32,
    /// Newest share of labeled examples held out for validation
    pub validation_fraction: f64,
    pub min_examples: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub boosting_rounds: usize,
    pub class_weighting: ClassWeighting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Artifacts kept for rollback, including the active one
    pub max_retained: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub bins: usize,
    /// Production scores needed before drift is assessed
    pub min_samples: usize,
    /// Most recent production scores compared against the reference
    pub window: usize,
    pub moderate_psi: f64,
    pub significant_psi: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// POST alerts here as JSON; when unset alerts are only logged
    pub webhook_url: Option<String>,
    pub min_severity: AlertSeverity,
    /// Alerts waiting for delivery before new ones are dropped
    pub queue_capacity: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".fraud-sentinel"),
            scoring: ScoringConfig::default(),
            quality_gate: QualityGateConfig::default(),
            history: HistoryConfig::default(),
            training: TrainingConfig::default(),
            registry: RegistryConfig::default(),
            drift: DriftConfig::default(),
            server: ServerConfig::default(),
            alerts: AlertsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
            fail_open: false,
            escalate_rule_hits: false,
        }
    }
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_auc: 0.75,
            min_recall: 0.5,
            min_precision: 0.0,
            min_validation_positives: 1,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_transactions: 50,
            max_age_secs: 30 * 24 * 3600,
            max_accounts: 100_000,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Logistic,
            feature_schema_version: CURRENT_SCHEMA_VERSION,
            validation_fraction: 0.2,
            min_examples: 20,
            learning_rate: 0.1,
            epochs: 300,
            l2: 0.001,
            boosting_rounds: 50,
            class_weighting: ClassWeighting::Balanced,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_retained: 10 }
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            min_samples: 100,
            window: 1000,
            moderate_psi: 0.1,
            significant_psi: 0.25,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            min_severity: AlertSeverity::High,
            queue_capacity: 256,
            timeout_secs: 10,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

fn unit_interval(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {value}")))
    }
}

impl ServiceConfig {
    /// Load from JSON file if present; otherwise return defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ServiceConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("scoring.decision_threshold", self.scoring.decision_threshold)?;
        unit_interval("quality_gate.min_auc", self.quality_gate.min_auc)?;
        unit_interval("quality_gate.min_recall", self.quality_gate.min_recall)?;
        unit_interval("quality_gate.min_precision", self.quality_gate.min_precision)?;
        if !(self.training.validation_fraction > 0.0 && self.training.validation_fraction < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "training.validation_fraction must be in (0, 1), got {}",
                self.training.validation_fraction
            )));
        }
        if crate::features::schema(self.training.feature_schema_version).is_none() {
            return Err(ConfigError::Invalid(format!(
                "training.feature_schema_version {} is unknown",
                self.training.feature_schema_version
            )));
        }
        if self.history.max_transactions == 0 || self.history.max_age_secs <= 0 {
            return Err(ConfigError::Invalid(
                "history window must allow at least one transaction and a positive age".into(),
            ));
        }
        if self.history.max_age_secs > MAX_HISTORY_AGE_SECS {
            return Err(ConfigError::Invalid(format!(
                "history.max_age_secs must be at most {MAX_HISTORY_AGE_SECS}, got {}",
                self.history.max_age_secs
            )));
        }
        if self.history.max_accounts == 0 {
            return Err(ConfigError::Invalid("history.max_accounts must be at least 1".into()));
        }
        if let Some(url) = &self.alerts.webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!("alerts.webhook_url must be http(s), got {url}")));
            }
        }
        if self.alerts.queue_capacity == 0 || self.alerts.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "alerts.queue_capacity and alerts.timeout_secs must be positive".into(),
            ));
        }
        if self.registry.max_retained == 0 {
            return Err(ConfigError::Invalid("registry.max_retained must be at least 1".into()));
        }
        if self.drift.window < self.drift.min_samples {
            return Err(ConfigError::Invalid("drift.window must be at least drift.min_samples".into()));
        }
        if self.drift.bins < 2 {
            return Err(ConfigError::Invalid("drift.bins must be at least 2".into()));
        }
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("audit.db")
    }
}
