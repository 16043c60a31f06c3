//! Error taxonomy shared across the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Raised when a transaction record violates the data model.
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("transaction id is empty")]
    MissingId,
    #[error("account id is empty for transaction {0}")]
    MissingAccount(String),
    #[error("amount {amount} is not a finite non-negative value for transaction {id}")]
    InvalidAmount { id: String, amount: f64 },
    #[error("geolocation ({latitude}, {longitude}) out of range for transaction {id}")]
    InvalidGeolocation {
        id: String,
        latitude: f64,
        longitude: f64,
    },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("account history unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("schema mismatch: unknown feature schema version {0}")]
    SchemaMismatch(u32),
}

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error(
        "feature schema mismatch: model expects v{expected_version} ({expected_len} features), \
         got v{actual_version} ({actual_len} features)"
    )]
    FeatureSchemaMismatch {
        expected_version: u32,
        expected_len: usize,
        actual_version: u32,
        actual_len: usize,
    },
    #[error("non-finite value at feature index {0}")]
    NonFiniteInput(usize),
    #[error("model produced a non-finite probability")]
    NonFiniteOutput,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("payload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload encryption failed")]
    Crypto,
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no active model has been published")]
    NoActiveModel,
    #[error("candidate rejected by quality gate: {}", reasons.join("; "))]
    ValidationRejected { reasons: Vec<String> },
    #[error("model version {0} not found (never published or pruned)")]
    VersionNotFound(u64),
    #[error("artifact v{version} failed checksum verification")]
    ChecksumMismatch { version: u64 },
    #[error("registry storage: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("insufficient training data: {0}")]
    InsufficientData(String),
    #[error("training cancelled")]
    Cancelled,
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("unable to evaluate candidate: {0}")]
    Metrics(#[from] MetricsError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("scores and labels differ in length ({scores} vs {labels})")]
    LengthMismatch { scores: usize, labels: usize },
    #[error("evaluation slice needs both classes (positives: {positives}, negatives: {negatives})")]
    SingleClass { positives: usize, negatives: usize },
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alerts.webhook_url is not configured")]
    MissingUrl,
    #[error("alert http client: {0}")]
    Client(#[from] reqwest::Error),
    #[error("cannot start alert delivery worker: {0}")]
    Worker(#[from] std::io::Error),
}
