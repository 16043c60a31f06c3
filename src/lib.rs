//! Fraud Sentinel: real-time transaction fraud scoring for credit unions.
//!
//! - [`transactions`]: transaction/label records, account history
//! - [`features`]: versioned feature schemas and extraction
//! - [`model`]: scoring models (logistic regression, boosted stumps) and validation metrics
//! - [`registry`]: versioned artifacts, quality gate, atomic activation and rollback
//! - [`scoring`]: fail-closed scoring service, decisions and rule signals
//! - [`alerts`]: fraud alerts for flagged transactions (log, webhook)
//! - [`training`]: labeled export → candidate → registry
//! - [`storage`]: SQLite audit store (encrypted failure records)
//! - [`drift`]: score distribution drift against the validation reference
//! - [`api`]: HTTP surface
//! - [`logging`]: structured logging

pub mod alerts;
pub mod api;
pub mod config;
pub mod drift;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod registry;
pub mod scoring;
pub mod storage;
pub mod training;
pub mod transactions;

pub use config::ServiceConfig;
pub use features::{FeatureExtractor, FeatureVector};
pub use logging::StructuredLogger;
pub use model::ScoringModel;
pub use registry::{ModelArtifact, ModelRegistry};
pub use scoring::{Decision, ScoreOutcome, ScoreResult, ScoringService};
pub use storage::AuditStore;
pub use training::{CancelToken, TrainingPipeline};
pub use transactions::{Label, Transaction};
