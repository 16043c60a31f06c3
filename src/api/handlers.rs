//! Route handlers. Scoring and store reads are synchronous and run on the blocking pool.

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::drift::DriftReport;
use crate::registry::ArtifactSummary;
use crate::scoring::{Decision, RuleHit, ScoreOutcome, ScoreResult, ScoringErrorKind};
use crate::transactions::Transaction;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_ERROR_LIMIT: usize = 50;
const MAX_ERROR_LIMIT: usize = 500;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_model: Option<u64>,
    timestamp: i64,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let active_model = state.registry.active_version();
    Json(HealthResponse {
        status: if active_model.is_some() { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        active_model,
        timestamp: Utc::now().timestamp(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub transaction_id: String,
    pub fraud_probability: Option<f64>,
    pub decision: Decision,
    pub model_version: Option<u64>,
    pub rule_hits: Vec<RuleHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ScoringErrorKind>,
}

impl From<&ScoreOutcome> for ScoreResponse {
    fn from(outcome: &ScoreOutcome) -> Self {
        Self {
            transaction_id: outcome.transaction_id().to_string(),
            fraud_probability: outcome.fraud_probability(),
            decision: outcome.decision(),
            model_version: outcome.model_version(),
            rule_hits: outcome.result().map(|r| r.rule_hits.clone()).unwrap_or_default(),
            error: outcome.failure().map(|f| f.kind),
        }
    }
}

pub async fn score(State(state): State<AppState>, Json(tx): Json<Transaction>) -> ApiResult<Json<ScoreResponse>> {
    let service = state.scoring.clone();
    let history = state.history.clone();
    let response = tokio::task::spawn_blocking(move || {
        let outcome = service.score(&tx);
        // later transactions of the account see this one as history
        if tx.validate().is_ok() {
            history.record(&tx);
        }
        ScoreResponse::from(&outcome)
    })
    .await?;
    Ok(Json(response))
}

pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ArtifactSummary>> {
    Json(state.registry.summaries())
}

pub async fn active_model(State(state): State<AppState>) -> ApiResult<Json<ArtifactSummary>> {
    let active = state.registry.get_active()?;
    Ok(Json(active.artifact.summary(true)))
}

pub async fn active_drift(State(state): State<AppState>) -> ApiResult<Json<DriftReport>> {
    let active = state.registry.get_active()?;
    let store = state.store.clone();
    let drift = state.drift.clone();
    let report = tokio::task::spawn_blocking(move || -> ApiResult<DriftReport> {
        let recent = store.recent_probabilities(active.version(), drift.window())?;
        Ok(drift.assess(&active.artifact, &recent))
    })
    .await??;
    Ok(Json(report))
}

pub async fn transaction_scores(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ScoreResult>>> {
    let store = state.store.clone();
    let lookup = id.clone();
    let scores = tokio::task::spawn_blocking(move || store.scores_for_transaction(&lookup)).await??;
    if scores.is_empty() {
        return Err(ApiError::NotFound(format!("no score results for transaction {id}")));
    }
    Ok(Json(scores))
}

#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub limit: Option<usize>,
}

/// Failure record as shown on the dashboard; the transaction snapshot stays in the store.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoringErrorView {
    pub id: String,
    pub transaction_id: String,
    pub kind: ScoringErrorKind,
    pub message: String,
    pub model_version: Option<u64>,
    pub decision: Decision,
    pub occurred_at: DateTime<Utc>,
}

pub async fn scoring_errors(
    State(state): State<AppState>,
    Query(query): Query<ErrorQuery>,
) -> ApiResult<Json<Vec<ScoringErrorView>>> {
    let limit = query.limit.unwrap_or(DEFAULT_ERROR_LIMIT);
    if limit == 0 || limit > MAX_ERROR_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_ERROR_LIMIT}"
        )));
    }
    let store = state.store.clone();
    let failures = tokio::task::spawn_blocking(move || store.recent_failures(limit)).await??;
    let views = failures
        .into_iter()
        .map(|f| ScoringErrorView {
            id: f.id,
            transaction_id: f.transaction_id,
            kind: f.kind,
            message: f.message,
            model_version: f.model_version,
            decision: f.decision,
            occurred_at: f.occurred_at,
        })
        .collect();
    Ok(Json(views))
}
