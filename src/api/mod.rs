//! HTTP surface: scoring requests plus read-only dashboard endpoints.

mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

use crate::drift::DriftMonitor;
use crate::registry::ModelRegistry;
use crate::scoring::ScoringService;
use crate::storage::AuditStore;
use crate::transactions::InMemoryHistory;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub scoring: Arc<ScoringService>,
    pub registry: Arc<ModelRegistry>,
    pub store: Arc<AuditStore>,
    pub history: Arc<InMemoryHistory>,
    pub drift: Arc<DriftMonitor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/score", post(handlers::score))
        .route("/api/v1/models", get(handlers::list_models))
        .route("/api/v1/models/active", get(handlers::active_model))
        .route("/api/v1/models/active/drift", get(handlers::active_drift))
        .route("/api/v1/transactions/:id/scores", get(handlers::transaction_scores))
        .route("/api/v1/scoring-errors", get(handlers::scoring_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    bind: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "scoring API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
