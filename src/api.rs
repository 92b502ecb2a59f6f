//! HTTP surface for docqa.
//!
//! - `POST /query`: answer questions about one remote PDF. Body `{documents, questions}`,
//!   response `{answers}` aligned with `questions`.
//! - `GET /metrics`: request, indexing, cache, and answer counters.
//!
//! Client-fixable failures (bad request, unreachable or unparseable document) map to 400/422;
//! failures of the fetch target or the vector index map to 502/503.

use crate::ingest::{FetchError, IngestError};
use crate::metrics::MetricsSnapshot;
use crate::processing::{QueryApi, QueryError, QueryRequest, QueryResponse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the query API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QueryApi + 'static,
{
    Router::new()
        .route("/query", post(run_query::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Answer every question about the requested document.
async fn run_query<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: QueryApi,
{
    let report = service.query(request).await?;
    tracing::info!(
        partition = %report.partition,
        cache_hit = report.cache_hit,
        answers = report.answers.len(),
        elapsed_ms = report.elapsed_ms,
        "Query request completed"
    );
    Ok(Json(report.into()))
}

/// Return the current counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: QueryApi,
{
    Json(service.metrics_snapshot())
}

struct AppError(QueryError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            QueryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QueryError::Ingest(IngestError::Fetch(FetchError::InvalidUrl(_))) => {
                StatusCode::BAD_REQUEST
            }
            error if error.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::Ingest(_) => StatusCode::BAD_GATEWAY,
            QueryError::Index(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, %status, "Query failed");
        } else {
            tracing::warn!(error = %self.0, %status, "Query rejected");
        }
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(inner: QueryError) -> Self {
        Self(inner)
    }
}
