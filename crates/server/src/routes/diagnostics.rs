use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::model::StoredDiagnostic;
use tracing::instrument;

use crate::{db::SqliteDiagnosticsStore, AppError};

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Deserialize)]
pub struct DiagnosticsQuery {
    limit: Option<u64>,
}

/// Recorded slow requests and network errors, newest first
#[instrument(skip(store))]
pub async fn handler(
    State(store): State<SqliteDiagnosticsStore>,
    Query(query): Query<DiagnosticsQuery>,
) -> Result<Json<Vec<StoredDiagnostic>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Ok(Json(store.fetch_recent(limit).await?))
}
