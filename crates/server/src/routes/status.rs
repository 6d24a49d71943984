use axum::{extract::State, Json};
use serde::Serialize;
use service_worker::LifecycleState;

use crate::{upstream::UpstreamFetcher, AppError, Worker};

#[derive(Debug, Serialize)]
pub struct WorkerStatus {
    pub state: LifecycleState,
    pub controls_clients: bool,
    pub static_cache: String,
    pub runtime_cache: String,
    pub namespaces: Vec<String>,
    pub cache_size: u64,
    pub dropped_diagnostics: u64,
    pub upstream: String,
}

pub async fn handler(
    worker: Worker,
    State(upstream): State<UpstreamFetcher>,
) -> Result<Json<WorkerStatus>, AppError> {
    let config = worker.config();

    Ok(Json(WorkerStatus {
        state: worker.state(),
        controls_clients: worker.controls_clients(),
        static_cache: config.static_cache_name.clone(),
        runtime_cache: config.runtime_cache_name.clone(),
        namespaces: worker.caches().namespaces().await?,
        cache_size: worker.cache_size().await?,
        dropped_diagnostics: worker.diagnostics().dropped(),
        upstream: upstream.base().to_string(),
    }))
}
