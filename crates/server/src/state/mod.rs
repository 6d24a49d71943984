use std::sync::Arc;

use axum::extract::FromRef;
use service_worker::ServiceWorker;

use crate::{cli::Cli, db::SqliteDiagnosticsStore, upstream::UpstreamFetcher};

mod args;
pub use args::*;

mod worker;
pub use worker::*;

#[derive(Debug, Clone)]
pub struct AppState {
    pub worker: Arc<ServiceWorker>,
    pub diagnostics: SqliteDiagnosticsStore,
    pub upstream: UpstreamFetcher,
    pub args: Arc<Cli>,
}

impl FromRef<AppState> for Arc<ServiceWorker> {
    fn from_ref(state: &AppState) -> Self {
        state.worker.clone()
    }
}

impl FromRef<AppState> for SqliteDiagnosticsStore {
    fn from_ref(state: &AppState) -> Self {
        // pool uses an Arc internally so clone is cheap
        state.diagnostics.clone()
    }
}

impl FromRef<AppState> for UpstreamFetcher {
    fn from_ref(state: &AppState) -> Self {
        state.upstream.clone()
    }
}

impl FromRef<AppState> for Arc<Cli> {
    fn from_ref(state: &AppState) -> Self {
        state.args.clone()
    }
}
