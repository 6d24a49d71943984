use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::model::{RouteClass, Strategy, WorkerConfig};
use tracing::{debug, instrument};

use crate::{
    cache::CacheStorage,
    diagnostics::DiagnosticsSink,
    error::WorkerError,
    lifecycle::Lifecycle,
    network::Fetcher,
    request::{WorkerRequest, WorkerResponse},
    router::classify,
};

#[derive(Debug)]
pub enum FetchOutcome {
    Respond(WorkerResponse),
    /// Not intercepted, the host performs the request itself
    Passthrough,
}

pub struct ServiceWorker {
    pub(crate) config: WorkerConfig,
    pub(crate) caches: Arc<dyn CacheStorage>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) diagnostics: DiagnosticsSink,
    lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("config", &self.config)
            .field("lifecycle", &*self.lifecycle())
            .finish_non_exhaustive()
    }
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        diagnostics: DiagnosticsSink,
    ) -> Self {
        let lifecycle = Lifecycle::new(config.skip_waiting);
        Self {
            config,
            caches,
            fetcher,
            diagnostics,
            lifecycle: Mutex::new(lifecycle),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn caches(&self) -> &Arc<dyn CacheStorage> {
        &self.caches
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn diagnostics(&self) -> &DiagnosticsSink {
        &self.diagnostics
    }

    // Never hold this across an await
    pub(crate) fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn classify(&self, request: &WorkerRequest) -> RouteClass {
        classify(&self.config, &request.method, &request.uri)
    }

    /// Resolves an intercepted request. Until the worker has claimed its
    /// clients every request passes through
    #[instrument(skip_all, fields(method = %request.method, url = %request.uri))]
    pub async fn handle_fetch(&self, request: &WorkerRequest) -> Result<FetchOutcome, WorkerError> {
        if !self.controls_clients() {
            return Ok(FetchOutcome::Passthrough);
        }

        let class = self.classify(request);
        let Some(policy) = self.config.policies.get(class).copied() else {
            debug!("not intercepted");
            return Ok(FetchOutcome::Passthrough);
        };
        debug!(?class, "intercepted");

        let response = match policy.strategy {
            Strategy::NetworkFirst => self.network_first(policy, request).await?,
            Strategy::CacheFirst => self.cache_first(policy, request).await?,
        };

        Ok(FetchOutcome::Respond(response))
    }
}
