use shared::model::{DiagnosticRecord, Namespace, RoutePolicy};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    cache::{CacheKey, CachedResponse},
    error::{FetchError, WorkerError},
    offline::offline_response,
    request::{WorkerRequest, WorkerResponse},
    worker::ServiceWorker,
};

impl ServiceWorker {
    /// Live data first. Good responses are cached, failures fall back to the
    /// cache and then, for navigations on routes that allow it, the offline
    /// page
    pub(crate) async fn network_first(
        &self,
        policy: RoutePolicy,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, WorkerError> {
        let start = Instant::now();

        match self.fetch_with_retries(&policy, request).await {
            Ok(response) => {
                let elapsed = start.elapsed();
                if policy.record_diagnostics && elapsed >= self.config.slow_request_threshold() {
                    warn!(?elapsed, url = %request.uri, "slow request");
                    self.diagnostics
                        .record(DiagnosticRecord::slow_request(request.url(), elapsed));
                }

                self.store(policy.namespace, request, &response).await;
                Ok(response)
            },
            Err(e) => {
                if let Some(cached) = self.lookup(policy.namespace, request).await {
                    self.note_failure(&policy, request, &e);
                    debug!("HIT after network failure: {}", request.uri);
                    return Ok(cached);
                }
                self.fallback(policy, request, e)
            },
        }
    }

    /// Cached copy first, the network only on a miss
    pub(crate) async fn cache_first(
        &self,
        policy: RoutePolicy,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, WorkerError> {
        if let Some(cached) = self.lookup(policy.namespace, request).await {
            debug!("HIT: {}", request.uri);
            return Ok(cached);
        }
        debug!("MISS: {}", request.uri);

        match self.fetch_with_retries(&policy, request).await {
            Ok(response) => {
                self.store(policy.namespace, request, &response).await;
                Ok(response)
            },
            Err(e) => self.fallback(policy, request, e),
        }
    }

    /// Network and cache both failed
    fn fallback(
        &self,
        policy: RoutePolicy,
        request: &WorkerRequest,
        error: FetchError,
    ) -> Result<WorkerResponse, WorkerError> {
        self.note_failure(&policy, request, &error);

        if policy.offline_fallback && request.is_navigation() {
            debug!("serving offline page for {}", request.uri);
            return Ok(offline_response());
        }

        Err(error.into())
    }

    fn note_failure(&self, policy: &RoutePolicy, request: &WorkerRequest, error: &FetchError) {
        warn!(url = %request.uri, "fetch failed: {error}");
        if policy.record_diagnostics {
            self.diagnostics
                .record(DiagnosticRecord::network_error(request.url(), error));
        }
    }

    async fn fetch_with_retries(
        &self,
        policy: &RoutePolicy,
        request: &WorkerRequest,
    ) -> Result<WorkerResponse, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(request).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < policy.retries => {
                    attempt += 1;
                    debug!("retrying {} ({attempt}/{}): {e}", request.uri, policy.retries);
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Cache read failures count as a miss
    async fn lookup(&self, namespace: Namespace, request: &WorkerRequest) -> Option<WorkerResponse> {
        let key = CacheKey::for_request(request)?;
        match self.caches.match_key(self.config.cache_name(namespace), &key).await {
            Ok(cached) => cached.map(CachedResponse::into_response),
            Err(e) => {
                warn!("cache::match {key}: {e}");
                None
            },
        }
    }

    /// Stores 2xx GET responses. A failed write doesn't fail the request
    async fn store(&self, namespace: Namespace, request: &WorkerRequest, response: &WorkerResponse) {
        if !response.is_success() {
            return;
        }
        let Some(key) = CacheKey::for_request(request) else {
            return;
        };

        let result = match CachedResponse::from_response(response) {
            Ok(cached) => {
                self.caches
                    .put(self.config.cache_name(namespace), key.clone(), cached)
                    .await
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => debug!("cached {key}"),
            Err(e) => warn!("cache::put {key}: {e}"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use http::{StatusCode, Uri};
    use shared::model::{DiagnosticKind, WorkerConfig};

    use crate::{
        cache::{CacheStorage, MemoryCacheStorage},
        error::CacheError,
        diagnostics::{DiagnosticsDrain, DiagnosticsSink, MemoryDiagnosticsStore},
        request::ResponseSource,
        testing::MockFetcher,
        worker::FetchOutcome,
    };

    use super::*;

    struct Harness {
        worker: ServiceWorker,
        caches: Arc<MemoryCacheStorage>,
        fetcher: Arc<MockFetcher>,
        store: Arc<MemoryDiagnosticsStore>,
        drain: DiagnosticsDrain,
    }

    impl Harness {
        async fn new(config: WorkerConfig) -> Self {
            let caches = Arc::new(MemoryCacheStorage::new());
            let fetcher = Arc::new(MockFetcher::new());
            let store = Arc::new(MemoryDiagnosticsStore::new());
            let (sink, drain) = DiagnosticsSink::new(store.clone(), 16);

            let worker = ServiceWorker::new(config, caches.clone(), fetcher.clone(), sink);
            // Straight to active, pre-caching is covered by the lifecycle tests
            worker.activate().await.unwrap();

            Self { worker, caches, fetcher, store, drain }
        }

        async fn fetch(&self, request: WorkerRequest) -> Result<WorkerResponse, WorkerError> {
            match self.worker.handle_fetch(&request).await? {
                FetchOutcome::Respond(r) => Ok(r),
                FetchOutcome::Passthrough => panic!("{} wasn't intercepted", request.uri),
            }
        }

        async fn records(&self) -> Vec<DiagnosticKind> {
            self.drain.flush().await;
            self.store.records().into_iter().map(|r| r.record.kind).collect()
        }

        async fn cached_body(&self, namespace: &str, url: &str) -> Option<Vec<u8>> {
            self.caches
                .match_key(namespace, &CacheKey::for_url(url))
                .await
                .unwrap()
                .map(|c| c.body.to_vec())
        }
    }

    /// Reads and writes always fail, namespace bookkeeping works
    struct BrokenCache;

    fn blocked() -> CacheError {
        CacheError::Unavailable("disk I/O error".to_string())
    }

    #[async_trait]
    impl CacheStorage for BrokenCache {
        async fn open(&self, _namespace: &str) -> Result<(), CacheError> {
            Ok(())
        }

        async fn match_key(
            &self,
            _namespace: &str,
            _key: &CacheKey,
        ) -> Result<Option<CachedResponse>, CacheError> {
            Err(blocked())
        }

        async fn put(
            &self,
            _namespace: &str,
            _key: CacheKey,
            _response: CachedResponse,
        ) -> Result<(), CacheError> {
            Err(blocked())
        }

        async fn put_all(
            &self,
            _namespace: &str,
            _entries: Vec<(CacheKey, CachedResponse)>,
        ) -> Result<(), CacheError> {
            Err(blocked())
        }

        async fn delete(&self, _namespace: &str, _key: &CacheKey) -> Result<bool, CacheError> {
            Err(blocked())
        }

        async fn keys(&self, _namespace: &str) -> Result<Vec<CacheKey>, CacheError> {
            Ok(Vec::new())
        }

        async fn namespaces(&self) -> Result<Vec<String>, CacheError> {
            Ok(Vec::new())
        }

        async fn delete_namespace(&self, _namespace: &str) -> Result<bool, CacheError> {
            Ok(false)
        }

        async fn namespace_size(&self, _namespace: &str) -> Result<u64, CacheError> {
            Ok(0)
        }
    }

    async fn broken_cache_worker() -> (ServiceWorker, Arc<MockFetcher>) {
        let fetcher = Arc::new(MockFetcher::new());
        let (sink, _drain) = DiagnosticsSink::new(Arc::new(MemoryDiagnosticsStore::new()), 16);
        let worker = ServiceWorker::new(
            WorkerConfig::default(),
            Arc::new(BrokenCache),
            fetcher.clone(),
            sink,
        );
        worker.activate().await.unwrap();
        (worker, fetcher)
    }

    async fn respond(worker: &ServiceWorker, request: WorkerRequest) -> WorkerResponse {
        match worker.handle_fetch(&request).await.unwrap() {
            FetchOutcome::Respond(r) => r,
            FetchOutcome::Passthrough => panic!("{} wasn't intercepted", request.uri),
        }
    }

    #[tokio::test]
    async fn test_failed_cache_write_still_returns_live_response() {
        let (worker, fetcher) = broken_cache_worker().await;
        fetcher.respond("/api/employees", StatusCode::OK, "live");

        let response = respond(&worker, get("/api/employees")).await;
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(&response.body[..], b"live");
    }

    #[tokio::test]
    async fn test_failed_cache_read_is_a_miss() {
        let (worker, fetcher) = broken_cache_worker().await;

        // Network-first navigation falls through to the offline page
        fetcher.fail("/dashboard", "offline");
        let response = respond(&worker, WorkerRequest::navigate(Uri::from_static("/dashboard"))).await;
        assert_eq!(response.source, ResponseSource::Offline);

        // Cache-first goes to the network
        fetcher.respond("/favicon.ico", StatusCode::OK, "icon");
        let response = respond(&worker, get("/favicon.ico")).await;
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(fetcher.calls("/favicon.ico"), 1);
    }

    fn get(uri: &'static str) -> WorkerRequest {
        WorkerRequest::get(Uri::from_static(uri))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_monitored_request_end_to_end() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.respond_after(
            "/api/employees?page=1",
            StatusCode::OK,
            "[]",
            Duration::from_millis(2500),
        );

        let response = h.fetch(get("/api/employees?page=1")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(&response.body[..], b"[]");

        h.drain.flush().await;
        let records = h.store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.url, "/api/employees?page=1");
        assert!(matches!(
            records[0].record.kind,
            DiagnosticKind::SlowRequest { duration_ms } if duration_ms >= 2500
        ));

        assert_eq!(
            h.cached_body("runtime-v1", "/api/employees?page=1").await,
            Some(b"[]".to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_threshold_boundary() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.respond_after("/api/fast", StatusCode::OK, "ok", Duration::from_millis(1999));
        h.fetcher.respond_after("/api/edge", StatusCode::OK, "ok", Duration::from_millis(2000));

        h.fetch(get("/api/fast")).await.unwrap();
        assert!(h.records().await.is_empty());

        h.fetch(get("/api/edge")).await.unwrap();
        assert_eq!(h.records().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_route_never_records() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.respond_after("/leave/calendar", StatusCode::OK, "ok", Duration::from_secs(5));

        h.fetch(get("/leave/calendar")).await.unwrap();
        assert!(h.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_error_responses_are_not_cached() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.respond("/api/missing", StatusCode::NOT_FOUND, "nope");

        let response = h.fetch(get("/api/missing")).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(h.cached_body("runtime-v1", "/api/missing").await.is_none());
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        for url in ["/api/attendance", "/timesheets/week"] {
            let h = Harness::new(WorkerConfig::default()).await;
            h.fetcher.respond(url, StatusCode::OK, "fresh");
            h.fetch(WorkerRequest::get(Uri::try_from(url).unwrap())).await.unwrap();

            h.fetcher.fail(url, "connection refused");
            let response = h
                .fetch(WorkerRequest::get(Uri::try_from(url).unwrap()))
                .await
                .unwrap();
            assert_eq!(response.source, ResponseSource::Cache);
            assert_eq!(&response.body[..], b"fresh");
        }
    }

    #[tokio::test]
    async fn test_monitored_failure_records_network_error() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.fail("/api/payroll", "dns failure");

        let r = h.fetch(get("/api/payroll")).await;
        assert!(matches!(r, Err(WorkerError::Fetch(FetchError::Network(_)))));

        let records = h.records().await;
        assert_eq!(
            records,
            vec![DiagnosticKind::NetworkError {
                error: "network error: dns failure".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_offline_page_for_monitored_navigation() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.fail("/dashboard", "offline");

        let response = h
            .fetch(WorkerRequest::navigate(Uri::from_static("/dashboard")))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.source, ResponseSource::Offline);
        assert!(response.content_type().unwrap().starts_with("text/html"));
        assert!(std::str::from_utf8(&response.body).unwrap().contains("location.reload()"));
    }

    #[tokio::test]
    async fn test_default_navigation_failure_propagates() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.fail("/recruitment", "offline");

        let r = h.fetch(WorkerRequest::navigate(Uri::from_static("/recruitment"))).await;
        assert!(r.is_err());
        assert!(h.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_offline_fallback_is_configurable_per_route() {
        let mut config = WorkerConfig::default();
        config.policies.default.offline_fallback = true;
        let h = Harness::new(config).await;
        h.fetcher.fail("/recruitment", "offline");

        let response = h
            .fetch(WorkerRequest::navigate(Uri::from_static("/recruitment")))
            .await
            .unwrap();
        assert_eq!(response.source, ResponseSource::Offline);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.caches
            .put(
                "static-v1",
                CacheKey::for_url("/favicon.ico"),
                CachedResponse::from_response(&WorkerResponse::new(
                    StatusCode::OK,
                    Default::default(),
                    "icon-bytes".into(),
                ))
                .unwrap(),
            )
            .await
            .unwrap();

        let response = h.fetch(get("/favicon.ico")).await.unwrap();
        assert_eq!(&response.body[..], b"icon-bytes");
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let h = Harness::new(WorkerConfig::default()).await;
        let url = "/android/android-launchericon-48-48.png";
        h.fetcher.respond(url, StatusCode::OK, "png");

        h.fetch(get("/android/android-launchericon-48-48.png")).await.unwrap();
        h.fetch(get("/android/android-launchericon-48-48.png")).await.unwrap();

        assert_eq!(h.fetcher.calls(url), 1);
        assert_eq!(h.cached_body("static-v1", url).await, Some(b"png".to_vec()));
    }

    #[tokio::test]
    async fn test_cache_first_failure_propagates() {
        let h = Harness::new(WorkerConfig::default()).await;
        h.fetcher.fail("/favicon.ico", "offline");

        let r = h.fetch(WorkerRequest::navigate(Uri::from_static("/favicon.ico"))).await;
        assert!(r.is_err());
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let mut config = WorkerConfig::default();
        config.policies.monitored.retries = 2;
        let h = Harness::new(config).await;

        h.fetcher.fail_then_respond("/api/leave", 2, StatusCode::OK, "ok");
        let response = h.fetch(get("/api/leave")).await.unwrap();
        assert_eq!(&response.body[..], b"ok");
        assert_eq!(h.fetcher.calls("/api/leave"), 3);

        h.fetcher.fail("/api/vendors", "down");
        assert!(h.fetch(get("/api/vendors")).await.is_err());
        assert_eq!(h.fetcher.calls("/api/vendors"), 3);
    }
}
