//! Scripted fetcher for tests

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode};

use crate::{
    error::FetchError,
    network::Fetcher,
    request::{WorkerRequest, WorkerResponse},
};

#[derive(Debug)]
struct MockRoute {
    status: StatusCode,
    body: Bytes,
    delay: Duration,
    /// Number of calls that fail before the route starts answering
    failures: AtomicUsize,
    /// Fail forever with this message
    error: Option<String>,
}

/// Answers requests by URL from a table of canned responses
///
/// Unknown URLs fail with a network error. Delays use tokio's clock so
/// paused-time tests run instantly
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: DashMap<String, MockRoute>,
    calls: DashMap<String, usize>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, url: &str, route: MockRoute) {
        self.routes.insert(url.to_string(), route);
    }

    pub fn respond(&self, url: &str, status: StatusCode, body: impl Into<Bytes>) {
        self.respond_after(url, status, body, Duration::ZERO);
    }

    pub fn respond_after(
        &self,
        url: &str,
        status: StatusCode,
        body: impl Into<Bytes>,
        delay: Duration,
    ) {
        self.insert(
            url,
            MockRoute {
                status,
                body: body.into(),
                delay,
                failures: AtomicUsize::new(0),
                error: None,
            },
        );
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.insert(
            url,
            MockRoute {
                status: StatusCode::OK,
                body: Bytes::new(),
                delay: Duration::ZERO,
                failures: AtomicUsize::new(0),
                error: Some(message.to_string()),
            },
        );
    }

    pub fn fail_then_respond(
        &self,
        url: &str,
        failures: usize,
        status: StatusCode,
        body: impl Into<Bytes>,
    ) {
        self.insert(
            url,
            MockRoute {
                status,
                body: body.into(),
                delay: Duration::ZERO,
                failures: AtomicUsize::new(failures),
                error: None,
            },
        );
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.get(url).map_or(0, |v| *v)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|v| *v.value()).sum()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse, FetchError> {
        let url = request.url();
        *self.calls.entry(url.clone()).or_default() += 1;

        // Copy out what's needed so no map guard is held over the sleep
        let (delay, outcome) = {
            let Some(route) = self.routes.get(&url) else {
                return Err(FetchError::Network(format!("no route to {url}")));
            };

            let outcome = if let Some(error) = &route.error {
                Err(FetchError::Network(error.clone()))
            } else if route
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                Err(FetchError::Network("connection reset".to_string()))
            } else {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
                Ok(WorkerResponse::new(route.status, headers, route.body.clone()))
            };

            (route.delay, outcome)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        outcome
    }
}
