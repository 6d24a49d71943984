use std::time::Duration;

use http::{uri::InvalidUri, StatusCode};
use thiserror::Error;

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache storage unavailable: {0}")]
    Unavailable(String),
    #[error("refusing to cache a response with status {0}")]
    NotCacheable(StatusCode),
    #[error("corrupt cache entry: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Error)]
pub enum DiagnosticsError {
    #[error("diagnostics store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),
    #[error("pre-caching {asset} failed: {source}")]
    Install { asset: String, source: FetchError },
    #[error("pre-caching {asset} failed with status {status}")]
    InstallStatus { asset: String, status: StatusCode },
    #[error("worker is {0:?}")]
    InvalidState(LifecycleState),
}
