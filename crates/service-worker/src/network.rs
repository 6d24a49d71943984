use async_trait::async_trait;

use crate::{
    error::FetchError,
    request::{WorkerRequest, WorkerResponse},
};

/// Performs the real network request for an intercepted fetch
///
/// Any HTTP status is a successful fetch. Only transport failures are errors
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse, FetchError>;
}
