use std::time::Duration;

use async_trait::async_trait;
use http::{header, HeaderMap, HeaderName, Uri};
use reqwest::{redirect::Policy, Client, Url};
use service_worker::{FetchError, Fetcher, WorkerRequest, WorkerResponse};
use tracing::{instrument, trace};

/// Headers that only apply to a single hop and are never forwarded
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

/// The real network: resolves request paths against the upstream origin
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl UpstreamFetcher {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, anyhow::Error> {
        let base = Url::parse(base)?;
        let client = Client::builder()
            .timeout(timeout)
            // Redirects go back to the page untouched
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client, base, timeout })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn target(&self, uri: &Uri) -> Result<Url, FetchError> {
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        self.base
            .join(path)
            .map_err(|e| FetchError::InvalidRequest(format!("{uri}: {e}")))
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for UpstreamFetcher {
    #[instrument(skip_all, fields(method = %request.method, url = %request.uri))]
    async fn fetch(&self, request: &WorkerRequest) -> Result<WorkerResponse, FetchError> {
        let url = self.target(&request.uri)?;

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        trace!(%status, len = body.len(), "upstream responded");

        Ok(WorkerResponse::new(status, headers, body))
    }
}
