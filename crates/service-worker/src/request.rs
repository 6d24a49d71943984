use bytes::Bytes;
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderMap, Method, StatusCode, Uri,
};

const SEC_FETCH_MODE: &str = "sec-fetch-mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Top level page load
    Navigate,
    Other,
}

impl RequestMode {
    /// Browsers send `Sec-Fetch-Mode: navigate` for page loads. Older clients
    /// don't, so a GET that asks for html counts as well
    pub fn detect(method: &Method, headers: &HeaderMap) -> Self {
        if let Some(mode) = headers.get(SEC_FETCH_MODE) {
            return if mode.as_bytes().eq_ignore_ascii_case(b"navigate") {
                RequestMode::Navigate
            } else {
                RequestMode::Other
            };
        }

        let wants_html = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.contains(mime::TEXT_HTML.essence_str()));

        if method == Method::GET && wants_html {
            RequestMode::Navigate
        } else {
            RequestMode::Other
        }
    }
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub mode: RequestMode,
}

impl WorkerRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let mode = RequestMode::detect(&method, &headers);
        Self { method, uri, headers, body, mode }
    }

    pub fn get(uri: Uri) -> Self {
        Self::new(Method::GET, uri, HeaderMap::new(), Bytes::new())
    }

    pub fn navigate(uri: Uri) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(uri) }
    }

    /// The URL exactly as requested, used for cache keys and diagnostics
    pub fn url(&self) -> String {
        self.uri.to_string()
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    Offline,
    Passthrough,
}

impl ResponseSource {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Offline => "offline",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl WorkerResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self { status, headers, body, source: ResponseSource::Network }
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod test {
    use http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_sec_fetch_mode_wins() {
        let h = headers(&[("sec-fetch-mode", "navigate")]);
        assert_eq!(RequestMode::detect(&Method::GET, &h), RequestMode::Navigate);

        // An explicit cors fetch for html is still not a navigation
        let h = headers(&[("sec-fetch-mode", "cors"), ("accept", "text/html")]);
        assert_eq!(RequestMode::detect(&Method::GET, &h), RequestMode::Other);
    }

    #[test]
    fn test_accept_html_fallback() {
        let h = headers(&[("accept", "text/html,application/xhtml+xml;q=0.9")]);
        assert_eq!(RequestMode::detect(&Method::GET, &h), RequestMode::Navigate);
        assert_eq!(RequestMode::detect(&Method::POST, &h), RequestMode::Other);

        let h = headers(&[("accept", "application/json")]);
        assert_eq!(RequestMode::detect(&Method::GET, &h), RequestMode::Other);
    }

    #[test]
    fn test_url_keeps_query() {
        let request = WorkerRequest::get(Uri::from_static("/api/employees?page=1"));
        assert_eq!(request.url(), "/api/employees?page=1");
        assert!(!request.is_navigation());
    }
}
