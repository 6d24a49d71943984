use bytes::Bytes;
use http::{
    header::{CACHE_CONTROL, CONTENT_TYPE},
    HeaderMap, HeaderValue, StatusCode,
};

use crate::request::{ResponseSource, WorkerResponse};

/// Self contained page, no external resources so it renders with no network
pub const OFFLINE_PAGE: &str = include_str!("../assets/offline.html");

/// Page served for a navigation that neither the network nor the cache could
/// satisfy
pub fn offline_response() -> WorkerResponse {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    WorkerResponse::new(StatusCode::OK, headers, Bytes::from_static(OFFLINE_PAGE.as_bytes()))
        .with_source(ResponseSource::Offline)
}
