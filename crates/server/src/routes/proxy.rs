use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use service_worker::{FetchOutcome, ResponseSource, WorkerRequest, WorkerResponse};
use shared::api::SOURCE_HEADER;
use tracing::warn;

use crate::{AppError, Args, Worker};

/// Every request the host doesn't answer itself goes through the worker.
/// Requests the worker doesn't intercept are forwarded as is
pub async fn handler(
    worker: Worker,
    args: Args,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, args.max_request_body_bytes)
        .await
        .map_err(body_error)?;
    let request = WorkerRequest::new(parts.method, parts.uri, parts.headers, body);

    let response = match worker.handle_fetch(&request).await {
        Ok(FetchOutcome::Respond(response)) => response,
        Ok(FetchOutcome::Passthrough) => worker
            .fetcher()
            .fetch(&request)
            .await
            .map_err(|e| AppError::bad_gateway(e.to_string()))?
            .with_source(ResponseSource::Passthrough),
        Err(e) => {
            warn!("{} {} failed: {e}", request.method, request.uri);
            return Err(AppError::bad_gateway(e.to_string()));
        },
    };

    Ok(into_response(response))
}

/// Only an over-limit body is a 413, anything else went wrong reading it
fn body_error(err: axum::Error) -> AppError {
    let err = err.into_inner();
    if err.is::<LengthLimitError>() {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
    } else {
        AppError::new(StatusCode::BAD_REQUEST, format!("Failed to read request body: {err}"))
    }
}

fn into_response(response: WorkerResponse) -> Response {
    let source = HeaderValue::from_static(response.source.as_str());

    let mut http_response = (response.status, Body::from(response.body)).into_response();
    let headers = http_response.headers_mut();
    headers.extend(response.headers);
    headers.insert(SOURCE_HEADER, source);

    http_response
}
