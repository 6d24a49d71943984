use axum::{
    routing::{get, post},
    Router,
};
use shared::api::Object;
use tower_http::{
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::AppState;

pub mod diagnostics;
pub mod message;
pub mod proxy;
pub mod status;

/// Control messages are tiny
const MESSAGE_BODY_LIMIT: usize = 4 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            Object::Message.path(),
            post(message::handler).layer(RequestBodyLimitLayer::new(MESSAGE_BODY_LIMIT)),
        )
        .route(Object::Diagnostics.path(), get(diagnostics::handler))
        .route(Object::Status.path(), get(status::handler))
        .fallback(proxy::handler)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
