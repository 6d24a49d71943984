use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::model::ControlMessage;
use tracing::instrument;

use crate::{AppError, Worker};

/// Control channel. Replies with JSON when the message has an answer,
/// otherwise 204
#[instrument(skip(worker))]
pub async fn handler(
    worker: Worker,
    Json(message): Json<ControlMessage>,
) -> Result<Response, AppError> {
    match worker.handle_message(message).await? {
        Some(reply) => Ok(Json(reply).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
