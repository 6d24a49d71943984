use std::{fmt, panic::Location};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deadpool_sqlite::HookError;
use tracing::error;

/// Error returned by the host's handlers, rendered as a plain text body
pub struct AppError {
    pub code: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new<S: Into<String>>(code: StatusCode, message: S) -> Self {
        AppError { code, message: message.into() }
    }

    /// The upstream couldn't be reached and neither the caches nor the
    /// offline page could stand in for it
    pub fn bad_gateway<S: Into<String>>(message: S) -> Self {
        AppError::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AppError {}: {}", self.code, self.message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.code, self.message).into_response()
    }
}

// Lets handlers use `?` on storage, worker and db errors. They all become a
// 500 and get logged with the location of the `?`
impl<E> From<E> for AppError
where
    E: Into<Box<dyn std::error::Error>>,
{
    #[track_caller]
    fn from(err: E) -> Self {
        let err: Box<dyn std::error::Error> = err.into();
        let location = Location::caller();
        error!(%location, "Handler failed: {err}");

        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {err}"))
    }
}

impl From<AppError> for HookError {
    fn from(err: AppError) -> Self {
        Self::Message(err.to_string())
    }
}
