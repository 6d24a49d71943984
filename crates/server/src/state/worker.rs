use std::{ops::Deref, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use service_worker::ServiceWorker;

/// Handle on the engine that every intercepted request goes through
#[derive(Debug, Clone)]
pub struct Worker(pub Arc<ServiceWorker>);

impl Deref for Worker {
    type Target = ServiceWorker;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Worker
where
    S: Send + Sync,
    Arc<ServiceWorker>: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Worker(<Arc<ServiceWorker>>::from_ref(state)))
    }
}
