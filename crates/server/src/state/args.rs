use std::{ops::Deref, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};

use crate::cli::Cli;

/// The parsed command line, shared by every handler
#[derive(Debug)]
pub struct Args(Arc<Cli>);

impl Deref for Args {
    type Target = Cli;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Args
where
    S: Send + Sync,
    Arc<Cli>: FromRef<S>,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Args(<Arc<Cli>>::from_ref(state)))
    }
}
