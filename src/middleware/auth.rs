//! Session gate: requests under `/v1` need a signed-in, unexpired session

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;

use crate::account::AuthService;
use crate::error::AppError;

/// Paths under `/v1` reachable while signed out
const PUBLIC_PREFIXES: &[&str] = &["/v1/auth/", "/v1/models", "/v1/styles"];

fn requires_session(path: &str) -> bool {
    path.starts_with("/v1/") && !PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

#[derive(Clone)]
pub struct SessionGateLayer {
    auth: Arc<AuthService>,
}

impl SessionGateLayer {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }
}

impl<S> Layer<S> for SessionGateLayer {
    type Service = SessionGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionGate {
            inner,
            auth: self.auth.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionGate<S> {
    inner: S,
    auth: Arc<AuthService>,
}

impl<S> Service<Request<Body>> for SessionGate<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let path = request.uri().path();
        if !requires_session(path) || self.auth.session().is_some() {
            let future = self.inner.call(request);
            return Box::pin(future);
        }

        debug!(path = %path, "Rejected request without a session");
        Box::pin(async move {
            Ok(AppError::AuthenticationFailed("Please sign in to continue".to_string()).into_response())
        })
    }
}
