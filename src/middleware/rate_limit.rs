//! Per-user rate limiting for generation endpoints using the Governor crate

use axum::{
    body::Body,
    http::{header::RETRY_AFTER, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::{
    num::NonZeroU32,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::account::AuthService;
use crate::error::{ErrorDetail, ErrorResponse};

/// Bucket for requests made without a session
const ANONYMOUS: &str = "anonymous";

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    auth: Arc<AuthService>,
}

impl RateLimitLayer {
    pub fn new(requests_per_second: u32, burst_size: u32, auth: Arc<AuthService>) -> Self {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst_size).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            auth,
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            limiter: self.limiter.clone(),
            auth: self.auth.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    auth: Arc<AuthService>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
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
        let key = self
            .auth
            .session()
            .map(|s| s.user.id)
            .unwrap_or_else(|| ANONYMOUS.to_string());

        match self.limiter.check_key(&key) {
            Ok(()) => Box::pin(self.inner.call(request)),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                warn!(user_id = %key, retry_after_ms = wait.as_millis() as u64, "Rate limit exceeded");
                Box::pin(async move { Ok(rate_limited(wait.as_secs().max(1))) })
            }
        }
    }
}

fn rate_limited(retry_after_secs: u64) -> Response {
    let body = ErrorResponse {
        error: ErrorDetail {
            message: "Too many generation requests. Please wait a moment and try again.".to_string(),
            r#type: "rate_limit_error".to_string(),
            code: Some("rate_limit_exceeded".to_string()),
        },
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}
