//! Router construction

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::middleware::{RateLimitLayer, SessionGateLayer};
use crate::AppState;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    let mut generation = Router::new().route("/images/generate", post(handlers::generate_images));
    if settings.rate_limit.enabled {
        generation = generation.route_layer(RateLimitLayer::new(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst_size,
            state.auth.clone(),
        ));
    }

    let v1 = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/session", get(handlers::session))
        .route("/models", get(handlers::list_models))
        .route("/styles", get(handlers::list_styles))
        .route("/images/progress", get(handlers::progress))
        .route(
            "/gallery",
            get(handlers::list_gallery)
                .post(handlers::save_to_gallery)
                .delete(handlers::delete_from_gallery),
        )
        .route("/results", get(handlers::list_results))
        .route("/account/usage", get(handlers::usage))
        .route("/account/premium", get(handlers::premium_status))
        .route("/account/checkout", post(handlers::start_checkout))
        .route("/account/checkout/confirm", post(handlers::confirm_checkout))
        .merge(generation);

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .nest("/v1", v1);

    if settings.storage.blob_mode == "file" {
        app = app.nest_service(
            &blob_mount_path(&settings.storage.url_prefix),
            ServeDir::new(&settings.storage.blob_path),
        );
    }

    if settings.auth.enabled {
        app = app.layer(SessionGateLayer::new(state.auth.clone()));
    }

    // A full batch plus one fallback batch, each attempt retried to the limit
    let tuning = &settings.generation;
    let request_timeout = Duration::from_millis(
        2 * tuning.max_attempts as u64 * (tuning.attempt_timeout_ms + tuning.base_delay_ms * 4),
    ) + Duration::from_secs(30);

    app.layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Path component of the blob URL prefix, e.g. `/blobs`
fn blob_mount_path(url_prefix: &str) -> String {
    let path = match url_prefix.split_once("://") {
        Some((_, rest)) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => url_prefix,
    };
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        "/blobs".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
