//! End-to-end tests of the generation, cache and account endpoints

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;
use std::sync::Arc;

use imagegen_studio::api::create_router;
use imagegen_studio::config::Settings;

use crate::call;
use crate::common::{test_app, test_settings, ScriptedProvider, TestApp};

async fn signed_in(settings: Settings, provider: Arc<ScriptedProvider>) -> (Router, TestApp) {
    let app = test_app(settings, provider);
    let router = create_router(app.state.clone());
    let (status, _) = call(
        &router,
        Method::POST,
        "/v1/auth/login",
        Some(json!({ "email": "ada@gmail.com", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (router, app)
}

#[tokio::test]
async fn test_generate_then_browse_results() {
    let provider = Arc::new(ScriptedProvider::always_ok());
    let (router, _) = signed_in(test_settings(), provider.clone()).await;

    let (status, outcome) = call(
        &router,
        Method::POST,
        "/v1/images/generate",
        Some(json!({ "prompt": "a lighthouse at dusk", "count": 3, "aspect_ratio": "16:9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["requested"], 3);
    assert_eq!(outcome["delivered"], 3);
    assert_eq!(outcome["fallback_used"], false);
    assert!(outcome.get("notice").is_none());
    assert_eq!(
        outcome["images"],
        json!(["https://img.test/0.png", "https://img.test/1.png", "https://img.test/2.png"])
    );
    assert_eq!(provider.calls().len(), 3);

    let (_, results) = call(&router, Method::GET, "/v1/results", None).await;
    assert_eq!(results.as_array().unwrap().len(), 3);

    let (_, progress) = call(&router, Method::GET, "/v1/images/progress", None).await;
    assert_eq!(progress["percent"], 100);
    assert_eq!(progress["batch_id"], outcome["batch_id"]);

    let (_, usage) = call(&router, Method::GET, "/v1/account/usage", None).await;
    assert_eq!(usage["count"], 3);
    assert_eq!(usage["remaining"], 7);
}

#[tokio::test]
async fn test_progress_by_batch_id() {
    let provider = Arc::new(ScriptedProvider::always_ok());
    let (router, _) = signed_in(test_settings(), provider).await;

    for (batch_id, count) in [("first-batch", 2), ("second-batch", 1)] {
        let (status, outcome) = call(
            &router,
            Method::POST,
            "/v1/images/generate",
            Some(json!({ "prompt": "a lighthouse at dusk", "count": count, "batch_id": batch_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["batch_id"], batch_id);
    }

    let (status, first) = call(&router, Method::GET, "/v1/images/progress?batch_id=first-batch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["batch_id"], "first-batch");
    assert_eq!(first["total"], 2);
    assert_eq!(first["percent"], 100);

    let (_, latest) = call(&router, Method::GET, "/v1/images/progress", None).await;
    assert_eq!(latest["batch_id"], "second-batch");
    assert_eq!(latest["total"], 1);

    let (status, body) = call(&router, Method::GET, "/v1/images/progress?batch_id=unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_dispatch() {
    let provider = Arc::new(ScriptedProvider::always_ok());
    let (router, _) = signed_in(test_settings(), provider.clone()).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/images/generate",
        Some(json!({ "prompt": "a lighthouse", "aspect_ratio": "wide" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_aspect_ratio");

    let (status, _) = call(
        &router,
        Method::POST,
        "/v1/images/generate",
        Some(json!({ "prompt": "a lighthouse", "count": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_free_tier_quota() {
    let mut settings = test_settings();
    settings.quota.free_daily_limit = 3;
    let provider = Arc::new(ScriptedProvider::always_ok());
    let (router, _) = signed_in(settings, provider.clone()).await;
    let body = json!({ "prompt": "a lighthouse", "count": 2 });

    let (status, _) = call(&router, Method::POST, "/v1/images/generate", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, error) = call(&router, Method::POST, "/v1/images/generate", Some(body)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error["error"]["code"], "daily_limit_reached");
    assert_eq!(provider.calls().len(), 2);
}

#[tokio::test]
async fn test_premium_skips_quota() {
    let mut settings = test_settings();
    settings.quota.free_daily_limit = 1;
    let premium_function = settings.backend.premium_function.clone();
    let provider = Arc::new(ScriptedProvider::always_ok());
    let (router, app) = signed_in(settings, provider).await;
    app.backend.respond(
        &premium_function,
        200,
        json!({ "data": {
            "premium_status": "active",
            "premium_expiry": "2099-01-01T00:00:00Z",
            "credits": 50
        } }),
    );

    let (status, premium) = call(&router, Method::GET, "/v1/account/premium", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(premium["status"], "active");
    assert_eq!(premium["credits"], 50);

    let (status, outcome) = call(
        &router,
        Method::POST,
        "/v1/images/generate",
        Some(json!({ "prompt": "a lighthouse", "count": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["delivered"], 4);

    let (_, usage) = call(&router, Method::GET, "/v1/account/usage", None).await;
    assert_eq!(usage["premium"], true);
    assert_eq!(usage["count"], 0);
}

#[tokio::test]
async fn test_gallery_round_trip() {
    let (router, app) = signed_in(test_settings(), Arc::new(ScriptedProvider::always_ok())).await;
    let image = json!({ "url": "https://img.test/keep.png" });

    let (_, saved) = call(&router, Method::POST, "/v1/gallery", Some(image.clone())).await;
    assert_eq!(saved, json!({ "saved": true }));
    let (_, saved) = call(&router, Method::POST, "/v1/gallery", Some(image.clone())).await;
    assert_eq!(saved, json!({ "saved": false }));

    let (_, gallery) = call(&router, Method::GET, "/v1/gallery", None).await;
    assert_eq!(gallery[0]["url"], "https://img.test/keep.png");
    assert!(gallery[0]["expiresAt"].is_i64());

    let (_, deleted) = call(&router, Method::DELETE, "/v1/gallery", Some(image.clone())).await;
    assert_eq!(deleted, json!({ "deleted": true }));

    call(&router, Method::POST, "/v1/gallery", Some(image)).await;
    app.clock.advance(31 * 60 * 1000);
    // The session outlives the cache TTL
    let (status, gallery) = call(&router, Method::GET, "/v1/gallery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gallery, json!([]));

    let (status, _) = call(&router, Method::POST, "/v1/gallery", Some(json!({ "url": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_flow() {
    let settings = test_settings();
    let checkout_function = settings.backend.checkout_function.clone();
    let premium_function = settings.backend.premium_function.clone();
    let (router, app) = signed_in(settings, Arc::new(ScriptedProvider::always_ok())).await;

    app.backend.respond(
        &checkout_function,
        200,
        json!({ "url": "https://pay.test/session/1" }),
    );
    let (status, outcome) = call(&router, Method::POST, "/v1/account/checkout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "outcome": "redirect", "url": "https://pay.test/session/1" }));

    app.backend.respond(
        &premium_function,
        200,
        json!({ "data": [{ "premium_status": "active", "premium_expiry": null, "credits": 100 }] }),
    );
    let (status, outcome) = call(&router, Method::POST, "/v1/account/checkout/confirm", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "completed");
    assert_eq!(outcome["premium"]["status"], "active");

    let invocations = app.backend.invocations.lock();
    assert_eq!(invocations[0], (checkout_function, json!({ "plan_id": "premium-monthly" })));
    let (function, payload) = invocations.last().unwrap();
    assert_eq!(function, &premium_function);
    assert_eq!(payload, &json!({ "user_id": "user-ada", "operation": "activate" }));
}
