//! Request handlers for the studio API

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::account::{CheckoutOutcome, PremiumStatus, User};
use crate::catalog::styles::{StyleCategory, STYLE_CATEGORIES};
use crate::catalog::ModelDescriptor;
use crate::error::{AppError, Result};
use crate::orchestrator::{GenerationOutcome, GenerationRequest, ProgressSnapshot};
use crate::storage::cache::CachedImage;
use crate::storage::usage::DailyUsage;
use crate::AppState;

type SharedState = State<Arc<AppState>>;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    /// Sign-up accepted but the email must be confirmed before signing in
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub confirmation_required: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProgressQuery {
    #[serde(default)]
    pub batch_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsageView {
    pub premium: bool,
    #[serde(flatten)]
    pub usage: DailyUsage,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn login(State(state): SharedState, Json(credentials): Json<Credentials>) -> Result<Json<SessionView>> {
    let session = state.auth.login(&credentials.email, &credentials.password).await?;
    Ok(Json(SessionView {
        signed_in: true,
        expires_at_ms: Some(session.expires_at_ms),
        user: Some(session.user),
        confirmation_required: false,
    }))
}

pub async fn signup(State(state): SharedState, Json(credentials): Json<Credentials>) -> Result<Json<SessionView>> {
    let view = match state.auth.signup(&credentials.email, &credentials.password).await? {
        Some(session) => SessionView {
            signed_in: true,
            expires_at_ms: Some(session.expires_at_ms),
            user: Some(session.user),
            confirmation_required: false,
        },
        None => SessionView {
            signed_in: false,
            user: None,
            expires_at_ms: None,
            confirmation_required: true,
        },
    };
    Ok(Json(view))
}

pub async fn logout(State(state): SharedState) -> Result<StatusCode> {
    state.auth.logout().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session(State(state): SharedState) -> Json<SessionView> {
    let session = state.auth.session();
    Json(SessionView {
        signed_in: session.is_some(),
        expires_at_ms: session.as_ref().map(|s| s.expires_at_ms),
        user: session.map(|s| s.user),
        confirmation_required: false,
    })
}

pub async fn list_models(State(state): SharedState) -> Json<Vec<ModelDescriptor>> {
    Json(state.generation.catalog().list().to_vec())
}

pub async fn list_styles() -> Json<&'static [StyleCategory]> {
    Json(STYLE_CATEGORIES)
}

pub async fn generate_images(
    State(state): SharedState,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationOutcome>> {
    let user_id = state.current_user_id()?;
    let premium = state.is_premium().await;
    let outcome = state.generation.generate(&user_id, premium, request).await?;
    Ok(Json(outcome))
}

/// Progress of the batch named by `batch_id`, or of the latest batch
pub async fn progress(State(state): SharedState, Query(query): Query<ProgressQuery>) -> Result<Json<ProgressSnapshot>> {
    let reporter = state.generation.progress();
    match query.batch_id.as_deref() {
        Some(batch_id) => reporter
            .get(batch_id)
            .map(|batch| Json(batch.snapshot()))
            .ok_or_else(|| AppError::NotFound(format!("No batch with id {}", batch_id))),
        None => Ok(Json(reporter.latest())),
    }
}

pub async fn list_gallery(State(state): SharedState) -> Result<Json<Vec<CachedImage>>> {
    Ok(Json(state.gallery.list_valid()?))
}

pub async fn save_to_gallery(State(state): SharedState, Json(image): Json<ImageRef>) -> Result<Json<Value>> {
    let url = image.url.trim();
    if url.is_empty() {
        return Err(AppError::Validation("Image URL is required".to_string()));
    }
    let saved = state.gallery.save(url)?;
    Ok(Json(json!({ "saved": saved })))
}

pub async fn delete_from_gallery(State(state): SharedState, Json(image): Json<ImageRef>) -> Result<Json<Value>> {
    let deleted = state.gallery.delete(image.url.trim())?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub async fn list_results(State(state): SharedState) -> Result<Json<Vec<CachedImage>>> {
    Ok(Json(state.results.list_valid()?))
}

pub async fn usage(State(state): SharedState) -> Result<Json<UsageView>> {
    let user_id = state.current_user_id()?;
    let premium = state.is_premium().await;
    Ok(Json(UsageView {
        premium,
        usage: state.usage.usage(&user_id)?,
    }))
}

pub async fn premium_status(State(state): SharedState) -> Result<Json<PremiumStatus>> {
    Ok(Json(state.premium.check().await?))
}

pub async fn start_checkout(
    State(state): SharedState,
    body: Option<Json<CheckoutRequest>>,
) -> Result<Json<CheckoutOutcome>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let plan_id = request
        .plan_id
        .unwrap_or_else(|| state.settings.checkout.plan_id.clone());
    Ok(Json(state.checkout.initiate_checkout(&plan_id).await?))
}

pub async fn confirm_checkout(State(state): SharedState) -> Result<Json<CheckoutOutcome>> {
    let user_id = state.current_user_id()?;
    let outcome = state.checkout.confirm_checkout(&user_id).await?;
    info!(user_id = %user_id, "Checkout confirmation handled");
    Ok(Json(outcome))
}
