use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{ApiError, AppState};
use crate::keys::{KeyHealth, VerificationKeySet};
use crate::model::SigningKey;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/keys", get(list))
        .route("/keys/{id}", get(get_one).delete(retire))
        .route("/keys/rotate", post(rotate))
        .route("/keys/{id}/deprecate", post(deprecate))
        .route("/keys/health", get(health))
        .route("/.well-known/verification-key-set", get(verification_key_set))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<SigningKey>>, ApiError> {
    Ok(Json(state.key_manager.all_verify_keys().await?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SigningKey>, ApiError> {
    state.key_manager.find_verify_key(&id).await?.map(Json).ok_or(ApiError(crate::error::GatewayError::NotFound(id)))
}

#[derive(serde::Deserialize)]
struct RotateRequest {
    reason: String,
}

async fn rotate(State(state): State<AppState>, Json(req): Json<RotateRequest>) -> Result<Json<SigningKey>, ApiError> {
    Ok(Json(state.key_manager.rotate(&req.reason).await?))
}

async fn deprecate(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SigningKey>, ApiError> {
    Ok(Json(state.key_manager.deprecate(&id).await?))
}

#[derive(serde::Deserialize)]
struct ForceQuery {
    #[serde(default)]
    force: bool,
}

async fn retire(State(state): State<AppState>, Path(id): Path<String>, Query(q): Query<ForceQuery>) -> Result<Json<SigningKey>, ApiError> {
    Ok(Json(state.key_manager.retire(&id, q.force).await?))
}

async fn health(State(state): State<AppState>) -> Json<KeyHealth> {
    Json(state.key_manager.health().await)
}

async fn verification_key_set(State(state): State<AppState>) -> Json<VerificationKeySet> {
    Json((*state.key_manager.verification_key_set()).clone())
}
