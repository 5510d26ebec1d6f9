use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{ApiError, AppState};
use crate::auth::token;
use crate::error::GatewayError;
use crate::model::RevocationEntry;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tokens", get(list))
        .route("/tokens/revoke", post(revoke))
        .route("/tokens/{jti}", axum::routing::delete(delete_token))
        .route("/tokens/{jti}/status", get(status))
        .route("/tokens/users", get(list_user_revocations))
        .route("/tokens/users/{user_id}", axum::routing::delete(delete_user))
        .route("/tokens/bloom-filter/rebuild", post(rebuild_bloom))
        .route("/tokens/inspect", post(inspect))
}

#[derive(serde::Deserialize)]
struct RevokeRequest {
    token: Option<String>,
    jti: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

async fn revoke(State(state): State<AppState>, Json(req): Json<RevokeRequest>) -> Result<axum::http::StatusCode, ApiError> {
    let jti = if let Some(jti) = req.jti {
        jti
    } else if let Some(t) = req.token {
        token::decode(&t).map_err(|_| GatewayError::InvalidInput("malformed token".into()))?.claims.jti
    } else {
        return Err(ApiError(GatewayError::InvalidInput("either token or jti is required".into())));
    };
    state.credentials.revoke_token(jti, chrono::Utc::now() + chrono::Duration::hours(24), req.reason).await?;
    state.revocation_gate.rebuild_bloom().await?;
    Ok(axum::http::StatusCode::OK)
}

async fn delete_token(State(state): State<AppState>, Path(jti): Path<String>) -> Result<axum::http::StatusCode, ApiError> {
    if state.credentials.delete_token_revocation(&jti).await? {
        state.revocation_gate.rebuild_bloom().await?;
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(GatewayError::NotFound(jti)))
    }
}

async fn delete_user(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<axum::http::StatusCode, ApiError> {
    if state.credentials.delete_user_revocation(&user_id).await? {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(GatewayError::NotFound(user_id)))
    }
}

#[derive(serde::Serialize)]
struct TokenStatus {
    revoked: bool,
}

async fn status(State(state): State<AppState>, Path(jti): Path<String>) -> Result<Json<TokenStatus>, ApiError> {
    Ok(Json(TokenStatus { revoked: state.credentials.is_token_revoked(&jti).await? }))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<RevocationEntry>>, ApiError> {
    let all = state.credentials.list_revocations().await?;
    Ok(Json(all.into_iter().filter(|e| matches!(e, RevocationEntry::Token { .. })).collect()))
}

async fn list_user_revocations(State(state): State<AppState>) -> Result<Json<Vec<RevocationEntry>>, ApiError> {
    let all = state.credentials.list_revocations().await?;
    Ok(Json(all.into_iter().filter(|e| matches!(e, RevocationEntry::User { .. })).collect()))
}

async fn rebuild_bloom(State(state): State<AppState>) -> Result<axum::http::StatusCode, ApiError> {
    state.revocation_gate.rebuild_bloom().await?;
    Ok(axum::http::StatusCode::OK)
}

#[derive(serde::Deserialize)]
struct InspectRequest {
    token: String,
}

async fn inspect(Json(req): Json<InspectRequest>) -> Result<Json<token::TokenClaims>, ApiError> {
    Ok(Json(token::decode(&req.token).map_err(|_| GatewayError::InvalidInput("malformed token".into()))?.claims))
}
