use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::{ApiError, AppState};
use crate::error::GatewayError;
use crate::model::{LockoutEntry, LockoutScope};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lockouts", get(list))
        .route("/lockouts/{scope}/{value}", get(get_one).delete(delete_one))
        .route("/lockouts:reset", post(reset))
}

fn parse_scope(scope: &str, value: &str) -> Result<LockoutScope, ApiError> {
    match scope {
        "ip" => Ok(LockoutScope::Ip(value.to_string())),
        "user" => Ok(LockoutScope::User(value.to_string())),
        "apikey" => Ok(LockoutScope::ApiKey(value.to_string())),
        other => Err(ApiError(GatewayError::InvalidInput(format!("unknown lockout scope {other}")))),
    }
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<LockoutEntry>>, ApiError> {
    Ok(Json(state.revocation_gate.list_lockouts().await?))
}

async fn get_one(State(state): State<AppState>, Path((scope, value)): Path<(String, String)>) -> Result<Json<Option<LockoutEntry>>, ApiError> {
    let scope = parse_scope(&scope, &value)?;
    Ok(Json(state.revocation_gate.get_lockout(&scope).await?))
}

#[derive(serde::Deserialize, Default)]
struct DeleteBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn delete_one(State(state): State<AppState>, Path((scope, value)): Path<(String, String)>, body: Option<Json<DeleteBody>>) -> Result<axum::http::StatusCode, ApiError> {
    let scope = parse_scope(&scope, &value)?;
    let _reason = body.map(|b| b.0.reason).unwrap_or_default();
    if state.revocation_gate.reset_lockout(&scope, false).await? {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(GatewayError::NotFound(scope.to_string())))
    }
}

#[derive(serde::Deserialize)]
struct ResetRequest {
    scope: String,
    value: String,
    #[serde(default)]
    force: bool,
}

async fn reset(State(state): State<AppState>, Json(req): Json<ResetRequest>) -> Result<axum::http::StatusCode, ApiError> {
    let scope = parse_scope(&req.scope, &req.value)?;
    state.revocation_gate.reset_lockout(&scope, req.force).await?;
    Ok(axum::http::StatusCode::OK)
}
