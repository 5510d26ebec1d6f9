use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};

use super::{ApiError, AppState};
use crate::model::{ConfigSchema, ExternalClaims, TranslationConfigVersion, TranslationResult};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/translation-config", post(upload).get(list))
        .route("/translation-config/active", get(active))
        .route("/translation-config/status", get(status))
        .route("/translation-config/{id}", get(find_by_id).delete(delete_one))
        .route("/translation-config/{id}/activate", put(activate))
        .route("/translation-config/rollback/{version}", post(rollback))
        .route("/translation-config/validate", post(validate))
        .route("/translation-config/test", post(test))
        .route("/translation-config/cache/invalidate", post(invalidate_cache))
}

#[derive(serde::Deserialize)]
struct UploadRequest {
    config_schema: ConfigSchema,
    created_by: String,
    comment: Option<String>,
}

async fn upload(State(state): State<AppState>, Json(req): Json<UploadRequest>) -> Result<Json<TranslationConfigVersion>, ApiError> {
    Ok(Json(state.translator.upload(req.config_schema, req.created_by, req.comment).await?))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<TranslationConfigVersion>>, ApiError> {
    Ok(Json(state.translator.list().await?))
}

async fn active(State(state): State<AppState>) -> Result<Json<Option<TranslationConfigVersion>>, ApiError> {
    Ok(Json(state.translator.get_active().await?))
}

#[derive(serde::Serialize)]
struct StatusResponse {
    active_version: Option<u64>,
    cached_entries: usize,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let active = state.translator.get_active().await?;
    Ok(Json(StatusResponse { active_version: active.map(|c| c.version), cached_entries: state.translator.cache_len() }))
}

async fn find_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<TranslationConfigVersion>, ApiError> {
    state.translator.find_by_id(&id).await?.map(Json).ok_or(ApiError(crate::error::GatewayError::NotFound(id)))
}

async fn delete_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<axum::http::StatusCode, ApiError> {
    state.translator.delete(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn activate(State(state): State<AppState>, Path(id): Path<String>) -> Result<axum::http::StatusCode, ApiError> {
    state.translator.activate(&id).await?;
    Ok(axum::http::StatusCode::OK)
}

async fn rollback(State(state): State<AppState>, Path(version): Path<u64>) -> Result<Json<TranslationConfigVersion>, ApiError> {
    Ok(Json(state.translator.rollback(version).await?))
}

async fn validate(State(state): State<AppState>, Json(schema): Json<ConfigSchema>) -> Result<axum::http::StatusCode, ApiError> {
    state.translator.validate(&schema)?;
    Ok(axum::http::StatusCode::OK)
}

#[derive(serde::Deserialize)]
struct TestRequest {
    external: ExternalClaims,
    config_schema: Option<ConfigSchema>,
}

async fn test(State(state): State<AppState>, Json(req): Json<TestRequest>) -> Result<Json<TranslationResult>, ApiError> {
    Ok(Json(state.translator.test(&req.external, req.config_schema.as_ref()).await?))
}

async fn invalidate_cache(State(state): State<AppState>) -> axum::http::StatusCode {
    state.translator.cache_invalidate();
    axum::http::StatusCode::OK
}
