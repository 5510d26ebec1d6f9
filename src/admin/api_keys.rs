use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use std::collections::HashSet;

use super::{ApiError, AppState, Page, PageQuery};
use crate::model::ApiKey;

pub fn router() -> Router<AppState> {
    Router::new().route("/api-keys", get(list).post(create)).route("/api-keys/{id}", axum::routing::delete(delete_one))
}

#[derive(serde::Deserialize)]
struct CreateApiKey {
    name: String,
    description: String,
    #[serde(default)]
    permissions: HashSet<String>,
    ttl_secs: Option<i64>,
}

/// The plaintext key is emitted exactly once, in this response (spec §3,
/// §4.8).
#[derive(serde::Serialize)]
struct CreatedApiKey {
    #[serde(flatten)]
    key: ApiKey,
    plaintext: String,
}

async fn create(State(state): State<AppState>, Json(req): Json<CreateApiKey>) -> Result<Json<CreatedApiKey>, ApiError> {
    let (key, plaintext) = state
        .credentials
        .create_api_key(req.name, req.description, req.permissions, req.ttl_secs.map(chrono::Duration::seconds))
        .await?;
    Ok(Json(CreatedApiKey { key, plaintext }))
}

async fn list(State(state): State<AppState>, Query(page): Query<PageQuery>) -> Result<Json<Page<ApiKey>>, ApiError> {
    let (items, count) = state.credentials.list_api_keys(page.limit, page.offset).await?;
    Ok(Json(Page { items, count, limit: page.limit, offset: page.offset }))
}

async fn delete_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<axum::http::StatusCode, ApiError> {
    state.credentials.delete_api_key(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
