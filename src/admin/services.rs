use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};

use super::{ApiError, AppState, Page, PageQuery};
use crate::error::GatewayError;
use crate::model::{PermissionPolicy, ServiceRegistration};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services", get(list).post(create))
        .route("/services/{id}", get(get_one).put(update).delete(delete_one))
        .route("/services/{id}/permissions", get(get_permissions).put(put_permissions))
}

async fn create(State(state): State<AppState>, Json(service): Json<ServiceRegistration>) -> Result<Json<ServiceRegistration>, ApiError> {
    Ok(Json(state.registry.create(service).await?))
}

async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ServiceRegistration>, ApiError> {
    state.registry.get(&id).await?.map(Json).ok_or(ApiError(GatewayError::NotFound(id)))
}

async fn list(State(state): State<AppState>, Query(page): Query<PageQuery>) -> Result<Json<Page<ServiceRegistration>>, ApiError> {
    let (items, count) = state.registry.list(page.limit, page.offset).await?;
    Ok(Json(Page { items, count, limit: page.limit, offset: page.offset }))
}

/// Requires `If-Match: <version>` for optimistic concurrency (spec §4.8);
/// missing or malformed header is a precondition failure, mismatched
/// version is a version conflict.
fn expected_version(headers: &HeaderMap) -> Result<u64, ApiError> {
    headers
        .get("if-match")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ApiError(GatewayError::PreconditionFailed("missing or invalid If-Match header".into())))
}

#[derive(serde::Deserialize)]
struct ServiceUpdate {
    display_name: Option<String>,
    base_url: Option<String>,
    default_auth_required: Option<bool>,
}

async fn update(State(state): State<AppState>, Path(id): Path<String>, headers: HeaderMap, Json(patch): Json<ServiceUpdate>) -> Result<Json<ServiceRegistration>, ApiError> {
    let expected = expected_version(&headers)?;
    let updated = state
        .registry
        .update(
            &id,
            expected,
            crate::store::ServicePatch {
                display_name: patch.display_name,
                base_url: patch.base_url,
                default_auth_required: patch.default_auth_required,
                permission_policy: None,
            },
        )
        .await?;
    Ok(Json(updated))
}

async fn delete_one(State(state): State<AppState>, Path(id): Path<String>) -> Result<axum::http::StatusCode, ApiError> {
    state.registry.delete(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn get_permissions(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PermissionPolicy>, ApiError> {
    let service = state.registry.get(&id).await?.ok_or(GatewayError::NotFound(id))?;
    Ok(Json(service.permission_policy.unwrap_or_default()))
}

async fn put_permissions(State(state): State<AppState>, Path(id): Path<String>, headers: HeaderMap, Json(policy): Json<PermissionPolicy>) -> Result<Json<ServiceRegistration>, ApiError> {
    let expected = expected_version(&headers)?;
    let updated = state
        .registry
        .update(&id, expected, crate::store::ServicePatch { permission_policy: Some(policy), ..Default::default() })
        .await?;
    Ok(Json(updated))
}
