// C11: admin API (spec §4.8, §6 "Admin surface"). Mutations carry an
// If-Match version for optimistic concurrency (412/409 on conflict); list
// endpoints accept limit/offset and echo count+limit; plaintext secrets are
// emitted exactly once at creation.

mod api_keys;
mod lockouts;
mod services;
mod signing_keys;
mod tokens;
mod translation_config;

use axum::Router;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::authz::AuthorizationEvaluator;
use crate::keys::KeyManager;
use crate::ratelimit::RateLimiter;
use crate::registry::Registry;
use crate::revocation::RevocationLockoutGate;
use crate::store::{CredentialStore, RoleStore};
use crate::translate::Translator;

/// Shared dependencies for every admin handler. Grounded on the teacher's
/// `ApiGateway` struct (`api/gateway/core.rs`), which bundles the same set
/// of managers behind `Arc`s for axum extraction.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub authenticator: Arc<Authenticator>,
    pub authorizer: Arc<AuthorizationEvaluator>,
    pub translator: Arc<Translator>,
    pub revocation_gate: Arc<RevocationLockoutGate>,
    pub key_manager: Arc<KeyManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub credentials: Arc<dyn CredentialStore>,
    pub roles: Arc<dyn RoleStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(services::router())
        .merge(api_keys::router())
        .merge(signing_keys::router())
        .merge(translation_config::router())
        .merge(tokens::router())
        .merge(lockouts::router())
        .with_state(state)
}

/// Pagination echoed back on every list response (spec §4.8).
#[derive(serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(serde::Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

pub struct ApiError(pub crate::error::GatewayError);

impl From<crate::error::GatewayError> for ApiError {
    fn from(e: crate::error::GatewayError) -> Self {
        ApiError(e)
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.0.status_code()).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
