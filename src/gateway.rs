// The pipeline orchestrator (spec §2): ties C2/C5/C6/C7/C9/C10 together in
// the declared order. Upstream dispatch itself is out of scope (spec §1
// Non-goals); `handle` returns a `Decision` a caller uses to forward the
// request.

use std::net::IpAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::instrument;

use crate::auth::Authenticator;
use crate::authz::AuthorizationEvaluator;
use crate::error::Result;
use crate::model::{CorsConfig, ExternalClaims, LockoutScope, Principal, RouteMatch};
use crate::ratelimit::{BucketKey, BucketScope, RateLimiter};
use crate::registry::{Registry, Router};
use crate::revocation::RevocationLockoutGate;
use crate::translate::Translator;

/// A request description sufficient to drive the pipeline; the HTTP-layer
/// concerns of actually parsing this out of an inbound request belong to
/// the transport binding (`main.rs`), not this crate's core.
pub struct IngressRequest {
    pub host_and_prefix: String,
    pub method: String,
    pub path: String,
    pub client_ip: IpAddr,
    pub bearer_credential: Option<String>,
    pub operation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub route: String,
    pub principal_subject: Option<String>,
    /// The matched service's CORS policy, translated into a `tower-http`
    /// layer the actual upstream-dispatch proxy (out of scope here, spec
    /// §1 Non-goals) applies to the response it sends back.
    pub cors: Option<CorsLayer>,
}

/// Translates a `ServiceRegistration.cors_config` (spec §3) into a
/// `tower_http::cors::CorsLayer`. Empty `allowed_origins` disables cross-origin
/// access entirely rather than falling back to `Any`, since an explicit
/// per-service allowlist is the whole point of the field.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<_> = config.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_credentials(config.allow_credentials)
}

pub struct Gateway {
    pub registry: Arc<Registry>,
    pub authenticator: Arc<Authenticator>,
    pub translator: Arc<Translator>,
    pub revocation_gate: Arc<RevocationLockoutGate>,
    pub authorizer: Arc<AuthorizationEvaluator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub default_rate_limit: crate::model::RateLimitConfig,
}

impl Gateway {
    /// Executes the happy path from spec §2: router -> lockout-check ->
    /// authenticator -> translator(cache) -> lockout-check -> revocation-check
    /// -> authorizer -> rate-limiter -> (dispatch, left to the caller).
    ///
    /// The IP-scope lockout check runs before authentication, not after: a
    /// locked-out caller must be rejected as `LockedOut` even when the
    /// credential it presents would otherwise fail first and short-circuit
    /// via `authenticate`'s `?` (spec §8 property 7, scenario S4). The
    /// second check, once a principal is known, also covers the user scope.
    #[instrument(skip(self, request), fields(path = %request.path))]
    pub async fn handle(&self, request: IngressRequest) -> Result<Decision> {
        let route_match = Router::new(&self.registry).route(&request.host_and_prefix, &request.method, &request.path, request.client_ip).await?;

        self.check_lockout(&request, None).await?;

        let principal = self.authenticate(&request, &route_match).await?;

        if let Some(principal) = &principal {
            self.translate_claims_into_principal(principal).await.ok();
            self.check_lockout(&request, Some(principal)).await?;
        }

        self.check_revocation(principal.as_ref()).await?;

        let service = self.registry.get(&route_match.service_id).await?.ok_or_else(|| crate::error::GatewayError::NotFound(route_match.service_id.clone()))?;
        self.authorizer.evaluate(principal.as_ref(), &service, route_match.endpoint.as_ref(), route_match.auth_required, request.operation.as_deref()).await?;

        self.check_rate_limit(&route_match, &request, principal.as_ref())?;

        let cors = service.cors_config.as_ref().map(cors_layer);
        Ok(Decision { route: route_match.rewritten_path, principal_subject: principal.map(|p| p.subject), cors })
    }

    async fn authenticate(&self, request: &IngressRequest, route_match: &RouteMatch) -> Result<Option<Principal>> {
        match &request.bearer_credential {
            Some(credential) => Ok(Some(self.authenticator.authenticate(credential, request.client_ip).await?)),
            None => {
                if route_match.auth_required {
                    Err(crate::error::GatewayError::Unauthenticated("missing credential".into()))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// For token principals carrying un-expanded identity-provider claims,
    /// this crate's demo wiring treats `effective_permissions` as already
    /// translated at token-issue time; a real deployment would instead call
    /// `Translator::translate` here against the raw IdP claims before they
    /// are baked into the token. Exposed for that integration point.
    async fn translate_claims_into_principal(&self, principal: &Principal) -> Result<()> {
        if principal.effective_permissions.is_empty() {
            let external = ExternalClaims { issuer: principal.issuer.clone(), subject: principal.subject.clone(), claims: Default::default() };
            self.translator.translate(&external).await?;
        }
        Ok(())
    }

    async fn check_lockout(&self, request: &IngressRequest, principal: Option<&Principal>) -> Result<()> {
        let mut scopes = vec![LockoutScope::Ip(request.client_ip.to_string())];
        if let Some(p) = principal {
            scopes.push(LockoutScope::User(p.subject.clone()));
        }
        self.revocation_gate.check_lockout(&scopes).await
    }

    async fn check_revocation(&self, principal: Option<&Principal>) -> Result<()> {
        let Some(principal) = principal else { return Ok(()) };
        if let Some(jti) = &principal.token_id {
            self.revocation_gate.check_token_revocation(jti).await?;
        }
        if let Some(issued_at) = principal.issued_at {
            self.revocation_gate.check_user_revocation(&principal.subject, issued_at).await?;
        }
        Ok(())
    }

    fn check_rate_limit(&self, route_match: &RouteMatch, request: &IngressRequest, principal: Option<&Principal>) -> Result<()> {
        let identity = principal.map(|p| p.subject.clone()).unwrap_or_else(|| request.client_ip.to_string());
        let (scope, config) = match &route_match.endpoint {
            Some(endpoint) if endpoint.endpoint_type == crate::model::EndpointType::WebSocket => {
                (BucketScope::WebSocketConnect(endpoint.path.clone()), endpoint.rate_limit.clone().unwrap_or_else(|| self.default_rate_limit.clone()))
            }
            Some(endpoint) => (BucketScope::Endpoint(endpoint.path.clone()), endpoint.rate_limit.clone().unwrap_or_else(|| self.default_rate_limit.clone())),
            None => (BucketScope::ServiceDefault, self.default_rate_limit.clone()),
        };
        let key = BucketKey { service_id: route_match.service_id.clone(), scope, identity };
        self.rate_limiter.check(key, &config)
    }

    /// Consumes one token from the per-message bucket of an
    /// already-established WebSocket connection (spec §4.7). The live
    /// message loop itself is transport-binding territory (out of scope,
    /// spec §1 Non-goals); this is the hook it calls once per inbound
    /// message after `handle` has admitted the connection.
    pub fn check_websocket_message_rate_limit(&self, service_id: &str, endpoint_path: &str, identity: &str, config: &crate::model::RateLimitConfig) -> Result<()> {
        let key = BucketKey {
            service_id: service_id.to_string(),
            scope: BucketScope::WebSocketMessage(endpoint_path.to_string()),
            identity: identity.to_string(),
        };
        self.rate_limiter.check(key, config)
    }
}
