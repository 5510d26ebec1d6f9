use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::permission::PermissionPolicy;

/// PUBLIC endpoints bypass network allowlists; PRIVATE endpoints require
/// them (spec GLOSSARY "Visibility").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Http,
    WebSocket,
}

/// Per-endpoint rate-limit override (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_window: u64,
    pub window_secs: u64,
    pub burst_capacity: u64,
}

/// Routing-match rule evaluated after endpoint matching fails (spec §4.1
/// step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub pattern: String,
    pub methods: Vec<String>,
    pub visibility: Visibility,
}

/// A single routable operation on a backend service (spec §3
/// ServiceRegistration.endpoints).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub methods: Vec<String>,
    pub visibility: Visibility,
    pub path_rewrite: Option<String>,
    pub auth_required: Option<bool>,
    pub endpoint_type: EndpointType,
    pub rate_limit: Option<RateLimitConfig>,
}

impl Endpoint {
    /// `*` matches any method; WEBSOCKET endpoints accept only GET/`*`
    /// (the HTTP upgrade) per spec §4.1 step 2.
    pub fn accepts_method(&self, method: &str) -> bool {
        if self.endpoint_type == EndpointType::WebSocket {
            return self.methods.iter().any(|m| m == "*" || m == "GET")
                && (method.eq_ignore_ascii_case("GET") || method == "*");
        }
        self.methods.iter().any(|m| m == "*" || m.eq_ignore_ascii_case(method))
    }
}

/// IP/domain/subdomain allowlists gating PRIVATE visibility (spec §4.1).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub allowed_ips: Vec<String>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub allowed_subdomains: Vec<String>,
}

impl AccessConfig {
    pub fn is_empty(&self) -> bool {
        self.allowed_ips.is_empty() && self.allowed_domains.is_empty() && self.allowed_subdomains.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
}

/// A registered backend service: routing + policy (spec §3
/// ServiceRegistration).
///
/// `version` strictly increases on every mutation; concurrent updates use
/// optimistic locking on `version` (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub service_id: String,
    pub display_name: String,
    pub base_url: String,
    pub route_prefix: Option<String>,
    pub default_visibility: Visibility,
    pub default_auth_required: bool,
    pub visibility_rules: Vec<VisibilityRule>,
    pub endpoints: Vec<Endpoint>,
    pub access_config: Option<AccessConfig>,
    pub cors_config: Option<CorsConfig>,
    pub permission_policy: Option<PermissionPolicy>,
    pub rate_limit_config: Option<RateLimitConfig>,
    pub version: u64,
}

impl ServiceRegistration {
    pub fn new(service_id: impl Into<String>, display_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            display_name: display_name.into(),
            base_url: base_url.into(),
            route_prefix: None,
            default_visibility: Visibility::Public,
            default_auth_required: true,
            visibility_rules: Vec::new(),
            endpoints: Vec::new(),
            access_config: None,
            cors_config: None,
            permission_policy: None,
            rate_limit_config: None,
            version: 1,
        }
    }
}

/// Post-match routing outcome: the chosen visibility/auth requirement and,
/// if an endpoint matched, the rewritten path (spec §4.1 step 5).
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub service_id: String,
    pub endpoint: Option<Endpoint>,
    pub visibility: Visibility,
    pub auth_required: bool,
    pub rewritten_path: String,
}

pub type ServiceMap = HashMap<String, ServiceRegistration>;
