// Router match algorithm (spec §4.1), with a deterministic tie-break order:
// 1. filter by baseUrl+routePrefix match, 2. endpoints[] in declaration
// order, 3. visibilityRules[] in declaration order, 4. default fallback,
// 5. apply pathRewrite. Grounded on the teacher's `api/gateway/core.rs`
// `find_route`/`matches_path_pattern` wildcard matcher, extended with the
// registration-level prefix filter and visibility-rule fallback the spec
// adds.

use std::net::IpAddr;

use crate::error::{GatewayError, Result};
use crate::model::{AccessConfig, RouteMatch, ServiceRegistration, Visibility};
use crate::registry::Registry;

pub struct Router<'a> {
    registry: &'a Registry,
}

impl<'a> Router<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    pub async fn route(&self, host_and_prefix: &str, method: &str, path: &str, client_ip: IpAddr) -> Result<RouteMatch> {
        let services = self.registry.all().await?;

        let service = services
            .into_iter()
            .find(|s| host_and_prefix.starts_with(&s.base_url))
            .ok_or_else(|| GatewayError::NotFound(format!("no service registered for {host_and_prefix}")))?;

        let remaining_path = match service.route_prefix.as_deref() {
            Some(prefix) => path.strip_prefix(prefix).unwrap_or(path),
            None => path,
        };
        let matched = Self::match_within_service(&service, method, remaining_path)?;

        if matched.visibility == Visibility::Private {
            Self::check_access(service.access_config.as_ref(), client_ip)?;
        }

        Ok(matched)
    }

    fn match_within_service(service: &ServiceRegistration, method: &str, remaining_path: &str) -> Result<RouteMatch> {
        // step 2: endpoints in declaration order, first match wins.
        for endpoint in &service.endpoints {
            if Self::path_matches(&endpoint.path, remaining_path) && endpoint.accepts_method(method) {
                let rewritten_path = Self::apply_rewrite(endpoint.path_rewrite.as_deref(), remaining_path);
                return Ok(RouteMatch {
                    service_id: service.service_id.clone(),
                    auth_required: endpoint.auth_required.unwrap_or(service.default_auth_required),
                    visibility: endpoint.visibility,
                    endpoint: Some(endpoint.clone()),
                    rewritten_path,
                });
            }
        }

        // step 3: visibility rules in declaration order, first match wins.
        for rule in &service.visibility_rules {
            if Self::path_matches(&rule.pattern, remaining_path) && rule.methods.iter().any(|m| m == "*" || m.eq_ignore_ascii_case(method)) {
                return Ok(RouteMatch {
                    service_id: service.service_id.clone(),
                    auth_required: service.default_auth_required,
                    visibility: rule.visibility,
                    endpoint: None,
                    rewritten_path: remaining_path.to_string(),
                });
            }
        }

        // step 4: fall back to service defaults.
        Ok(RouteMatch {
            service_id: service.service_id.clone(),
            auth_required: service.default_auth_required,
            visibility: service.default_visibility,
            endpoint: None,
            rewritten_path: remaining_path.to_string(),
        })
    }

    /// Simple wildcard path matcher: exact match, or `*` as a single-segment
    /// or trailing-segment wildcard, as the teacher's `matches_path_pattern`
    /// does for routes.
    fn path_matches(pattern: &str, path: &str) -> bool {
        if pattern == path {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            return path == prefix || path.starts_with(&format!("{prefix}/"));
        }
        if !pattern.contains('*') {
            return false;
        }
        let parts: Vec<&str> = pattern.split('*').collect();
        let mut remaining = path;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                if !remaining.starts_with(part) {
                    return false;
                }
                remaining = &remaining[part.len()..];
            } else if let Some(pos) = remaining.find(part) {
                remaining = &remaining[pos + part.len()..];
            } else {
                return false;
            }
        }
        true
    }

    fn apply_rewrite(rewrite: Option<&str>, remaining_path: &str) -> String {
        match rewrite {
            Some(r) => r.to_string(),
            None => remaining_path.to_string(),
        }
    }

    fn check_access(access: Option<&AccessConfig>, client_ip: IpAddr) -> Result<()> {
        let Some(access) = access else { return Ok(()) };
        if access.is_empty() {
            return Ok(());
        }
        let ip_ok = access.allowed_ips.iter().any(|ip| ip == &client_ip.to_string());
        if ip_ok {
            return Ok(());
        }
        Err(GatewayError::Forbidden("client address not in access allowlist".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, EndpointType, ServiceRegistration};
    use crate::store::{InMemoryServiceStore, ServiceStore};

    async fn fixture() -> Registry {
        let store = InMemoryServiceStore::new();
        let mut service = ServiceRegistration::new("payments", "Payments", "gw.local");
        service.route_prefix = Some("/payments".into());
        service.endpoints.push(Endpoint {
            path: "/charges/*".into(),
            methods: vec!["POST".into()],
            visibility: Visibility::Private,
            path_rewrite: None,
            auth_required: Some(true),
            endpoint_type: EndpointType::Http,
            rate_limit: None,
        });
        store.create(service).await.unwrap();
        Registry::new(store)
    }

    #[tokio::test]
    async fn routing_is_a_pure_function_of_method_and_path() {
        let registry = fixture().await;
        let router = Router::new(&registry);
        let ip: IpAddr = "10.0.0.5".parse().unwrap();

        let m1 = router.route("gw.local/payments", "POST", "/payments/charges/123", ip).await.unwrap();
        let m2 = router.route("gw.local/payments", "POST", "/payments/charges/123", ip).await.unwrap();
        assert_eq!(m1.service_id, m2.service_id);
        assert_eq!(m1.rewritten_path, m2.rewritten_path);
        assert_eq!(m1.visibility, m2.visibility);
    }

    #[tokio::test]
    async fn private_endpoint_with_no_access_config_allows_any_ip() {
        let registry = fixture().await;
        let router = Router::new(&registry);
        let ip: IpAddr = "10.0.0.5".parse().unwrap();
        let m = router.route("gw.local/payments", "POST", "/payments/charges/123", ip).await.unwrap();
        assert_eq!(m.visibility, Visibility::Private);
    }
}
