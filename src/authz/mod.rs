// C9: authorization evaluator (spec §4.6). Pure set algebra over opaque
// permission strings — no hierarchical prefix matching, no recursive role
// expansion. Grounded on the teacher's `api/gateway/authz.rs`
// `AuthorizationEngine`/`RbacManager`, narrowed from full RBAC+ABAC+policy
// engine down to the one-level expansion the spec calls for.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::model::{Endpoint, GroupMapping, Principal, RoleMapping, ServiceRegistration};
use crate::store::RoleStore;

pub struct AuthorizationEvaluator {
    roles: Arc<dyn RoleStore>,
}

impl AuthorizationEvaluator {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    /// `role:<name>` / `group:<name>` pseudo-permissions are how the
    /// authenticator (C5) carries token role/group claims through to here
    /// without a second token parse; this expands them into real
    /// permissions and discards the markers.
    async fn effective_permissions(&self, principal: &Principal) -> Result<HashSet<String>> {
        let role_mapping = RoleMapping::from_roles(self.roles.all_roles().await?);
        let group_mapping = GroupMapping::from_groups(self.roles.all_groups().await?);

        let mut role_names = HashSet::new();
        let mut group_names = HashSet::new();
        let mut direct = HashSet::new();
        for permission in &principal.effective_permissions {
            if let Some(name) = permission.strip_prefix("role:") {
                role_names.insert(name.to_string());
            } else if let Some(name) = permission.strip_prefix("group:") {
                group_names.insert(name.to_string());
            } else {
                direct.insert(permission.clone());
            }
        }

        direct.extend(role_mapping.expand(&role_names));
        direct.extend(group_mapping.expand(&group_names));
        Ok(direct)
    }

    /// Evaluates the service's permission policy against the principal for
    /// the matched endpoint (spec §4.6 steps 1-4).
    pub async fn evaluate(&self, principal: Option<&Principal>, service: &ServiceRegistration, _endpoint: Option<&Endpoint>, auth_required: bool, operation: Option<&str>) -> Result<()> {
        let Some(principal) = principal else {
            return if auth_required {
                Err(GatewayError::Unauthenticated("no principal".into()))
            } else {
                Ok(())
            };
        };

        let effective = self.effective_permissions(principal).await?;

        if let Some(policy) = &service.permission_policy {
            if let Some(operation) = operation {
                if !policy.allows(operation, &effective) {
                    return Err(GatewayError::Forbidden(operation.to_string()));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnyOfPermissions, PermissionPolicy, PrincipalSource, Role, ServiceRegistration};
    use crate::store::InMemoryRoleStore;

    fn principal(perms: &[&str]) -> Principal {
        Principal {
            subject: "alice".into(),
            issuer: "idp".into(),
            effective_permissions: perms.iter().map(|s| s.to_string()).collect(),
            token_id: None,
            expires_at: None,
            source: PrincipalSource::Token,
            issued_at: None,
        }
    }

    #[tokio::test]
    async fn insufficient_permissions_then_granted_after_adding_the_required_one() {
        let roles = InMemoryRoleStore::new();
        let evaluator = AuthorizationEvaluator::new(roles);

        let mut service = ServiceRegistration::new("payments", "Payments", "gw.local");
        let mut rules = std::collections::HashMap::new();
        rules.insert("service.config.update".to_string(), AnyOfPermissions { any_of_permissions: ["payments.admin".to_string()].into() });
        service.permission_policy = Some(PermissionPolicy { rules });

        let reader = principal(&["payments.reader"]);
        let err = evaluator.evaluate(Some(&reader), &service, None, true, Some("service.config.update")).await;
        assert!(matches!(err, Err(crate::error::GatewayError::Forbidden(_))));

        let admin = principal(&["payments.admin"]);
        assert!(evaluator.evaluate(Some(&admin), &service, None, true, Some("service.config.update")).await.is_ok());
    }

    #[tokio::test]
    async fn role_expansion_is_one_level() {
        let roles = InMemoryRoleStore::new();
        roles.put_role(Role { id: "billing-admin".into(), display_name: None, description: None, permissions: ["payments.admin".to_string()].into() }).await.unwrap();
        let evaluator = AuthorizationEvaluator::new(roles);

        let mut service = ServiceRegistration::new("payments", "Payments", "gw.local");
        let mut rules = std::collections::HashMap::new();
        rules.insert("service.config.update".to_string(), AnyOfPermissions { any_of_permissions: ["payments.admin".to_string()].into() });
        service.permission_policy = Some(PermissionPolicy { rules });

        let principal = principal(&["role:billing-admin"]);
        assert!(evaluator.evaluate(Some(&principal), &service, None, true, Some("service.config.update")).await.is_ok());
    }

    #[tokio::test]
    async fn unauthenticated_when_auth_required_and_no_principal() {
        let roles = InMemoryRoleStore::new();
        let evaluator = AuthorizationEvaluator::new(roles);
        let service = ServiceRegistration::new("payments", "Payments", "gw.local");
        let err = evaluator.evaluate(None, &service, None, true, None).await;
        assert!(matches!(err, Err(crate::error::GatewayError::Unauthenticated(_))));
    }
}
