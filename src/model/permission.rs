use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A named bundle of permissions (spec §3 Role/Group). Expansion is one
/// level — no recursive roles (spec §4.6 step 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub permissions: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub permissions: HashSet<String>,
}

/// Flat `Map<Name, Set<Permission>>` snapshot used by the authorization
/// evaluator (spec §9 design note: precomputed, never recursive).
#[derive(Debug, Clone, Default)]
pub struct RoleMapping(pub HashMap<String, HashSet<String>>);

#[derive(Debug, Clone, Default)]
pub struct GroupMapping(pub HashMap<String, HashSet<String>>);

impl RoleMapping {
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self(roles.into_iter().map(|r| (r.id, r.permissions)).collect())
    }

    pub fn expand(&self, names: &HashSet<String>) -> HashSet<String> {
        names.iter().filter_map(|n| self.0.get(n)).flatten().cloned().collect()
    }
}

impl GroupMapping {
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        Self(groups.into_iter().map(|g| (g.id, g.permissions)).collect())
    }

    pub fn expand(&self, names: &HashSet<String>) -> HashSet<String> {
        names.iter().filter_map(|n| self.0.get(n)).flatten().cloned().collect()
    }
}

/// `Map<Operation, {anyOfPermissions}>` — per-service access policy
/// (spec §3 PermissionPolicy). `Operation` is an opaque gateway-defined
/// string, e.g. `service.config.update`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionPolicy {
    pub rules: HashMap<String, AnyOfPermissions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnyOfPermissions {
    pub any_of_permissions: HashSet<String>,
}

impl PermissionPolicy {
    pub fn allows(&self, operation: &str, effective_permissions: &HashSet<String>) -> bool {
        match self.rules.get(operation) {
            // operation not enumerated: any authenticated caller passes (spec §4.6 step 4)
            None => true,
            Some(rule) => !rule.any_of_permissions.is_disjoint(effective_permissions),
        }
    }
}
