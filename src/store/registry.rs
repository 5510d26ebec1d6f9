use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::model::{PermissionPolicy, ServiceRegistration};

/// Field-level patch for a conditional service update. `None` fields are
/// left untouched; this replaces a closure-based callback, which doesn't
/// play well with `async_trait`'s boxed-future desugaring across trait
/// objects.
#[derive(Default)]
pub struct ServicePatch {
    pub display_name: Option<String>,
    pub base_url: Option<String>,
    pub default_auth_required: Option<bool>,
    pub permission_policy: Option<PermissionPolicy>,
}

impl ServicePatch {
    fn apply(self, service: &mut ServiceRegistration) {
        if let Some(display_name) = self.display_name {
            service.display_name = display_name;
        }
        if let Some(base_url) = self.base_url {
            service.base_url = base_url;
        }
        if let Some(default_auth_required) = self.default_auth_required {
            service.default_auth_required = default_auth_required;
        }
        if let Some(permission_policy) = self.permission_policy {
            service.permission_policy = Some(permission_policy);
        }
    }
}

/// C2: persists service registrations keyed by `service_id` with a
/// monotonic `version` (spec §3, §4.1).
#[async_trait]
pub trait ServiceStore: Send + Sync {
    async fn create(&self, service: ServiceRegistration) -> Result<ServiceRegistration>;
    async fn get(&self, service_id: &str) -> Result<Option<ServiceRegistration>>;
    /// Conditional write: succeeds only if `expected_version` matches the
    /// stored version, else `VersionConflict` (spec §4.1 Update contract).
    async fn update(&self, service_id: &str, expected_version: u64, patch: ServicePatch) -> Result<ServiceRegistration>;
    async fn delete(&self, service_id: &str) -> Result<()>;
    async fn list(&self, limit: usize, offset: usize) -> Result<(Vec<ServiceRegistration>, usize)>;
    async fn count(&self) -> Result<usize>;
}

#[derive(Default)]
pub struct InMemoryServiceStore {
    services: DashMap<String, ServiceRegistration>,
}

impl InMemoryServiceStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ServiceStore for InMemoryServiceStore {
    async fn create(&self, service: ServiceRegistration) -> Result<ServiceRegistration> {
        if self.services.contains_key(&service.service_id) {
            return Err(GatewayError::AlreadyExists(format!("service {}", service.service_id)));
        }
        self.services.insert(service.service_id.clone(), service.clone());
        Ok(service)
    }

    async fn get(&self, service_id: &str) -> Result<Option<ServiceRegistration>> {
        Ok(self.services.get(service_id).map(|e| e.clone()))
    }

    async fn update(&self, service_id: &str, expected_version: u64, patch: ServicePatch) -> Result<ServiceRegistration> {
        let mut entry = self.services.get_mut(service_id).ok_or_else(|| GatewayError::NotFound(format!("service {service_id}")))?;
        if entry.version != expected_version {
            return Err(GatewayError::VersionConflict { expected: expected_version, actual: entry.version });
        }
        patch.apply(&mut entry);
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn delete(&self, service_id: &str) -> Result<()> {
        self.services.remove(service_id).map(|_| ()).ok_or_else(|| GatewayError::NotFound(format!("service {service_id}")))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<(Vec<ServiceRegistration>, usize)> {
        let mut all: Vec<ServiceRegistration> = self.services.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        let total = all.len();
        let page = all.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.services.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceRegistration;

    #[tokio::test]
    async fn concurrent_updates_with_same_if_match_yield_one_conflict() {
        let store = InMemoryServiceStore::new();
        store.create(ServiceRegistration::new("s1", "Svc", "https://backend")).await.unwrap();

        let a = store.update("s1", 1, ServicePatch { display_name: Some("A".into()), ..Default::default() }).await;
        let b = store.update("s1", 1, ServicePatch { display_name: Some("B".into()), ..Default::default() }).await;

        assert!(a.is_ok());
        assert!(matches!(b, Err(GatewayError::VersionConflict { .. })));
        assert_eq!(a.unwrap().version, 2);
    }
}
