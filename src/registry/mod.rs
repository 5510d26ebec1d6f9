// C2 + C8: service registry and router (spec §4.1).

mod router;

pub use router::Router;

use std::sync::Arc;

use crate::error::Result;
use crate::model::ServiceRegistration;
use crate::store::{ServicePatch, ServiceStore};

pub struct Registry {
    store: Arc<dyn ServiceStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn ServiceStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, service: ServiceRegistration) -> Result<ServiceRegistration> {
        self.store.create(service).await
    }

    pub async fn get(&self, service_id: &str) -> Result<Option<ServiceRegistration>> {
        self.store.get(service_id).await
    }

    pub async fn update(&self, service_id: &str, expected_version: u64, patch: ServicePatch) -> Result<ServiceRegistration> {
        self.store.update(service_id, expected_version, patch).await
    }

    pub async fn delete(&self, service_id: &str) -> Result<()> {
        self.store.delete(service_id).await
    }

    pub async fn list(&self, limit: usize, offset: usize) -> Result<(Vec<ServiceRegistration>, usize)> {
        self.store.list(limit, offset).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    pub async fn all(&self) -> Result<Vec<ServiceRegistration>> {
        let (services, _) = self.store.list(usize::MAX, 0).await?;
        Ok(services)
    }
}
