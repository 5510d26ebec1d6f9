use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::model::{ConfigSchema, TranslationConfigVersion};

/// C3: persists an ordered history of translation configs and tracks one
/// `active_version_id` via compare-and-swap (spec §3, §4.4).
#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Claims the next version number via CAS against `version_counter`,
    /// retrying up to 5 times on conflict (spec §3, §4.4). Surfaces
    /// `VersionExhausted` after that.
    async fn upload(&self, config_schema: ConfigSchema, created_by: String, comment: Option<String>) -> Result<TranslationConfigVersion>;
    async fn set_active(&self, version_id: &str) -> Result<()>;
    async fn active_version_id(&self) -> Result<Option<String>>;
    async fn get_active(&self) -> Result<Option<TranslationConfigVersion>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<TranslationConfigVersion>>;
    async fn find_by_version(&self, version: u64) -> Result<Option<TranslationConfigVersion>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<TranslationConfigVersion>>;
}

pub struct InMemoryTranslationStore {
    version_counter: AtomicU64,
    configs: RwLock<HashMap<String, TranslationConfigVersion>>,
    active_version_id: RwLock<Option<String>>,
}

impl InMemoryTranslationStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            version_counter: AtomicU64::new(0),
            configs: RwLock::new(HashMap::new()),
            active_version_id: RwLock::new(None),
        })
    }
}

#[async_trait]
impl TranslationStore for InMemoryTranslationStore {
    async fn upload(&self, config_schema: ConfigSchema, created_by: String, comment: Option<String>) -> Result<TranslationConfigVersion> {
        const MAX_RETRIES: u32 = 5;
        let mut attempt = 0;
        loop {
            let current = self.version_counter.load(Ordering::SeqCst);
            let next = current + 1;
            if self
                .version_counter
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let cfg = TranslationConfigVersion {
                    id: uuid::Uuid::new_v4().to_string(),
                    version: next,
                    config_schema,
                    created_by,
                    created_at: chrono::Utc::now(),
                    comment,
                };
                self.configs.write().insert(cfg.id.clone(), cfg.clone());
                return Ok(cfg);
            }
            attempt += 1;
            if attempt >= MAX_RETRIES {
                return Err(GatewayError::VersionExhausted(MAX_RETRIES));
            }
        }
    }

    async fn set_active(&self, version_id: &str) -> Result<()> {
        if !self.configs.read().contains_key(version_id) {
            return Err(GatewayError::NotFound(format!("translation config {version_id}")));
        }
        *self.active_version_id.write() = Some(version_id.to_string());
        Ok(())
    }

    async fn active_version_id(&self) -> Result<Option<String>> {
        Ok(self.active_version_id.read().clone())
    }

    async fn get_active(&self) -> Result<Option<TranslationConfigVersion>> {
        let active = self.active_version_id.read().clone();
        Ok(active.and_then(|id| self.configs.read().get(&id).cloned()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<TranslationConfigVersion>> {
        Ok(self.configs.read().get(id).cloned())
    }

    async fn find_by_version(&self, version: u64) -> Result<Option<TranslationConfigVersion>> {
        Ok(self.configs.read().values().find(|c| c.version == version).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        if self.active_version_id.read().as_deref() == Some(id) {
            return Err(GatewayError::PreconditionFailed("cannot delete the active translation config".into()));
        }
        self.configs.write().remove(id).map(|_| ()).ok_or_else(|| GatewayError::NotFound(format!("translation config {id}")))
    }

    async fn list(&self) -> Result<Vec<TranslationConfigVersion>> {
        let mut out: Vec<_> = self.configs.read().values().cloned().collect();
        out.sort_by_key(|c| c.version);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test]
    async fn concurrent_uploads_get_distinct_consecutive_versions() {
        let store = InMemoryTranslationStore::new();
        let futs = (0..20).map(|i| {
            let store = store.clone();
            async move { store.upload(ConfigSchema::default(), format!("user{i}"), None).await.unwrap() }
        });
        let mut versions: Vec<u64> = join_all(futs).await.into_iter().map(|c| c.version).collect();
        versions.sort();
        assert_eq!(versions, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn delete_refuses_active_version() {
        let store = InMemoryTranslationStore::new();
        let cfg = store.upload(ConfigSchema::default(), "u".into(), None).await.unwrap();
        store.set_active(&cfg.id).await.unwrap();
        assert!(store.delete(&cfg.id).await.is_err());
    }
}
