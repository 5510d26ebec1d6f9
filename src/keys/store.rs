use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::model::{KeyStatus, SigningKey};

/// Persistence boundary for signing keys (part of C1, owned exclusively by
/// the key-lifecycle manager, C4).
#[async_trait]
pub trait SigningKeyStore: Send + Sync {
    async fn insert(&self, key: SigningKey) -> Result<()>;
    async fn get(&self, key_id: &str) -> Result<Option<SigningKey>>;
    async fn active_key(&self) -> Result<Option<SigningKey>>;
    async fn all(&self) -> Result<Vec<SigningKey>>;
    /// Applies a single monotonic transition, atomically.
    async fn transition(&self, key_id: &str, to: KeyStatus) -> Result<SigningKey>;
    /// Promotes `pending_id` to ACTIVE and demotes `prior_active_id` (if
    /// any) to DEPRECATED in one atomic step (spec §4.3 rotation step 2).
    async fn promote_and_demote(&self, pending_id: &str, prior_active_id: Option<&str>) -> Result<SigningKey>;
}

#[derive(Default)]
pub struct InMemorySigningKeyStore {
    keys: DashMap<String, SigningKey>,
}

impl InMemorySigningKeyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn apply_transition(key: &mut SigningKey, to: KeyStatus) -> Result<()> {
        if !key.status.can_transition_to(to) {
            return Err(GatewayError::PreconditionFailed(format!("illegal transition {:?} -> {:?}", key.status, to)));
        }
        let now = Utc::now();
        match to {
            KeyStatus::Active => key.activated_at = Some(now),
            KeyStatus::Deprecated => key.deprecated_at = Some(now),
            KeyStatus::Retired => key.retired_at = Some(now),
            KeyStatus::Pending => {}
        }
        key.status = to;
        Ok(())
    }
}

#[async_trait]
impl SigningKeyStore for InMemorySigningKeyStore {
    async fn insert(&self, key: SigningKey) -> Result<()> {
        self.keys.insert(key.key_id.clone(), key);
        Ok(())
    }

    async fn get(&self, key_id: &str) -> Result<Option<SigningKey>> {
        Ok(self.keys.get(key_id).map(|k| k.clone()))
    }

    async fn active_key(&self) -> Result<Option<SigningKey>> {
        Ok(self.keys.iter().find(|e| e.status == KeyStatus::Active).map(|e| e.clone()))
    }

    async fn all(&self) -> Result<Vec<SigningKey>> {
        Ok(self.keys.iter().map(|e| e.value().clone()).collect())
    }

    async fn transition(&self, key_id: &str, to: KeyStatus) -> Result<SigningKey> {
        let mut entry = self.keys.get_mut(key_id).ok_or_else(|| GatewayError::NotFound(format!("signing key {key_id}")))?;
        Self::apply_transition(&mut entry, to)?;
        Ok(entry.clone())
    }

    async fn promote_and_demote(&self, pending_id: &str, prior_active_id: Option<&str>) -> Result<SigningKey> {
        // invariant: at most one ACTIVE key at a time (spec §3 SigningKey).
        // Demote first so the window where two keys are ACTIVE never opens.
        if let Some(prior_id) = prior_active_id {
            if let Some(mut prior) = self.keys.get_mut(prior_id) {
                Self::apply_transition(&mut prior, KeyStatus::Deprecated)?;
            }
        }
        let mut pending = self.keys.get_mut(pending_id).ok_or_else(|| GatewayError::NotFound(format!("signing key {pending_id}")))?;
        Self::apply_transition(&mut pending, KeyStatus::Active)?;
        Ok(pending.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyAlgorithm;

    fn make_key(status: KeyStatus) -> SigningKey {
        SigningKey {
            key_id: uuid::Uuid::new_v4().to_string(),
            status,
            algorithm: KeyAlgorithm::Ed25519,
            public_key: vec![0; 32],
            private_handle: vec![0; 32],
            created_at: Utc::now(),
            activated_at: None,
            deprecated_at: None,
            retired_at: None,
        }
    }

    #[tokio::test]
    async fn at_most_one_active_key_after_rotation() {
        let store = InMemorySigningKeyStore::new();
        let k1 = make_key(KeyStatus::Active);
        let k2 = make_key(KeyStatus::Pending);
        store.insert(k1.clone()).await.unwrap();
        store.insert(k2.clone()).await.unwrap();

        store.promote_and_demote(&k2.key_id, Some(&k1.key_id)).await.unwrap();

        let all = store.all().await.unwrap();
        let active: Vec<_> = all.iter().filter(|k| k.status == KeyStatus::Active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].key_id, k2.key_id);
    }

    #[tokio::test]
    async fn illegal_transition_rejected() {
        let store = InMemorySigningKeyStore::new();
        let k = make_key(KeyStatus::Retired);
        store.insert(k.clone()).await.unwrap();
        assert!(store.transition(&k.key_id, KeyStatus::Active).await.is_err());
    }
}
