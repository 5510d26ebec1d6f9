use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::{GatewayError, Result};
use crate::model::{ApiKey, ApiKeyBody, LockoutEntry, LockoutScope, RevocationEntry};

/// C1: persists API keys, revocation entries and lockout entries.
/// (Signing keys are persisted by `keys::SigningKeyStore` — kept separate
/// because the key-lifecycle manager, C4, is the only writer.)
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_api_key(&self, name: String, description: String, permissions: std::collections::HashSet<String>, ttl: Option<chrono::Duration>) -> Result<(ApiKey, String)>;
    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>>;
    async fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>>;
    async fn list_api_keys(&self, limit: usize, offset: usize) -> Result<(Vec<ApiKey>, usize)>;
    async fn revoke_api_key(&self, id: &str) -> Result<()>;
    async fn delete_api_key(&self, id: &str) -> Result<()>;

    async fn revoke_token(&self, jti: String, expires_at: chrono::DateTime<Utc>, _reason: Option<String>) -> Result<()>;
    async fn revoke_user(&self, user_id: String, max_token_lifetime: chrono::Duration) -> Result<()>;
    async fn is_token_revoked(&self, jti: &str) -> Result<bool>;
    async fn is_user_revoked_since(&self, user_id: &str, issued_at: chrono::DateTime<Utc>) -> Result<bool>;
    async fn list_revocations(&self) -> Result<Vec<RevocationEntry>>;
    async fn delete_token_revocation(&self, jti: &str) -> Result<bool>;
    async fn delete_user_revocation(&self, user_id: &str) -> Result<bool>;
    async fn all_revoked_jtis(&self) -> Result<Vec<String>>;

    async fn record_failed_attempt(&self, key: LockoutScope, window: chrono::Duration) -> Result<u32>;
    async fn record_lockout(&self, key: LockoutScope, duration: chrono::Duration, reason: String) -> Result<LockoutEntry>;
    async fn get_lockout(&self, key: &LockoutScope) -> Result<Option<LockoutEntry>>;
    async fn list_lockouts(&self) -> Result<Vec<LockoutEntry>>;
    async fn clear_lockout(&self, key: &LockoutScope) -> Result<bool>;
    /// Removes expired failed-attempt and lockout entries. Per spec §9 open
    /// question, `lockout_count` itself is retained across sweeps.
    async fn sweep_expired(&self, now: chrono::DateTime<Utc>) -> Result<usize>;
}

struct FailedAttemptCounter {
    count: u32,
    window_expires_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    api_keys: DashMap<String, ApiKey>,
    hash_index: DashMap<String, String>,
    token_revocations: DashMap<String, RevocationEntry>,
    user_revocations: DashMap<String, RevocationEntry>,
    failed_attempts: DashMap<LockoutScope, FailedAttemptCounter>,
    lockouts: DashMap<LockoutScope, LockoutEntry>,
    lockout_history: DashMap<LockoutScope, u32>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn hash_plaintext(plaintext: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(plaintext.as_bytes());
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, hasher.finalize())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_api_key(&self, name: String, description: String, permissions: std::collections::HashSet<String>, ttl: Option<chrono::Duration>) -> Result<(ApiKey, String)> {
        let plaintext = format!("tgk_{}", uuid::Uuid::new_v4().simple());
        let key_hash = Self::hash_plaintext(&plaintext);
        let now = Utc::now();
        let key = ApiKey {
            id: uuid::Uuid::new_v4().to_string(),
            key_hash: key_hash.clone(),
            body: ApiKeyBody {
                name,
                description,
                permissions,
                expires_at: ttl.map(|d| now + d),
                revoked: false,
            },
            created_at: now,
            updated_at: now,
        };
        self.hash_index.insert(key_hash, key.id.clone());
        self.api_keys.insert(key.id.clone(), key.clone());
        Ok((key, plaintext))
    }

    async fn find_api_key_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        Ok(self.hash_index.get(key_hash).and_then(|id| self.api_keys.get(id.value()).map(|k| k.clone())))
    }

    async fn get_api_key(&self, id: &str) -> Result<Option<ApiKey>> {
        Ok(self.api_keys.get(id).map(|k| k.clone()))
    }

    async fn list_api_keys(&self, limit: usize, offset: usize) -> Result<(Vec<ApiKey>, usize)> {
        let mut all: Vec<ApiKey> = self.api_keys.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|a| a.created_at);
        let total = all.len();
        let page = all.drain(..).skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn revoke_api_key(&self, id: &str) -> Result<()> {
        let mut entry = self.api_keys.get_mut(id).ok_or_else(|| GatewayError::NotFound(format!("api key {id}")))?;
        entry.body.revoked = true;
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_api_key(&self, id: &str) -> Result<()> {
        let removed = self.api_keys.remove(id);
        if let Some((_, key)) = &removed {
            self.hash_index.remove(&key.key_hash);
        }
        removed.map(|_| ()).ok_or_else(|| GatewayError::NotFound(format!("api key {id}")))
    }

    async fn revoke_token(&self, jti: String, expires_at: chrono::DateTime<Utc>, _reason: Option<String>) -> Result<()> {
        self.token_revocations.insert(jti.clone(), RevocationEntry::Token { jti, expires_at });
        Ok(())
    }

    async fn revoke_user(&self, user_id: String, max_token_lifetime: chrono::Duration) -> Result<()> {
        let now = Utc::now();
        self.user_revocations.insert(
            user_id.clone(),
            RevocationEntry::User { user_id, revoked_at: now, expires_at: now + max_token_lifetime },
        );
        Ok(())
    }

    async fn is_token_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self.token_revocations.contains_key(jti))
    }

    async fn is_user_revoked_since(&self, user_id: &str, issued_at: chrono::DateTime<Utc>) -> Result<bool> {
        Ok(self
            .user_revocations
            .get(user_id)
            .map(|e| matches!(e.value(), RevocationEntry::User { revoked_at, .. } if issued_at < *revoked_at))
            .unwrap_or(false))
    }

    async fn list_revocations(&self) -> Result<Vec<RevocationEntry>> {
        let mut out: Vec<RevocationEntry> = self.token_revocations.iter().map(|e| e.value().clone()).collect();
        out.extend(self.user_revocations.iter().map(|e| e.value().clone()));
        Ok(out)
    }

    async fn delete_token_revocation(&self, jti: &str) -> Result<bool> {
        Ok(self.token_revocations.remove(jti).is_some())
    }

    async fn delete_user_revocation(&self, user_id: &str) -> Result<bool> {
        Ok(self.user_revocations.remove(user_id).is_some())
    }

    async fn all_revoked_jtis(&self) -> Result<Vec<String>> {
        Ok(self.token_revocations.iter().map(|e| e.key().clone()).collect())
    }

    async fn record_failed_attempt(&self, key: LockoutScope, window: chrono::Duration) -> Result<u32> {
        let now = Utc::now();
        let mut entry = self.failed_attempts.entry(key).or_insert_with(|| FailedAttemptCounter { count: 0, window_expires_at: now + window });
        if now > entry.window_expires_at {
            entry.count = 0;
        }
        entry.count += 1;
        entry.window_expires_at = now + window;
        Ok(entry.count)
    }

    async fn record_lockout(&self, key: LockoutScope, duration: chrono::Duration, reason: String) -> Result<LockoutEntry> {
        let now = Utc::now();
        let history_count = {
            let mut h = self.lockout_history.entry(key.clone()).or_insert(0);
            *h += 1;
            *h
        };
        let entry = LockoutEntry {
            key: key.clone(),
            locked_at: now,
            expires_at: now + duration,
            reason,
            failed_attempts: self.failed_attempts.get(&key).map(|c| c.count).unwrap_or(0),
            lockout_count: history_count,
        };
        self.lockouts.insert(key, entry.clone());
        Ok(entry)
    }

    async fn get_lockout(&self, key: &LockoutScope) -> Result<Option<LockoutEntry>> {
        Ok(self.lockouts.get(key).filter(|e| e.expires_at > Utc::now()).map(|e| e.clone()))
    }

    async fn list_lockouts(&self) -> Result<Vec<LockoutEntry>> {
        Ok(self.lockouts.iter().map(|e| e.value().clone()).collect())
    }

    async fn clear_lockout(&self, key: &LockoutScope) -> Result<bool> {
        Ok(self.lockouts.remove(key).is_some())
    }

    async fn sweep_expired(&self, now: chrono::DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        self.lockouts.retain(|_, v| {
            let keep = v.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.failed_attempts.retain(|_, v| v.window_expires_at > now);
        self.token_revocations.retain(|_, v| v.expires_at() > now);
        self.user_revocations.retain(|_, v| v.expires_at() > now);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn api_key_lookup_roundtrip() {
        let store = InMemoryCredentialStore::new();
        let (key, plaintext) = store.create_api_key("svc".into(), "d".into(), Default::default(), None).await.unwrap();
        let hash = InMemoryCredentialStore::hash_plaintext(&plaintext);
        assert_eq!(hash, key.key_hash);
        let found = store.find_api_key_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(found.id, key.id);
    }

    #[tokio::test]
    async fn revoked_api_key_is_unusable() {
        let store = InMemoryCredentialStore::new();
        let (key, _) = store.create_api_key("svc".into(), "d".into(), Default::default(), None).await.unwrap();
        store.revoke_api_key(&key.id).await.unwrap();
        let refreshed = store.get_api_key(&key.id).await.unwrap().unwrap();
        assert!(!refreshed.is_usable(Utc::now()));
    }

    #[tokio::test]
    async fn lockout_window_triggers_once_then_extends_nothing() {
        let store = InMemoryCredentialStore::new();
        let key = LockoutScope::Ip("10.0.0.1".into());
        let window = chrono::Duration::seconds(60);
        for _ in 0..5 {
            store.record_failed_attempt(key.clone(), window).await.unwrap();
        }
        let entry = store.record_lockout(key.clone(), chrono::Duration::seconds(300), "threshold".into()).await.unwrap();
        assert_eq!(entry.lockout_count, 1);
        // a second lockout before expiry escalates the history counter, not the duration policy
        let entry2 = store.record_lockout(key.clone(), chrono::Duration::seconds(300), "threshold".into()).await.unwrap();
        assert_eq!(entry2.lockout_count, 2);
    }
}
