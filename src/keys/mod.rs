// C4: signing-key lifecycle manager (spec §4.3).
//
// Owns signing keys, serves the current signing key and the verification
// key set, and drives the PENDING -> ACTIVE -> DEPRECATED -> RETIRED state
// machine. Grounded on the teacher's `security_vault/keystore.rs` key
// hierarchy (`KeyStatus`, versioned rotation) and `api/gateway/auth.rs`
// (`JwtValidator` signing-key map), generalized from envelope encryption to
// token-signing keys.

mod crypto;
mod store;

pub use crypto::{sign, verify, KeyMaterial};
pub use store::{InMemorySigningKeyStore, SigningKeyStore};

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{KeyPolicyConfig, KeyType};
use crate::error::{GatewayError, Result};
use crate::model::{KeyAlgorithm, KeyStatus, SigningKey};

/// Every `can_verify` key, in the public-key-set format downstream
/// verifiers consume (spec §4.3 "verification key set").
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationKeySet {
    pub keys: Vec<VerificationKeyEntry>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct VerificationKeyEntry {
    pub kid: String,
    pub algorithm: KeyAlgorithm,
    pub public_key: Vec<u8>,
    pub status: KeyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyHealthStatus {
    Healthy,
    Initializing,
    Disabled,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct KeyHealth {
    pub enabled: bool,
    pub status: KeyHealthStatus,
    pub active_key_id: Option<String>,
    pub verification_key_count: usize,
    pub last_cache_refresh: Option<chrono::DateTime<Utc>>,
}

pub struct KeyManager {
    store: Arc<dyn SigningKeyStore>,
    policy: KeyPolicyConfig,
    enabled: std::sync::atomic::AtomicBool,
    last_cache_refresh: parking_lot::RwLock<Option<chrono::DateTime<Utc>>>,
    cached_verification_set: parking_lot::RwLock<Arc<VerificationKeySet>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn SigningKeyStore>, policy: KeyPolicyConfig) -> Self {
        Self {
            store,
            policy,
            enabled: std::sync::atomic::AtomicBool::new(true),
            last_cache_refresh: parking_lot::RwLock::new(None),
            cached_verification_set: parking_lot::RwLock::new(Arc::new(VerificationKeySet { keys: vec![] })),
        }
    }

    fn require_enabled(&self) -> Result<()> {
        if !self.enabled.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(GatewayError::Disabled("key rotation disabled".into()));
        }
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    /// Bootstraps the manager with a single ACTIVE key if none exists.
    pub async fn bootstrap(&self) -> Result<()> {
        if self.store.active_key().await?.is_some() {
            self.rebuild().await?;
            return Ok(());
        }
        let pending = self.generate_and_insert_pending().await?;
        self.store.transition(&pending.key_id, KeyStatus::Active).await?;
        self.rebuild().await?;
        Ok(())
    }

    async fn generate_and_insert_pending(&self) -> Result<SigningKey> {
        let algorithm = match self.policy.key_type {
            KeyType::Ed25519 => KeyAlgorithm::Ed25519,
            KeyType::Rsa2048 => KeyAlgorithm::Rsa2048Sha256,
        };
        let material = crypto::generate(algorithm)?;
        let key = SigningKey {
            key_id: uuid::Uuid::new_v4().to_string(),
            status: KeyStatus::Pending,
            algorithm,
            public_key: material.public_key,
            private_handle: material.private_handle,
            created_at: Utc::now(),
            activated_at: None,
            deprecated_at: None,
            retired_at: None,
        };
        self.store.insert(key.clone()).await?;
        Ok(key)
    }

    /// Routine or emergency rotation (spec §4.3): generate PENDING, promote
    /// to ACTIVE, demote the prior ACTIVE to DEPRECATED — atomically against
    /// the key store.
    pub async fn rotate(&self, reason: &str) -> Result<SigningKey> {
        self.require_enabled()?;
        info!(reason, "rotating signing key");
        let prior_active = self.store.active_key().await?;
        let pending = self.generate_and_insert_pending().await?;
        let activated = self.store.promote_and_demote(&pending.key_id, prior_active.as_ref().map(|k| k.key_id.as_str())).await?;
        self.rebuild().await?;
        Ok(activated)
    }

    /// Deprecates the current ACTIVE key without rotating in a replacement.
    pub async fn deprecate(&self, key_id: &str) -> Result<SigningKey> {
        let key = self.store.transition(key_id, KeyStatus::Deprecated).await?;
        self.rebuild().await?;
        Ok(key)
    }

    /// Retires a key. Normally only legal from DEPRECATED; `force=true`
    /// allows retiring an ACTIVE key (emergency path, spec §4.3) which
    /// immediately invalidates all unexpired tokens it signed.
    pub async fn retire(&self, key_id: &str, force: bool) -> Result<SigningKey> {
        let current = self.store.get(key_id).await?.ok_or_else(|| GatewayError::NotFound(format!("signing key {key_id}")))?;
        if current.status == KeyStatus::Active && !force {
            return Err(GatewayError::PreconditionFailed("key is ACTIVE; retire with force=true or deprecate first".into()));
        }
        if force && current.status == KeyStatus::Active {
            warn!(key_id, "emergency retirement of ACTIVE signing key");
        }
        let key = self.store.transition(key_id, KeyStatus::Retired).await?;
        self.rebuild().await?;
        Ok(key)
    }

    /// Re-reads all keys and recomputes the verification set, for when the
    /// store is mutated out-of-band (spec §4.3 "Rebuild").
    pub async fn rebuild(&self) -> Result<Arc<VerificationKeySet>> {
        let keys = self.store.all().await?;
        let verifiable: Vec<VerificationKeyEntry> = keys
            .iter()
            .filter(|k| k.can_verify())
            .map(|k| VerificationKeyEntry { kid: k.key_id.clone(), algorithm: k.algorithm, public_key: k.public_key.clone(), status: k.status })
            .collect();
        let set = Arc::new(VerificationKeySet { keys: verifiable });
        *self.cached_verification_set.write() = set.clone();
        *self.last_cache_refresh.write() = Some(Utc::now());
        Ok(set)
    }

    pub fn verification_key_set(&self) -> Arc<VerificationKeySet> {
        self.cached_verification_set.read().clone()
    }

    pub async fn active_signing_key(&self) -> Result<SigningKey> {
        self.require_enabled()?;
        self.store.active_key().await?.ok_or_else(|| GatewayError::Unavailable("no ACTIVE signing key".into()))
    }

    pub async fn find_verify_key(&self, kid: &str) -> Result<Option<SigningKey>> {
        Ok(self.store.get(kid).await?.filter(|k| k.can_verify()))
    }

    pub async fn all_verify_keys(&self) -> Result<Vec<SigningKey>> {
        Ok(self.store.all().await?.into_iter().filter(|k| k.can_verify()).collect())
    }

    /// Deprecated keys older than `deprecatedAt + max_token_lifetime` may be
    /// retired (spec §4.3 step 3). Callers drive the schedule; this just
    /// performs the check-and-retire for one key.
    pub async fn retire_if_past_grace(&self, key_id: &str, max_token_lifetime: chrono::Duration) -> Result<bool> {
        let key = self.store.get(key_id).await?.ok_or_else(|| GatewayError::NotFound(format!("signing key {key_id}")))?;
        if key.status != KeyStatus::Deprecated {
            return Ok(false);
        }
        let Some(deprecated_at) = key.deprecated_at else { return Ok(false) };
        if Utc::now() < deprecated_at + max_token_lifetime + chrono::Duration::seconds(self.policy.deprecation_grace_period_secs as i64) {
            return Ok(false);
        }
        self.retire(key_id, false).await?;
        Ok(true)
    }

    pub async fn health(&self) -> KeyHealth {
        let enabled = self.enabled.load(std::sync::atomic::Ordering::SeqCst);
        let active = self.store.active_key().await.ok().flatten();
        let set = self.verification_key_set();
        KeyHealth {
            enabled,
            status: if !enabled {
                KeyHealthStatus::Disabled
            } else if active.is_none() {
                KeyHealthStatus::Initializing
            } else {
                KeyHealthStatus::Healthy
            },
            active_key_id: active.map(|k| k.key_id),
            verification_key_count: set.keys.len(),
            last_cache_refresh: *self.last_cache_refresh.read(),
        }
    }
}
