// C7: revocation & lockout gate (spec §4.5).

mod bloom;

pub use bloom::BloomFilter;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LockoutConfig;
use crate::error::{GatewayError, Result};
use crate::model::{LockoutEntry, LockoutScope};
use crate::store::CredentialStore;

pub struct RevocationLockoutGate {
    credentials: Arc<dyn CredentialStore>,
    bloom: RwLock<Arc<BloomFilter>>,
    lockout_config: LockoutConfig,
    bloom_target_fpr: f64,
}

impl RevocationLockoutGate {
    pub fn new(credentials: Arc<dyn CredentialStore>, lockout_config: LockoutConfig, bloom_target_fpr: f64) -> Self {
        Self { credentials, bloom: RwLock::new(Arc::new(BloomFilter::new(1, bloom_target_fpr))), lockout_config, bloom_target_fpr }
    }

    /// Rebuilds the bloom filter from the authoritative store (spec §4.5 and
    /// periodic schedule). Copy-on-write: readers never block on this.
    pub async fn rebuild_bloom(&self) -> Result<()> {
        let jtis = self.credentials.all_revoked_jtis().await?;
        let filter = BloomFilter::from_items(jtis.iter().map(|s| s.as_str()), self.bloom_target_fpr);
        *self.bloom.write() = Arc::new(filter);
        Ok(())
    }

    /// Bloom-probe, then authoritative confirmation on a positive hit
    /// (spec §4.5 two-tier check). No false negatives.
    pub async fn check_token_revocation(&self, jti: &str) -> Result<()> {
        let filter = self.bloom.read().clone();
        if !filter.contains(jti) {
            return Ok(());
        }
        if self.credentials.is_token_revoked(jti).await? {
            return Err(GatewayError::Revoked(format!("token {jti}")));
        }
        Ok(())
    }

    pub async fn check_user_revocation(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<()> {
        if self.credentials.is_user_revoked_since(user_id, issued_at).await? {
            return Err(GatewayError::Revoked(format!("user {user_id}")));
        }
        Ok(())
    }

    /// Rejects the request if any of the request's lockout scopes are
    /// currently locked (spec §4.5).
    pub async fn check_lockout(&self, scopes: &[LockoutScope]) -> Result<()> {
        for scope in scopes {
            if let Some(entry) = self.credentials.get_lockout(scope).await? {
                return Err(GatewayError::LockedOut(format!("{} until {}", entry.key, entry.expires_at)));
            }
        }
        Ok(())
    }

    /// Records one authentication failure against the caller's IP (and
    /// API-key prefix, if known); escalates to a lockout on reaching the
    /// configured threshold (spec §4.2, §4.5). A scope that is already
    /// locked out is left untouched — further failures within the lockout
    /// extend nothing, per spec §4.5.
    pub async fn record_auth_failure(&self, ip: IpAddr, apikey_prefix: Option<String>) -> Result<()> {
        let window = chrono::Duration::seconds(self.lockout_config.window_secs as i64);
        let mut scopes = vec![LockoutScope::Ip(ip.to_string())];
        if let Some(prefix) = apikey_prefix {
            scopes.push(LockoutScope::ApiKey(prefix));
        }
        for scope in scopes {
            if self.credentials.get_lockout(&scope).await?.is_some() {
                continue;
            }
            let count = self.credentials.record_failed_attempt(scope.clone(), window).await?;
            if count >= self.lockout_config.failure_threshold {
                let duration = chrono::Duration::seconds(self.lockout_config.lockout_duration_secs as i64);
                let entry = self.credentials.record_lockout(scope, duration, "failure threshold exceeded".into()).await?;
                warn!(key = %entry.key, count = entry.lockout_count, "lockout installed");
            }
        }
        Ok(())
    }

    pub async fn list_lockouts(&self) -> Result<Vec<LockoutEntry>> {
        self.credentials.list_lockouts().await
    }

    pub async fn get_lockout(&self, scope: &LockoutScope) -> Result<Option<LockoutEntry>> {
        self.credentials.get_lockout(scope).await
    }

    pub async fn reset_lockout(&self, scope: &LockoutScope, force: bool) -> Result<bool> {
        if !force && self.credentials.get_lockout(scope).await?.is_none() {
            return Ok(false);
        }
        self.credentials.clear_lockout(scope).await
    }

    /// Periodic sweep removing expired failed-attempt and lockout entries
    /// (spec §4.5 Cleanup; sweep interval >= 1 minute enforced by the
    /// caller's scheduling, not this method).
    pub async fn sweep(&self) -> Result<usize> {
        let removed = self.credentials.sweep_expired(Utc::now()).await?;
        if removed > 0 {
            info!(removed, "lockout sweep removed expired entries");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCredentialStore;

    #[tokio::test]
    async fn revoked_token_is_caught_via_bloom_then_store() {
        let store = InMemoryCredentialStore::new();
        store.revoke_token("jti-1".into(), Utc::now() + chrono::Duration::hours(1), None).await.unwrap();
        let gate = RevocationLockoutGate::new(store, LockoutConfig::default(), 0.01);
        gate.rebuild_bloom().await.unwrap();
        assert!(gate.check_token_revocation("jti-1").await.is_err());
        assert!(gate.check_token_revocation("jti-unrelated").await.is_ok());
    }

    #[tokio::test]
    async fn sixth_failure_locks_out() {
        let store = InMemoryCredentialStore::new();
        let gate = RevocationLockoutGate::new(store, LockoutConfig::default(), 0.01);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        for _ in 0..5 {
            gate.record_auth_failure(ip, None).await.unwrap();
        }
        let scope = LockoutScope::Ip(ip.to_string());
        assert!(gate.check_lockout(&[scope]).await.is_err());
    }
}
