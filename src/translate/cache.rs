// Translation-result cache: concurrent map with bounded size and TTL
// eviction (spec §4.4, §5 "Shared resources"). Grounded on the teacher's
// `security/rbac_cache.rs` pattern of a capacity-bounded, timestamped
// concurrent cache in front of a pure evaluation function.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::model::TranslationResult;

pub struct CacheFingerprint(String);

impl CacheFingerprint {
    pub fn compute(active_config_id: &str, issuer: &str, subject: &str, claims: &HashMap<String, Vec<String>>) -> Self {
        let mut sorted_keys: Vec<&String> = claims.keys().collect();
        sorted_keys.sort();
        let mut hasher = Sha256::new();
        hasher.update(active_config_id.as_bytes());
        hasher.update(issuer.as_bytes());
        hasher.update(subject.as_bytes());
        for key in sorted_keys {
            let mut values = claims[key].clone();
            values.sort();
            hasher.update(key.as_bytes());
            hasher.update(values.join(",").as_bytes());
        }
        Self(base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, hasher.finalize()))
    }
}

struct Entry {
    value: TranslationResult,
    expires_at: DateTime<Utc>,
    inserted_at: DateTime<Utc>,
}

pub struct TranslationCache {
    entries: DashMap<String, Entry>,
    max_entries: usize,
    ttl: chrono::Duration,
}

impl TranslationCache {
    pub fn new(max_entries: usize, ttl_secs: u64) -> Self {
        Self { entries: DashMap::new(), max_entries, ttl: chrono::Duration::seconds(ttl_secs as i64) }
    }

    pub fn get(&self, fingerprint: &CacheFingerprint) -> Option<TranslationResult> {
        let now = Utc::now();
        let hit = self.entries.get(&fingerprint.0)?;
        if hit.expires_at < now {
            drop(hit);
            self.entries.remove(&fingerprint.0);
            return None;
        }
        Some(hit.value.clone())
    }

    pub fn put(&self, fingerprint: CacheFingerprint, value: TranslationResult) {
        if self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        let now = Utc::now();
        self.entries.insert(fingerprint.0, Entry { value, expires_at: now + self.ttl, inserted_at: now });
    }

    fn evict_oldest(&self) {
        if let Some(oldest_key) = self.entries.iter().min_by_key(|e| e.inserted_at).map(|e| e.key().clone()) {
            self.entries.remove(&oldest_key);
        }
    }

    /// Invalidates the cache in full, used on every translation-config
    /// activation (spec §4.4).
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
