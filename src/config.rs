use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Storage provider selection (spec §6 "Configuration (enumerated)").
///
/// Only `Memory` is implemented; the persistent store schema is explicitly
/// out of scope (spec §1 Non-goals). The enum exists so a real backend can
/// be plugged in later without touching callers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
}

/// Signing-key rotation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPolicyConfig {
    pub rotation_interval_secs: u64,
    pub key_type: KeyType,
    pub deprecation_grace_period_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Rsa2048,
    Ed25519,
}

impl Default for KeyPolicyConfig {
    fn default() -> Self {
        Self {
            rotation_interval_secs: 30 * 24 * 3600,
            key_type: KeyType::Ed25519,
            deprecation_grace_period_secs: 24 * 3600,
        }
    }
}

/// Token verification policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPolicyConfig {
    pub max_lifetime_secs: u64,
    pub clock_skew_secs: u64,
}

impl Default for TokenPolicyConfig {
    fn default() -> Self {
        Self {
            max_lifetime_secs: 3600,
            clock_skew_secs: 30,
        }
    }
}

/// Translation cache + bloom filter sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub translation_cache_max_entries: usize,
    pub translation_cache_ttl_secs: u64,
    pub bloom_target_fpr: f64,
    pub bloom_rebuild_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            translation_cache_max_entries: 10_000,
            translation_cache_ttl_secs: 300,
            bloom_target_fpr: 0.01,
            bloom_rebuild_interval_secs: 60,
        }
    }
}

/// Lockout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutConfig {
    pub failure_threshold: u32,
    pub window_secs: u64,
    pub lockout_duration_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_secs: 60,
            lockout_duration_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

/// Default rate-limit bucket parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitDefaults {
    pub requests_per_window: u64,
    pub window_secs: u64,
    pub burst_capacity: u64,
}

impl Default for RateLimitDefaults {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_secs: 60,
            burst_capacity: 20,
        }
    }
}

/// Top-level gateway configuration, loaded from TOML with `Default` fallback.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub store_backend: StoreBackend,
    #[serde(default)]
    pub key_policy: KeyPolicyConfig,
    #[serde(default)]
    pub token_policy: TokenPolicyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub rate_limit_defaults: RateLimitDefaults,
}

impl GatewayConfig {
    pub fn from_toml_str(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::GatewayError::InvalidInput(e.to_string()))
    }

    pub fn max_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.token_policy.max_lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = GatewayConfig::default();
        let s = toml::to_string(&cfg).unwrap();
        let parsed = GatewayConfig::from_toml_str(&s).unwrap();
        assert_eq!(parsed.lockout.failure_threshold, cfg.lockout.failure_threshold);
    }

    #[test]
    fn missing_fields_fall_back_to_default() {
        let cfg = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert_eq!(cfg.cache.translation_cache_max_entries, 10_000);
    }
}
