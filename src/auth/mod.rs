// C5: authentication pipeline (spec §4.2).
//
// Dispatches a bearer credential to either issued-token verification or
// API-key lookup, and on any failure records a failed attempt against the
// lockout gate (C7) keyed by IP (and, where known, user/API-key prefix).

pub mod token;

use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::config::TokenPolicyConfig;
use crate::error::{GatewayError, Result};
use crate::keys::KeyManager;
use crate::model::{Principal, PrincipalSource};
use crate::revocation::RevocationLockoutGate;
use crate::store::CredentialStore;

/// Authentication failure modes (spec §4.2). Never surfaced to the caller
/// individually — the HTTP layer maps all of them to an opaque 401 (spec
/// §7) — but kept distinct internally for logging and lockout bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    InvalidSignature,
    Expired,
    NotYetValid,
    UnknownKid,
    Revoked,
    Malformed,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuthFailure::InvalidSignature => "INVALID_SIGNATURE",
            AuthFailure::Expired => "EXPIRED",
            AuthFailure::NotYetValid => "NOT_YET_VALID",
            AuthFailure::UnknownKid => "UNKNOWN_KID",
            AuthFailure::Revoked => "REVOKED",
            AuthFailure::Malformed => "MALFORMED",
        };
        write!(f, "{s}")
    }
}

pub struct Authenticator {
    keys: Arc<KeyManager>,
    credentials: Arc<dyn CredentialStore>,
    gate: Arc<RevocationLockoutGate>,
    policy: TokenPolicyConfig,
}

impl Authenticator {
    pub fn new(keys: Arc<KeyManager>, credentials: Arc<dyn CredentialStore>, gate: Arc<RevocationLockoutGate>, policy: TokenPolicyConfig) -> Self {
        Self { keys, credentials, gate, policy }
    }

    /// Parses `Authorization: Bearer <credential>` and returns a `Principal`
    /// on success (spec §4.2).
    pub async fn authenticate(&self, credential: &str, source_ip: IpAddr) -> Result<Principal> {
        let result = if token::looks_like_token(credential) {
            self.authenticate_token(credential).await
        } else {
            self.authenticate_api_key(credential).await
        };

        if let Err((failure, prefix)) = &result {
            debug!(%failure, "authentication failed");
            self.gate.record_auth_failure(source_ip, prefix.clone()).await?;
            return Err(GatewayError::Unauthenticated("invalid credential".into()));
        }
        Ok(result.unwrap().0)
    }

    async fn authenticate_token(&self, credential: &str) -> std::result::Result<(Principal, Option<String>), (AuthFailure, Option<String>)> {
        let parsed = token::decode(credential).map_err(|_| (AuthFailure::Malformed, None))?;

        let candidate_keys = match &parsed.header.kid {
            Some(kid) => match self.keys.find_verify_key(kid).await {
                Ok(Some(k)) => vec![k],
                _ => return Err((AuthFailure::UnknownKid, None)),
            },
            // kid missing: fall back to trying every verify-capable key (spec §4.2)
            None => self.keys.all_verify_keys().await.unwrap_or_default(),
        };
        if candidate_keys.is_empty() {
            return Err((AuthFailure::UnknownKid, None));
        }

        let verified_key = candidate_keys.iter().find(|k| parsed.verify_signature(k).unwrap_or(false));
        let Some(_key) = verified_key else {
            return Err((AuthFailure::InvalidSignature, None));
        };

        let now = Utc::now().timestamp();
        let skew = self.policy.clock_skew_secs as i64;
        if now > parsed.claims.exp + skew {
            return Err((AuthFailure::Expired, None));
        }
        if let Some(nbf) = parsed.claims.nbf {
            if now + skew < nbf {
                return Err((AuthFailure::NotYetValid, None));
            }
        }
        if parsed.claims.iat > now + skew {
            return Err((AuthFailure::NotYetValid, None));
        }

        // jti/user-wide revocation is checked downstream by the dedicated
        // revocation-check pipeline stage (spec §2, §4.5), not here — the
        // authenticator's job is credential validity, not revocation state.
        let issued_at = chrono::DateTime::from_timestamp(parsed.claims.iat, 0).unwrap_or_else(Utc::now);

        let mut permissions: std::collections::HashSet<String> = parsed.claims.permissions.into_iter().collect();
        // roles/groups are expanded later by the authz evaluator (spec §4.6);
        // carry the raw names through as pseudo-permissions so the evaluator
        // can find them without a second parse of the token.
        permissions.extend(parsed.claims.roles.iter().map(|r| format!("role:{r}")));
        permissions.extend(parsed.claims.groups.iter().map(|g| format!("group:{g}")));

        Ok((
            Principal {
                subject: parsed.claims.sub,
                issuer: parsed.claims.iss,
                effective_permissions: permissions,
                token_id: Some(parsed.claims.jti),
                expires_at: chrono::DateTime::from_timestamp(parsed.claims.exp, 0),
                source: PrincipalSource::Token,
                issued_at: Some(issued_at),
            },
            None,
        ))
    }

    async fn authenticate_api_key(&self, credential: &str) -> std::result::Result<(Principal, Option<String>), (AuthFailure, Option<String>)> {
        let prefix: String = credential.chars().take(8).collect();
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(credential.as_bytes());
        let hash = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, hasher.finalize());

        let key = self
            .credentials
            .find_api_key_by_hash(&hash)
            .await
            .map_err(|_| (AuthFailure::Malformed, Some(prefix.clone())))?
            .ok_or((AuthFailure::InvalidSignature, Some(prefix.clone())))?;

        if key.body.revoked {
            return Err((AuthFailure::Revoked, Some(prefix)));
        }
        if !key.is_usable(Utc::now()) {
            return Err((AuthFailure::Expired, Some(prefix)));
        }

        Ok((
            Principal {
                subject: key.id,
                issuer: "trustgate.api_key".into(),
                effective_permissions: key.body.permissions,
                token_id: None,
                expires_at: key.body.expires_at,
                source: PrincipalSource::ApiKey,
                issued_at: None,
            },
            Some(prefix),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{self, TokenClaims, TokenHeader};
    use crate::config::KeyPolicyConfig;
    use crate::keys::{InMemorySigningKeyStore, KeyManager};
    use crate::store::InMemoryCredentialStore;
    use std::collections::HashMap;

    async fn fixture() -> (Authenticator, Arc<KeyManager>) {
        let key_manager = Arc::new(KeyManager::new(InMemorySigningKeyStore::new(), KeyPolicyConfig::default()));
        key_manager.bootstrap().await.unwrap();
        let credentials = InMemoryCredentialStore::new();
        let gate = Arc::new(RevocationLockoutGate::new(credentials.clone(), crate::config::LockoutConfig::default(), 0.01));
        let authenticator = Authenticator::new(key_manager.clone(), credentials, gate, TokenPolicyConfig::default());
        (authenticator, key_manager)
    }

    fn claims_with_iat(iat: i64) -> TokenClaims {
        TokenClaims {
            iss: "idp".into(),
            sub: "alice".into(),
            jti: "jti-iat".into(),
            exp: Utc::now().timestamp() + 3600,
            nbf: None,
            iat,
            permissions: vec![],
            roles: vec![],
            groups: vec![],
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn token_with_iat_far_in_the_future_is_rejected() {
        let (authenticator, key_manager) = fixture().await;
        let key = key_manager.active_signing_key().await.unwrap();
        let claims = claims_with_iat(Utc::now().timestamp() + 3600);
        let header = TokenHeader { alg: key.algorithm, kid: Some(key.key_id.clone()) };
        let token = token::encode(&header, &claims, &key).unwrap();

        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        assert!(authenticator.authenticate(&token, ip).await.is_err());
    }

    #[tokio::test]
    async fn token_with_iat_within_skew_is_accepted() {
        let (authenticator, key_manager) = fixture().await;
        let key = key_manager.active_signing_key().await.unwrap();
        let claims = claims_with_iat(Utc::now().timestamp() + 10);
        let header = TokenHeader { alg: key.algorithm, kid: Some(key.key_id.clone()) };
        let token = token::encode(&header, &claims, &key).unwrap();

        let ip: IpAddr = "10.0.0.9".parse().unwrap();
        assert!(authenticator.authenticate(&token, ip).await.is_ok());
    }
}
