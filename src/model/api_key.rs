use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Long-lived programmatic-caller credential (spec §3 ApiKey).
///
/// `key_hash` is the only lookup key by value; the plaintext is returned
/// exactly once, at creation, and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub key_hash: String,
    pub body: ApiKeyBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The encrypted-at-rest portion of an API key. In this in-memory adapter
/// "encrypted" means "opaque to callers other than the store" — see
/// `store::memory` for the boundary that owns the wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyBody {
    pub name: String,
    pub description: String,
    pub permissions: HashSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl ApiKey {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        if self.body.revoked {
            return false;
        }
        match self.body.expires_at {
            Some(exp) => now < exp,
            None => true,
        }
    }
}
