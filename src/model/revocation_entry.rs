use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Single-token or blanket user-wide revocation (spec §3 Revocation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RevocationEntry {
    Token { jti: String, expires_at: DateTime<Utc> },
    User { user_id: String, revoked_at: DateTime<Utc>, expires_at: DateTime<Utc> },
}

impl RevocationEntry {
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            RevocationEntry::Token { expires_at, .. } => *expires_at,
            RevocationEntry::User { expires_at, .. } => *expires_at,
        }
    }
}

/// One of `ip:<addr>`, `user:<id>`, `apikey:<prefix>` (spec §3
/// LockoutEntry.key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockoutScope {
    Ip(String),
    User(String),
    ApiKey(String),
}

impl std::fmt::Display for LockoutScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockoutScope::Ip(v) => write!(f, "ip:{v}"),
            LockoutScope::User(v) => write!(f, "user:{v}"),
            LockoutScope::ApiKey(v) => write!(f, "apikey:{v}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutEntry {
    pub key: LockoutScope,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reason: String,
    pub failed_attempts: u32,
    pub lockout_count: u32,
}
