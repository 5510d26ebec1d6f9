use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Where a principal's credential came from (spec §3 Principal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalSource {
    Token,
    ApiKey,
}

/// Ephemeral, per-request identity produced by the authentication pipeline
/// (spec §3 Principal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub issuer: String,
    pub effective_permissions: HashSet<String>,
    pub token_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub source: PrincipalSource,
    pub issued_at: Option<DateTime<Utc>>,
}
