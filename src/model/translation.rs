use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One claim-value -> role/group names rule: if the identity provider's
/// `claim_key` claim carries `claim_value` among its values, every name in
/// `grants` is mapped in. Distinct versions can map the same claim value to
/// different role sets (spec §4.4), which a flat identity-name map couldn't
/// express.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRule {
    pub claim_key: String,
    pub claim_value: String,
    pub grants: Vec<String>,
}

/// An ordered set of claim -> role/group mapping rules. Opaque to everything
/// except the translator (spec §3 TranslationConfigVersion.configSchema).
/// Mirrors the teacher's flat-map role expansion (`api/gateway/authz.rs`
/// `RbacManager`) applied one layer up, at the claims boundary instead of
/// the permissions boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub role_rules: Vec<MappingRule>,
    pub group_rules: Vec<MappingRule>,
}

/// One immutable snapshot of the claim-mapping rules (spec §3
/// TranslationConfigVersion). `active` is never stored on the row — it is
/// derived by comparing `id` against the store's `active_version_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfigVersion {
    pub id: String,
    pub version: u64,
    pub config_schema: ConfigSchema,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub comment: Option<String>,
}

/// External claims presented for translation (spec §4.4 `translate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalClaims {
    pub issuer: String,
    pub subject: String,
    pub claims: HashMap<String, Vec<String>>,
}

/// Output of `translate(issuer, subject, claims)` (spec §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub roles: Vec<String>,
    pub permissions: std::collections::HashSet<String>,
}
