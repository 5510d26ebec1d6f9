use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signing-key lifecycle states (spec §3, §4.3).
///
/// Transitions are monotonic: `Pending -> Active -> Deprecated -> Retired`.
/// `Retired` is terminal. At most one key is `Active` at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Pending,
    Active,
    Deprecated,
    Retired,
}

impl KeyStatus {
    pub fn can_sign(self) -> bool {
        matches!(self, KeyStatus::Active)
    }

    pub fn can_verify(self) -> bool {
        matches!(self, KeyStatus::Active | KeyStatus::Deprecated)
    }

    /// Whether `self -> next` is a legal monotonic transition.
    pub fn can_transition_to(self, next: KeyStatus) -> bool {
        matches!(
            (self, next),
            (KeyStatus::Pending, KeyStatus::Active)
                | (KeyStatus::Active, KeyStatus::Deprecated)
                | (KeyStatus::Deprecated, KeyStatus::Retired)
                // emergency retirement path (spec §4.3, force=true)
                | (KeyStatus::Active, KeyStatus::Retired)
        )
    }
}

/// Algorithm family for a signing key. Grounded on the teacher's
/// `api/gateway/auth.rs` `JwtAlgorithm` enum, narrowed to the two families
/// this crate actually signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlgorithm {
    Ed25519,
    Rsa2048Sha256,
}

/// An asymmetric signing key under lifecycle management (spec §3 SigningKey).
///
/// The private key material is an opaque handle (`private_handle`) so an
/// HSM-backed implementation can swap in without changing the lifecycle
/// contract (spec §9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningKey {
    pub key_id: String,
    pub status: KeyStatus,
    pub algorithm: KeyAlgorithm,
    pub public_key: Vec<u8>,
    pub private_handle: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub deprecated_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl SigningKey {
    pub fn can_sign(&self) -> bool {
        self.status.can_sign()
    }

    pub fn can_verify(&self) -> bool {
        self.status.can_verify()
    }
}
