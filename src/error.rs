use thiserror::Error;

/// Crate-wide error type for the gateway trust plane.
///
/// Variants map deterministically to the HTTP status codes enumerated in
/// the external-interface design (401/403/404/409/412/429/503) via
/// [`GatewayError::status_code`].
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("optimistic lock conflict: expected version {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: missing operation {0}")]
    Forbidden(String),

    #[error("locked out: {0}")]
    LockedOut(String),

    #[error("revoked: {0}")]
    Revoked(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("subsystem disabled: {0}")]
    Disabled(String),

    #[error("dependency unavailable: {0}")]
    Unavailable(String),

    #[error("version counter exhausted after {0} attempts")]
    VersionExhausted(u32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// The status code a transport layer should map this error to.
    /// Never reveals *which* authentication check failed (spec §7).
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::NotFound(_) => 404,
            GatewayError::AlreadyExists(_) => 409,
            GatewayError::InvalidInput(_) => 400,
            GatewayError::VersionConflict { .. } => 409,
            GatewayError::PreconditionFailed(_) => 412,
            GatewayError::Unauthenticated(_) => 401,
            GatewayError::Forbidden(_) => 403,
            GatewayError::LockedOut(_) => 401,
            GatewayError::Revoked(_) => 401,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::Disabled(_) => 503,
            GatewayError::Unavailable(_) => 503,
            GatewayError::VersionExhausted(_) => 503,
            GatewayError::Io(_) => 503,
            GatewayError::Serialization(_) => 400,
        }
    }
}
