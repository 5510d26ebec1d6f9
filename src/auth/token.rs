// Issued-token parsing/signing. Grounded on the teacher's
// `api/gateway/auth.rs` `JwtClaims`/`JwtValidator`: hand-rolled three-segment
// base64url tokens verified against a `kid`-keyed key map, no external JWT
// crate (the teacher never pulls one in either).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{GatewayError, Result};
use crate::keys::{sign, verify};
use crate::model::{KeyAlgorithm, SigningKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: KeyAlgorithm,
    pub kid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub exp: i64,
    pub nbf: Option<i64>,
    pub iat: i64,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

pub struct ParsedToken {
    pub header: TokenHeader,
    pub claims: TokenClaims,
    signing_input: Vec<u8>,
    signature: Vec<u8>,
}

/// Splits a bearer credential into the three dot-separated base64url
/// segments that mark it as an issued token (spec §4.2 dispatch rule).
pub fn looks_like_token(credential: &str) -> bool {
    credential.split('.').count() == 3
}

pub fn encode(header: &TokenHeader, claims: &TokenClaims, key: &SigningKey) -> Result<String> {
    let header_json = serde_json::to_vec(header).map_err(|e| GatewayError::Serialization(e.to_string()))?;
    let claims_json = serde_json::to_vec(claims).map_err(|e| GatewayError::Serialization(e.to_string()))?;
    let header_b64 = URL_SAFE_NO_PAD.encode(header_json);
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = sign(header.alg, &key.private_handle, signing_input.as_bytes())?;
    let sig_b64 = URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{signing_input}.{sig_b64}"))
}

pub fn decode(credential: &str) -> Result<ParsedToken> {
    let mut parts = credential.splitn(3, '.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(GatewayError::Unauthenticated("malformed".into()));
    };
    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| GatewayError::Unauthenticated("malformed".into()))?;
    let claims_bytes = URL_SAFE_NO_PAD.decode(claims_b64).map_err(|_| GatewayError::Unauthenticated("malformed".into()))?;
    let signature = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| GatewayError::Unauthenticated("malformed".into()))?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|_| GatewayError::Unauthenticated("malformed".into()))?;
    let claims: TokenClaims = serde_json::from_slice(&claims_bytes).map_err(|_| GatewayError::Unauthenticated("malformed".into()))?;
    let signing_input = format!("{header_b64}.{claims_b64}").into_bytes();
    Ok(ParsedToken { header, claims, signing_input, signature })
}

impl ParsedToken {
    pub fn verify_signature(&self, key: &SigningKey) -> Result<bool> {
        verify(self.header.alg, &key.public_key, &self.signing_input, &self.signature)
    }
}
