// Signing-key material generation/sign/verify. Grounded on the teacher's
// `api/gateway/auth.rs` (`JwtValidator`, RSA PKCS1v15 verification via
// `rsa::Pkcs1v15Sign`) and `security_vault/keystore.rs` (key material
// handled as opaque byte vectors, nonces generated with `rand::RngCore`).

use ed25519_dalek::{Signature, Signer, SigningKey as DalekSigningKey, Verifier, VerifyingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::sha2::Sha256;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

use crate::error::{GatewayError, Result};
use crate::model::KeyAlgorithm;

pub struct KeyMaterial {
    pub public_key: Vec<u8>,
    pub private_handle: Vec<u8>,
}

pub fn generate(algorithm: KeyAlgorithm) -> Result<KeyMaterial> {
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            let signing_key = DalekSigningKey::generate(&mut rand_core_compat());
            Ok(KeyMaterial {
                public_key: signing_key.verifying_key().to_bytes().to_vec(),
                private_handle: signing_key.to_bytes().to_vec(),
            })
        }
        KeyAlgorithm::Rsa2048Sha256 => {
            let mut rng = rand_core::OsRng;
            let private = RsaPrivateKey::new(&mut rng, 2048).map_err(|e| GatewayError::Unavailable(format!("rsa keygen: {e}")))?;
            let public = RsaPublicKey::from(&private);
            Ok(KeyMaterial {
                public_key: public.to_pkcs1_der().map_err(|e| GatewayError::Serialization(e.to_string()))?.as_bytes().to_vec(),
                private_handle: private.to_pkcs1_der().map_err(|e| GatewayError::Serialization(e.to_string()))?.as_bytes().to_vec(),
            })
        }
    }
}

pub fn sign(algorithm: KeyAlgorithm, private_handle: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            let bytes: [u8; 32] = private_handle.try_into().map_err(|_| GatewayError::Serialization("bad ed25519 key length".into()))?;
            let signing_key = DalekSigningKey::from_bytes(&bytes);
            Ok(signing_key.sign(message).to_bytes().to_vec())
        }
        KeyAlgorithm::Rsa2048Sha256 => {
            let private = RsaPrivateKey::from_pkcs1_der(private_handle).map_err(|e| GatewayError::Serialization(e.to_string()))?;
            use sha2::Digest;
            let digest = sha2::Sha256::digest(message);
            private
                .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
                .map_err(|e| GatewayError::Serialization(format!("rsa sign: {e}")))
        }
    }
}

pub fn verify(algorithm: KeyAlgorithm, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool> {
    match algorithm {
        KeyAlgorithm::Ed25519 => {
            let key_bytes: [u8; 32] = public_key.try_into().map_err(|_| GatewayError::Serialization("bad ed25519 public key length".into()))?;
            let verifying_key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| GatewayError::Serialization(e.to_string()))?;
            let sig_bytes: [u8; 64] = signature.try_into().map_err(|_| GatewayError::Serialization("bad signature length".into()))?;
            let signature = Signature::from_bytes(&sig_bytes);
            Ok(verifying_key.verify(message, &signature).is_ok())
        }
        KeyAlgorithm::Rsa2048Sha256 => {
            let public = RsaPublicKey::from_pkcs1_der(public_key).map_err(|e| GatewayError::Serialization(e.to_string()))?;
            use sha2::Digest;
            let digest = sha2::Sha256::digest(message);
            Ok(public.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature).is_ok())
        }
    }
}

// ed25519-dalek 2.x's `Signer::generate` wants `rand_core::CryptoRngCore`
// (rand_core 0.6), not `rand` 0.9's `RngCore` used elsewhere in this file.
fn rand_core_compat() -> impl rand_core::CryptoRngCore {
    rand_core::OsRng
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_round_trip() {
        let material = generate(KeyAlgorithm::Ed25519).unwrap();
        let msg = b"hello gateway";
        let sig = sign(KeyAlgorithm::Ed25519, &material.private_handle, msg).unwrap();
        assert!(verify(KeyAlgorithm::Ed25519, &material.public_key, msg, &sig).unwrap());
        assert!(!verify(KeyAlgorithm::Ed25519, &material.public_key, b"tampered", &sig).unwrap());
    }

    #[test]
    fn rsa_round_trip() {
        let material = generate(KeyAlgorithm::Rsa2048Sha256).unwrap();
        let msg = b"hello gateway";
        let sig = sign(KeyAlgorithm::Rsa2048Sha256, &material.private_handle, msg).unwrap();
        assert!(verify(KeyAlgorithm::Rsa2048Sha256, &material.public_key, msg, &sig).unwrap());
    }
}
