//! ECDH (Elliptic Curve Diffie-Hellman) key agreement.
//!
//! Provides ECDH key pair generation and shared secret computation as
//! defined in NIST SP 800-56A over the curves of the [`ecc`](crate::ecc)
//! module. The shared secret is the x-coordinate of the shared point.

use cmskit_types::{CryptoError, EccCurveId};
use zeroize::Zeroizing;

use crate::ecc::{EcPublicKey, EcSecretKey};
use crate::provider::KeyAgreement;

/// An ECDH key pair for key agreement.
#[derive(Clone)]
pub struct EcdhKeyPair {
    secret: EcSecretKey,
}

impl EcdhKeyPair {
    /// Generate a new ECDH key pair for the given curve.
    pub fn generate(curve: EccCurveId) -> Self {
        Self {
            secret: EcSecretKey::generate(curve),
        }
    }

    /// Create an ECDH key pair from existing private key bytes.
    pub fn from_private_key(curve: EccCurveId, private_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            secret: EcSecretKey::from_bytes(curve, private_key)?,
        })
    }

    pub fn from_secret(secret: EcSecretKey) -> Self {
        Self { secret }
    }

    pub fn curve(&self) -> EccCurveId {
        self.secret.curve()
    }

    /// Compute `Z` from the peer's SEC1-encoded public point.
    pub fn shared_secret(&self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let peer = EcPublicKey::from_sec1_bytes(self.curve(), peer_public_key)?;
        let z = match (&self.secret, &peer) {
            (EcSecretKey::P256(sk), EcPublicKey::P256(pk)) => {
                p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            (EcSecretKey::P384(sk), EcPublicKey::P384(pk)) => {
                p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            _ => return Err(CryptoError::EccInvalidPublicKey),
        };
        Ok(Zeroizing::new(z))
    }

    /// Return the public key in uncompressed point encoding.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.secret.public_key().to_uncompressed()
    }
}

impl KeyAgreement for EcdhKeyPair {
    fn compute_shared_secret(&self, peer_public_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.shared_secret(peer_public_key)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecdh_agreement() {
        for curve in [EccCurveId::NistP256, EccCurveId::NistP384] {
            let alice = EcdhKeyPair::generate(curve);
            let bob = EcdhKeyPair::generate(curve);
            let a = alice.shared_secret(&bob.public_key_bytes()).unwrap();
            let b = bob.shared_secret(&alice.public_key_bytes()).unwrap();
            assert_eq!(a.as_slice(), b.as_slice());
            assert_eq!(a.len(), curve.field_len());
        }
    }

    #[test]
    fn test_from_private_key_is_stable() {
        let scalar =
            hex::decode("c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721")
                .unwrap();
        let k1 = EcdhKeyPair::from_private_key(EccCurveId::NistP256, &scalar).unwrap();
        let k2 = EcdhKeyPair::from_private_key(EccCurveId::NistP256, &scalar).unwrap();
        assert_eq!(k1.public_key_bytes(), k2.public_key_bytes());
        // RFC 6979 A.2.5 public key x-coordinate
        assert_eq!(
            hex::encode(&k1.public_key_bytes()[1..33]),
            "60fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6"
        );
    }

    #[test]
    fn test_peer_on_other_curve_rejected() {
        let ours = EcdhKeyPair::generate(EccCurveId::NistP256);
        let theirs = EcdhKeyPair::generate(EccCurveId::NistP384);
        assert!(ours.compute_shared_secret(&theirs.public_key_bytes()).is_err());
    }
}
