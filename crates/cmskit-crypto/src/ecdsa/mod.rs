//! ECDSA (Elliptic Curve Digital Signature Algorithm) over precomputed digests.
//!
//! Signatures are DER-encoded `SEQUENCE { r INTEGER, s INTEGER }` as carried
//! in a CMS SignerInfo. Operates over NIST P-256 and P-384 through the
//! RustCrypto curve crates.

use cmskit_types::{CryptoError, EccCurveId};
use signature::hazmat::{PrehashSigner, PrehashVerifier};
use zeroize::Zeroizing;

use crate::ecc::{EcPublicKey, EcSecretKey};
use crate::provider::{Signer, Verifier};

/// An ECDSA key pair, or a public key alone for verification.
#[derive(Clone)]
pub struct EcdsaKeyPair {
    secret: Option<EcSecretKey>,
    public: EcPublicKey,
}

impl EcdsaKeyPair {
    /// Generate a new ECDSA key pair for the given curve.
    pub fn generate(curve: EccCurveId) -> Self {
        let secret = EcSecretKey::generate(curve);
        let public = secret.public_key();
        Self {
            secret: Some(secret),
            public,
        }
    }

    /// Create an ECDSA key pair from existing private key bytes.
    pub fn from_private_key(curve: EccCurveId, private_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self::from_secret(EcSecretKey::from_bytes(curve, private_key)?))
    }

    pub fn from_secret(secret: EcSecretKey) -> Self {
        let public = secret.public_key();
        Self {
            secret: Some(secret),
            public,
        }
    }

    /// Create a verifier from a SEC1-encoded public point.
    pub fn from_public_key(curve: EccCurveId, public_key: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            secret: None,
            public: EcPublicKey::from_sec1_bytes(curve, public_key)?,
        })
    }

    /// Return the private key scalar as big-endian bytes.
    pub fn private_key_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        self.secret
            .as_ref()
            .map(EcSecretKey::to_bytes)
            .ok_or(CryptoError::EccInvalidPrivateKey)
    }

    /// Sign a message digest, returning the DER-encoded (r, s) signature.
    pub fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let secret = self.secret.as_ref().ok_or(CryptoError::EccInvalidPrivateKey)?;
        let e = prehash_input(digest, self.curve_id());
        let der = match secret {
            EcSecretKey::P256(sk) => {
                let key = p256::ecdsa::SigningKey::from(sk);
                let sig: p256::ecdsa::Signature = key
                    .sign_prehash(&e)
                    .map_err(|_| CryptoError::EccInvalidPrivateKey)?;
                sig.to_der().as_bytes().to_vec()
            }
            EcSecretKey::P384(sk) => {
                let key = p384::ecdsa::SigningKey::from(sk);
                let sig: p384::ecdsa::Signature = key
                    .sign_prehash(&e)
                    .map_err(|_| CryptoError::EccInvalidPrivateKey)?;
                sig.to_der().as_bytes().to_vec()
            }
        };
        Ok(der)
    }

    /// Verify a DER-encoded signature against a message digest.
    ///
    /// A malformed signature verifies as `false` rather than erroring.
    pub fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        let e = prehash_input(digest, self.curve_id());
        let ok = match &self.public {
            EcPublicKey::P256(pk) => match p256::ecdsa::Signature::from_der(signature) {
                Ok(sig) => p256::ecdsa::VerifyingKey::from(pk)
                    .verify_prehash(&e, &sig)
                    .is_ok(),
                Err(_) => false,
            },
            EcPublicKey::P384(pk) => match p384::ecdsa::Signature::from_der(signature) {
                Ok(sig) => p384::ecdsa::VerifyingKey::from(pk)
                    .verify_prehash(&e, &sig)
                    .is_ok(),
                Err(_) => false,
            },
        };
        Ok(ok)
    }

    /// Return the public key in uncompressed point encoding.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_uncompressed()
    }

    pub fn public_key(&self) -> &EcPublicKey {
        &self.public
    }

    /// Return the curve identifier.
    pub fn curve_id(&self) -> EccCurveId {
        self.public.curve()
    }
}

/// Digests shorter than half the field are left-padded; the integer value
/// of the digest is unchanged.
fn prehash_input(digest: &[u8], curve: EccCurveId) -> Vec<u8> {
    let min = curve.field_len() / 2;
    if digest.len() >= min {
        return digest.to_vec();
    }
    let mut out = vec![0u8; curve.field_len() - digest.len()];
    out.extend_from_slice(digest);
    out
}

impl Signer for EcdsaKeyPair {
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        EcdsaKeyPair::sign(self, digest)
    }
}

impl Verifier for EcdsaKeyPair {
    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        EcdsaKeyPair::verify(self, digest, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;
    use cmskit_types::HashAlgId;

    // SHA-256("hello")
    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_ecdsa_sign_verify_p256() {
        let key = EcdsaKeyPair::generate(EccCurveId::NistP256);
        let digest = hex::decode(HELLO_SHA256).unwrap();
        let sig = key.sign(&digest).unwrap();
        assert_eq!(sig[0], 0x30);
        assert!(key.verify(&digest, &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_sign_verify_p384() {
        let key = EcdsaKeyPair::generate(EccCurveId::NistP384);
        let digest = digest(HashAlgId::Sha384, b"hello");
        let sig = key.sign(&digest).unwrap();
        assert!(key.verify(&digest, &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_short_digest_on_p384() {
        let key = EcdsaKeyPair::generate(EccCurveId::NistP384);
        let digest = digest(HashAlgId::Sha1, b"hello");
        let sig = key.sign(&digest).unwrap();
        assert!(key.verify(&digest, &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_tamper_detection() {
        let key = EcdsaKeyPair::generate(EccCurveId::NistP256);
        let digest = hex::decode(HELLO_SHA256).unwrap();
        let mut sig = key.sign(&digest).unwrap();

        let mut bad_digest = digest.clone();
        bad_digest[0] ^= 0x01;
        assert!(!key.verify(&bad_digest, &sig).unwrap());

        let last = sig.len() - 1;
        sig[last] ^= 0x01;
        assert!(!key.verify(&digest, &sig).unwrap());
        assert!(!key.verify(&digest, b"not der").unwrap());
    }

    #[test]
    fn test_ecdsa_verify_with_public_key_only() {
        let key = EcdsaKeyPair::generate(EccCurveId::NistP256);
        let digest = hex::decode(HELLO_SHA256).unwrap();
        let sig = key.sign(&digest).unwrap();

        let verifier =
            EcdsaKeyPair::from_public_key(EccCurveId::NistP256, &key.public_key_bytes()).unwrap();
        assert!(verifier.verify(&digest, &sig).unwrap());
        assert!(verifier.sign(&digest).is_err());
        assert!(verifier.private_key_bytes().is_err());
    }

    #[test]
    fn test_ecdsa_trait_objects() {
        let key = EcdsaKeyPair::generate(EccCurveId::NistP256);
        let signer: &dyn Signer = &key;
        let verifier: &dyn Verifier = &key;
        let digest = hex::decode(HELLO_SHA256).unwrap();
        let sig = signer.sign(&digest).unwrap();
        assert!(verifier.verify(&digest, &sig).unwrap());
    }
}
