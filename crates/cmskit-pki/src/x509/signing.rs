//! Signature checks against a certificate's public key.

use cmskit_crypto::ecdsa::EcdsaKeyPair;
use cmskit_crypto::provider::Verifier;
use cmskit_crypto::rsa::{RsaDigestVerifier, RsaPublicKey};
use cmskit_types::{HashAlgId, PkeyAlgId, PkiError};

use super::SubjectPublicKeyInfo;

/// Verify `signature` over a precomputed `digest` with the key in `spki`.
///
/// RSA keys check a PKCS#1 v1.5 signature whose DigestInfo names `hash_alg`;
/// EC keys check a DER `ECDSA-Sig-Value`. `Ok(false)` is a mismatch.
pub fn verify_digest_signature(
    spki: &SubjectPublicKeyInfo,
    hash_alg: HashAlgId,
    digest: &[u8],
    signature: &[u8],
) -> Result<bool, PkiError> {
    let matched = match spki.key_type() {
        Some(PkeyAlgId::Rsa) => {
            let key = RsaPublicKey::from_pkcs1_der(&spki.public_key)?;
            let verifier = RsaDigestVerifier {
                key: &key,
                hash: hash_alg,
            };
            Verifier::verify(&verifier, digest, signature)?
        }
        Some(PkeyAlgId::Ecdsa) => {
            let key = EcdsaKeyPair::from_public_key(spki.ec_curve()?, &spki.public_key)?;
            Verifier::verify(&key, digest, signature)?
        }
        None => {
            return Err(PkiError::InvalidCert(format!(
                "unsupported public key algorithm {}",
                spki.algorithm
            )))
        }
    };
    Ok(matched)
}
