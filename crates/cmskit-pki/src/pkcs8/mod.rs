//! PKCS#8 Private Key Parsing and Encoding (RFC 5958).
//!
//! Supports PrivateKeyInfo structures for RSA (PKCS#1) and EC keys on
//! P-256 and P-384 (RFC 5915). The resulting [`PrivateKey`] is the secret
//! handed to CMS signers and key-transport / key-agreement recipients.

use cmskit_crypto::ecc::EcSecretKey;
use cmskit_crypto::ecdh::EcdhKeyPair;
use cmskit_crypto::ecdsa::EcdsaKeyPair;
use cmskit_crypto::hash::digest;
use cmskit_crypto::rsa::{RsaPadding, RsaPrivateKey};
use cmskit_types::{CryptoError, EccCurveId, HashAlgId, PkeyAlgId, PkiError};
use cmskit_utils::asn1::{Decoder, Encoder};
use cmskit_utils::oid::{known, Oid};
use zeroize::Zeroizing;

use crate::encoding::enc_null;
use crate::oid_mapping::{curve_id_to_oid, oid_to_curve_id, signature_oid};
use crate::x509::SubjectPublicKeyInfo;

/// The key material of a [`PrivateKey`].
#[derive(Clone)]
pub enum PrivateKeyKind {
    /// RSA private key (PKCS#1).
    Rsa(RsaPrivateKey),
    /// EC private scalar with its curve.
    Ec(EcSecretKey),
}

/// A private key together with the digest it signs with.
#[derive(Clone)]
pub struct PrivateKey {
    kind: PrivateKeyKind,
    hash: HashAlgId,
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("type", &self.key_type())
            .field("curve", &self.curve())
            .field("hash", &self.hash)
            .finish()
    }
}

fn default_hash(kind: &PrivateKeyKind) -> HashAlgId {
    match kind {
        PrivateKeyKind::Ec(sk) if sk.curve() == EccCurveId::NistP384 => HashAlgId::Sha384,
        _ => HashAlgId::Sha256,
    }
}

impl PrivateKey {
    pub fn new(kind: PrivateKeyKind) -> Self {
        let hash = default_hash(&kind);
        Self { kind, hash }
    }

    /// Generate a fresh EC key.
    pub fn generate_ec(curve: EccCurveId) -> Self {
        Self::new(PrivateKeyKind::Ec(EcSecretKey::generate(curve)))
    }

    /// Generate a fresh RSA key.
    pub fn generate_rsa(bits: usize) -> Result<Self, PkiError> {
        Ok(Self::new(PrivateKeyKind::Rsa(RsaPrivateKey::generate(bits)?)))
    }

    /// Use `hash` for subsequent signatures.
    pub fn with_hash(mut self, hash: HashAlgId) -> Self {
        self.hash = hash;
        self
    }

    pub fn hash(&self) -> HashAlgId {
        self.hash
    }

    pub fn kind(&self) -> &PrivateKeyKind {
        &self.kind
    }

    pub fn key_type(&self) -> PkeyAlgId {
        match self.kind {
            PrivateKeyKind::Rsa(_) => PkeyAlgId::Rsa,
            PrivateKeyKind::Ec(_) => PkeyAlgId::Ecdsa,
        }
    }

    /// Curve of an EC key; `None` for RSA.
    pub fn curve(&self) -> Option<EccCurveId> {
        match &self.kind {
            PrivateKeyKind::Ec(sk) => Some(sk.curve()),
            PrivateKeyKind::Rsa(_) => None,
        }
    }

    /// Parse a DER-encoded PKCS#8 PrivateKeyInfo.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, PkiError> {
        parse_pkcs8_der(der).map_err(|e| PkiError::InvalidKey(e.to_string()))
    }

    /// Parse a PEM private key: `PRIVATE KEY` (PKCS#8) or `RSA PRIVATE KEY`
    /// (PKCS#1).
    pub fn from_pem(pem: &str) -> Result<Self, PkiError> {
        let blocks =
            cmskit_utils::pem::parse(pem).map_err(|e| PkiError::InvalidKey(e.to_string()))?;
        for block in &blocks {
            match block.label.as_str() {
                "PRIVATE KEY" => return Self::from_pkcs8_der(&block.data),
                "RSA PRIVATE KEY" => {
                    let key = RsaPrivateKey::from_pkcs1_der(&block.data)?;
                    return Ok(Self::new(PrivateKeyKind::Rsa(key)));
                }
                _ => {}
            }
        }
        Err(PkiError::InvalidKey("no PRIVATE KEY block found".into()))
    }

    /// SubjectPublicKeyInfo of the matching public key.
    pub fn public_key_info(&self) -> Result<SubjectPublicKeyInfo, PkiError> {
        match &self.kind {
            PrivateKeyKind::Rsa(rsa) => Ok(SubjectPublicKeyInfo {
                algorithm: known::rsa_encryption(),
                parameters: None,
                public_key: rsa.public_key().to_pkcs1_der()?,
            }),
            PrivateKeyKind::Ec(sk) => Ok(SubjectPublicKeyInfo {
                algorithm: known::ec_public_key(),
                parameters: Some(curve_id_to_oid(sk.curve()).to_der()),
                public_key: sk.public_key().to_uncompressed(),
            }),
        }
    }

    /// True when `spki` carries this key's public half.
    pub fn matches_public_key(&self, spki: &SubjectPublicKeyInfo) -> bool {
        match self.public_key_info() {
            Ok(own) => {
                own.algorithm == spki.algorithm && own.public_key == spki.public_key
            }
            Err(_) => false,
        }
    }

    /// Signature algorithm OID for this key and its digest.
    pub fn signature_algorithm(&self) -> Result<Oid, PkiError> {
        signature_oid(self.key_type(), self.hash).ok_or_else(|| {
            PkiError::InvalidKey(format!("no signature algorithm for {}", self.hash.name()))
        })
    }

    /// Signature AlgorithmIdentifier parameters: NULL for RSA, absent for ECDSA.
    pub fn signature_algorithm_params(&self) -> Option<Vec<u8>> {
        match self.kind {
            PrivateKeyKind::Rsa(_) => Some(enc_null()),
            PrivateKeyKind::Ec(_) => None,
        }
    }

    /// Sign a precomputed digest made with `hash`.
    pub fn sign_digest(&self, hash: HashAlgId, digest: &[u8]) -> Result<Vec<u8>, PkiError> {
        match &self.kind {
            PrivateKeyKind::Rsa(rsa) => Ok(rsa.sign(&RsaPadding::Pkcs1v15Sign(hash), digest)?),
            PrivateKeyKind::Ec(sk) => Ok(EcdsaKeyPair::from_secret(sk.clone()).sign(digest)?),
        }
    }

    /// Hash `data` with this key's digest and sign it.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, PkiError> {
        self.sign_digest(self.hash, &digest(self.hash, data))
    }

    /// RSA decryption for key transport.
    pub fn rsa_decrypt(&self, padding: &RsaPadding, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match &self.kind {
            PrivateKeyKind::Rsa(rsa) => Ok(Zeroizing::new(rsa.decrypt(padding, ciphertext)?)),
            PrivateKeyKind::Ec(_) => Err(CryptoError::InvalidKey),
        }
    }

    /// ECDH shared secret with a SEC1-encoded peer point.
    pub fn ecdh(&self, peer_public_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        match &self.kind {
            PrivateKeyKind::Ec(sk) => EcdhKeyPair::from_secret(sk.clone()).shared_secret(peer_public_key),
            PrivateKeyKind::Rsa(_) => Err(CryptoError::InvalidKey),
        }
    }
}

impl From<RsaPrivateKey> for PrivateKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self::new(PrivateKeyKind::Rsa(key))
    }
}

impl From<EcSecretKey> for PrivateKey {
    fn from(key: EcSecretKey) -> Self {
        Self::new(PrivateKeyKind::Ec(key))
    }
}

/// Parse a DER-encoded PKCS#8 PrivateKeyInfo.
///
/// ```text
/// PrivateKeyInfo ::= SEQUENCE {
///     version                   INTEGER,
///     privateKeyAlgorithm       AlgorithmIdentifier,
///     privateKey                OCTET STRING
/// }
/// ```
pub fn parse_pkcs8_der(der: &[u8]) -> Result<PrivateKey, CryptoError> {
    let mut outer = Decoder::new(der);
    let mut seq = outer.read_sequence()?;

    // version (INTEGER, must be 0 or 1)
    if seq.read_u32()? > 1 {
        return Err(CryptoError::DecodeAsn1Fail);
    }

    let mut alg_id = seq.read_sequence()?;
    let algorithm_oid = Oid::from_der_value(alg_id.read_oid()?)?;
    let alg_params = alg_id.remaining();

    let private_key_bytes = seq.read_octet_string()?;

    if algorithm_oid == known::rsa_encryption() {
        let key = RsaPrivateKey::from_pkcs8_der(der)?;
        Ok(PrivateKey::new(PrivateKeyKind::Rsa(key)))
    } else if algorithm_oid == known::ec_public_key() {
        parse_ec_private_key(alg_params, private_key_bytes)
    } else {
        Err(CryptoError::DecodeUnknownOid)
    }
}

// ===== EC =====

fn parse_ec_curve_oid(params: &[u8]) -> Result<EccCurveId, CryptoError> {
    let mut dec = Decoder::new(params);
    let curve_oid = Oid::from_der_value(dec.read_oid()?)?;
    oid_to_curve_id(&curve_oid).ok_or(CryptoError::DecodeUnknownOid)
}

/// Parse an ECPrivateKey (RFC 5915) from the PKCS#8 privateKey OCTET STRING.
///
/// ```text
/// ECPrivateKey ::= SEQUENCE {
///     version        INTEGER { ecPrivkeyVer1(1) },
///     privateKey     OCTET STRING,
///     parameters [0] ECParameters OPTIONAL,
///     publicKey  [1] BIT STRING OPTIONAL
/// }
/// ```
///
/// The curve comes from the AlgorithmIdentifier, else from `parameters`.
fn parse_ec_private_key(alg_params: &[u8], data: &[u8]) -> Result<PrivateKey, CryptoError> {
    let mut seq = Decoder::new(data).read_sequence()?;
    if seq.read_u32()? != 1 {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let private_key = seq.read_octet_string()?;
    let embedded = seq.try_read_context_specific(0, true)?;

    let curve_id = if !alg_params.is_empty() {
        parse_ec_curve_oid(alg_params)?
    } else if let Some(params) = embedded {
        parse_ec_curve_oid(params.value)?
    } else {
        return Err(CryptoError::DecodeAsn1Fail);
    };

    let key = EcSecretKey::from_bytes(curve_id, private_key)?;
    Ok(PrivateKey::new(PrivateKeyKind::Ec(key)))
}

/// Encode a PKCS#8 PrivateKeyInfo to DER given the raw components.
pub fn encode_pkcs8_der_raw(
    algorithm_oid: &Oid,
    algorithm_params: Option<&[u8]>,
    private_key_der: &[u8],
) -> Vec<u8> {
    let mut alg_enc = Encoder::new();
    alg_enc.write_oid(&algorithm_oid.to_der_value());
    match algorithm_params {
        Some(params) => alg_enc.write_raw(params),
        None => alg_enc.write_null(),
    };
    let alg_bytes = alg_enc.finish();

    let mut body = Encoder::new();
    body.write_integer(&[0]);
    body.write_sequence(&alg_bytes);
    body.write_octet_string(private_key_der);
    let body = body.finish();

    let mut out = Encoder::new();
    out.write_sequence(&body);
    out.finish()
}

/// Encode an EC private key as a PKCS#8 DER PrivateKeyInfo.
pub fn encode_ec_pkcs8_der(curve_id: EccCurveId, private_key: &[u8]) -> Vec<u8> {
    let mut ec_enc = Encoder::new();
    ec_enc.write_integer(&[1]);
    ec_enc.write_octet_string(private_key);
    let ec_body = ec_enc.finish();

    let mut ec_seq = Encoder::new();
    ec_seq.write_sequence(&ec_body);
    let private_key_der = ec_seq.finish();

    encode_pkcs8_der_raw(
        &known::ec_public_key(),
        Some(&curve_id_to_oid(curve_id).to_der()),
        &private_key_der,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EC_P256_PEM: &str = include_str!("../../../../tests/data/ec_p256.pem");
    const EC_P384_PEM: &str = include_str!("../../../../tests/data/ec_p384.pem");
    const RSA_PEM: &str = include_str!("../../../../tests/data/rsa2048.pem");

    #[test]
    fn test_parse_ec_p256_pem() {
        let key = PrivateKey::from_pem(EC_P256_PEM).unwrap();
        assert_eq!(key.key_type(), PkeyAlgId::Ecdsa);
        assert_eq!(key.curve(), Some(EccCurveId::NistP256));
        assert_eq!(key.hash(), HashAlgId::Sha256);
        assert_eq!(key.signature_algorithm().unwrap(), known::ecdsa_with_sha256());
        assert!(key.signature_algorithm_params().is_none());
    }

    #[test]
    fn test_parse_ec_p384_defaults_to_sha384() {
        let key = PrivateKey::from_pem(EC_P384_PEM).unwrap();
        assert_eq!(key.curve(), Some(EccCurveId::NistP384));
        assert_eq!(key.hash(), HashAlgId::Sha384);
        let key = key.with_hash(HashAlgId::Sha512);
        assert_eq!(key.signature_algorithm().unwrap(), known::ecdsa_with_sha512());
    }

    #[test]
    fn test_parse_rsa_pem_signs() {
        let key = PrivateKey::from_pem(RSA_PEM).unwrap();
        assert_eq!(key.key_type(), PkeyAlgId::Rsa);
        assert_eq!(key.signature_algorithm().unwrap(), known::sha256_with_rsa_encryption());
        assert_eq!(key.signature_algorithm_params(), Some(vec![0x05, 0x00]));

        let sig = key.sign(b"message").unwrap();
        assert_eq!(sig.len(), 256);
        let spki = key.public_key_info().unwrap();
        let d = digest(HashAlgId::Sha256, b"message");
        assert!(crate::x509::verify_digest_signature(&spki, HashAlgId::Sha256, &d, &sig).unwrap());
    }

    #[test]
    fn test_pkcs8_ec_roundtrip() {
        let scalar = hex::decode("c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721")
            .unwrap();
        let der = encode_ec_pkcs8_der(EccCurveId::NistP256, &scalar);
        let key = PrivateKey::from_pkcs8_der(&der).unwrap();
        assert_eq!(key.curve(), Some(EccCurveId::NistP256));

        let d = digest(HashAlgId::Sha256, b"abc");
        let sig = key.sign_digest(HashAlgId::Sha256, &d).unwrap();
        let spki = key.public_key_info().unwrap();
        assert!(key.matches_public_key(&spki));
        assert!(crate::x509::verify_digest_signature(&spki, HashAlgId::Sha256, &d, &sig).unwrap());
    }

    #[test]
    fn test_ecdh_agrees() {
        let a = PrivateKey::generate_ec(EccCurveId::NistP256);
        let b = PrivateKey::generate_ec(EccCurveId::NistP256);
        let a_pub = a.public_key_info().unwrap().public_key;
        let b_pub = b.public_key_info().unwrap().public_key;
        assert_eq!(*a.ecdh(&b_pub).unwrap(), *b.ecdh(&a_pub).unwrap());
        assert!(a.rsa_decrypt(&RsaPadding::Pkcs1v15Encrypt, &[0u8; 32]).is_err());
    }

    #[test]
    fn test_pkcs8_invalid_version() {
        let der = encode_pkcs8_der_raw(&known::ec_public_key(), None, &[0x30, 0x00]);
        let mut patched = der.clone();
        // version INTEGER content follows the outer header
        let pos = patched.iter().position(|&b| b == 0x02).unwrap();
        patched[pos + 2] = 5;
        assert!(PrivateKey::from_pkcs8_der(&patched).is_err());
    }

    #[test]
    fn test_unknown_algorithm() {
        let der = encode_pkcs8_der_raw(&known::sha256(), None, &[0x04, 0x00]);
        assert!(matches!(
            parse_pkcs8_der(&der),
            Err(CryptoError::DecodeUnknownOid)
        ));
    }
}
