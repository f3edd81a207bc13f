//! RSA (Rivest-Shamir-Adleman) public-key cryptosystem.
//!
//! Key transport (PKCS#1 v1.5 and OAEP encryption) and PKCS#1 v1.5 signatures
//! over precomputed digests, backed by the RustCrypto `rsa` crate. OAEP
//! encoding is done here so that labels may be arbitrary bytes.

mod oaep;

use ::rsa::hazmat::{rsa_decrypt_and_check, rsa_encrypt};
use ::rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey};
use ::rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use ::rsa::traits::PublicKeyParts;
use ::rsa::{BigUint, Pkcs1v15Encrypt, Pkcs1v15Sign};
use cmskit_types::{CryptoError, HashAlgId};
use rand_core::OsRng;
use zeroize::Zeroizing;

use crate::provider::{Signer, Verifier};

/// Minimum RSA key size in bits accepted for key generation.
const RSA_MIN_BITS: usize = 1024;

/// RSAES-OAEP parameters (RFC 8017 appendix A.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaepParams {
    pub hash: HashAlgId,
    pub mgf_hash: HashAlgId,
    pub label: Vec<u8>,
}

impl Default for OaepParams {
    /// SHA-1, MGF1 with SHA-1, empty label.
    fn default() -> Self {
        Self {
            hash: HashAlgId::Sha1,
            mgf_hash: HashAlgId::Sha1,
            label: Vec::new(),
        }
    }
}

impl OaepParams {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// RSA padding scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RsaPadding {
    /// PKCS#1 v1.5 padding for encryption.
    Pkcs1v15Encrypt,
    /// PKCS#1 v1.5 padding for signatures over a digest of the given hash.
    Pkcs1v15Sign(HashAlgId),
    /// OAEP padding for encryption.
    Oaep(OaepParams),
}

fn pkcs1v15_sign_scheme(alg: HashAlgId) -> Pkcs1v15Sign {
    match alg {
        HashAlgId::Md5 => Pkcs1v15Sign::new::<md5::Md5>(),
        HashAlgId::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        HashAlgId::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgId::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgId::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgId::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        HashAlgId::Sha512_224 => Pkcs1v15Sign::new::<sha2::Sha512_224>(),
        HashAlgId::Sha512_256 => Pkcs1v15Sign::new::<sha2::Sha512_256>(),
    }
}

/// An RSA public key.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    inner: ::rsa::RsaPublicKey,
}

impl std::fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("bits", &self.bits())
            .finish()
    }
}

impl RsaPublicKey {
    /// Parse a PKCS#1 `RSAPublicKey`, the content of an SPKI BIT STRING.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner = ::rsa::RsaPublicKey::from_pkcs1_der(der).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Parse a full `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            ::rsa::RsaPublicKey::from_public_key_der(der).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Encode as a PKCS#1 `RSAPublicKey`.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>, CryptoError> {
        let doc = self
            .inner
            .to_pkcs1_der()
            .map_err(|_| CryptoError::InvalidKey)?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Encrypt data using this public key.
    pub fn encrypt(&self, padding: &RsaPadding, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let res = match padding {
            RsaPadding::Pkcs1v15Encrypt => self.inner.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext),
            RsaPadding::Oaep(params) => {
                let k = self.modulus_len();
                let em = oaep::encode(params, plaintext, k)?;
                let c = rsa_encrypt(&self.inner, &BigUint::from_bytes_be(&em))
                    .map_err(|_| CryptoError::InputOverflow)?;
                return Ok(left_pad(&c.to_bytes_be(), k));
            }
            RsaPadding::Pkcs1v15Sign(_) => return Err(CryptoError::InvalidArg),
        };
        res.map_err(|_| CryptoError::InputOverflow)
    }

    /// Verify a signature against a message digest.
    pub fn verify(
        &self,
        padding: &RsaPadding,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        match padding {
            RsaPadding::Pkcs1v15Sign(alg) => Ok(self
                .inner
                .verify(pkcs1v15_sign_scheme(*alg), digest, signature)
                .is_ok()),
            _ => Err(CryptoError::InvalidArg),
        }
    }

    /// Return the key size in bits.
    pub fn bits(&self) -> usize {
        self.inner.n().bits()
    }

    /// Return the modulus byte length.
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }
}

/// An RSA private key.
#[derive(Clone)]
pub struct RsaPrivateKey {
    inner: ::rsa::RsaPrivateKey,
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.public_key().bits())
            .finish()
    }
}

impl RsaPrivateKey {
    /// Generate a new RSA key pair with the given bit size.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        if bits < RSA_MIN_BITS {
            return Err(CryptoError::InvalidArg);
        }
        let inner = ::rsa::RsaPrivateKey::new(&mut OsRng, bits).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Parse a PKCS#1 `RSAPrivateKey`.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            ::rsa::RsaPrivateKey::from_pkcs1_der(der).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Parse a PKCS#8 `PrivateKeyInfo` holding an RSA key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            ::rsa::RsaPrivateKey::from_pkcs8_der(der).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { inner })
    }

    /// Decrypt data using this private key.
    pub fn decrypt(&self, padding: &RsaPadding, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let res = match padding {
            RsaPadding::Pkcs1v15Encrypt => self.inner.decrypt(Pkcs1v15Encrypt, ciphertext),
            RsaPadding::Oaep(params) => {
                let k = self.inner.size();
                if ciphertext.len() != k {
                    return Err(CryptoError::RsaDecryptFail);
                }
                let m = rsa_decrypt_and_check(
                    &self.inner,
                    Some(&mut OsRng),
                    &BigUint::from_bytes_be(ciphertext),
                )
                .map_err(|_| CryptoError::RsaDecryptFail)?;
                let em = Zeroizing::new(left_pad(&m.to_bytes_be(), k));
                return Ok(oaep::decode(params, &em, k)?.to_vec());
            }
            RsaPadding::Pkcs1v15Sign(_) => return Err(CryptoError::InvalidArg),
        };
        res.map_err(|_| CryptoError::RsaDecryptFail)
    }

    /// Sign a message digest.
    pub fn sign(&self, padding: &RsaPadding, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match padding {
            RsaPadding::Pkcs1v15Sign(alg) => self
                .inner
                .sign(pkcs1v15_sign_scheme(*alg), digest)
                .map_err(|_| CryptoError::RsaInvalidPadding),
            _ => Err(CryptoError::InvalidArg),
        }
    }

    /// Extract the public key.
    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey {
            inner: self.inner.to_public_key(),
        }
    }
}

fn left_pad(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(bytes);
    out
}

/// A private key bound to one digest algorithm, usable as a [`Signer`].
pub struct RsaDigestSigner<'a> {
    pub key: &'a RsaPrivateKey,
    pub hash: HashAlgId,
}

impl Signer for RsaDigestSigner<'_> {
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.key.sign(&RsaPadding::Pkcs1v15Sign(self.hash), digest)
    }
}

/// A public key bound to one digest algorithm, usable as a [`Verifier`].
pub struct RsaDigestVerifier<'a> {
    pub key: &'a RsaPublicKey,
    pub hash: HashAlgId,
}

impl Verifier for RsaDigestVerifier<'_> {
    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        self.key
            .verify(&RsaPadding::Pkcs1v15Sign(self.hash), digest, signature)
    }
}
