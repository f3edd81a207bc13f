//! Elliptic curve key types for the NIST prime curves.
//!
//! [`EcSecretKey`] and [`EcPublicKey`] dispatch over P-256 and P-384 so that
//! ECDH and ECDSA code can be written once per operation instead of once per
//! curve.

use cmskit_types::{CryptoError, EccCurveId};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;

/// A private scalar on one of the supported curves.
#[derive(Clone)]
pub enum EcSecretKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
}

/// A public point on one of the supported curves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

impl EcSecretKey {
    /// Generate a fresh random key.
    pub fn generate(curve: EccCurveId) -> Self {
        match curve {
            EccCurveId::NistP256 => EcSecretKey::P256(p256::SecretKey::random(&mut OsRng)),
            EccCurveId::NistP384 => EcSecretKey::P384(p384::SecretKey::random(&mut OsRng)),
        }
    }

    /// Load a big-endian private scalar. Shorter inputs are left-padded.
    pub fn from_bytes(curve: EccCurveId, scalar: &[u8]) -> Result<Self, CryptoError> {
        let len = curve.field_len();
        if scalar.is_empty() || scalar.len() > len {
            return Err(CryptoError::EccInvalidPrivateKey);
        }
        let mut padded = zeroize::Zeroizing::new(vec![0u8; len]);
        padded[len - scalar.len()..].copy_from_slice(scalar);
        let key = match curve {
            EccCurveId::NistP256 => p256::SecretKey::from_slice(&padded).map(EcSecretKey::P256),
            EccCurveId::NistP384 => p384::SecretKey::from_slice(&padded).map(EcSecretKey::P384),
        };
        key.map_err(|_| CryptoError::EccInvalidPrivateKey)
    }

    pub fn curve(&self) -> EccCurveId {
        match self {
            EcSecretKey::P256(_) => EccCurveId::NistP256,
            EcSecretKey::P384(_) => EccCurveId::NistP384,
        }
    }

    /// The private scalar as fixed-width big-endian bytes.
    pub fn to_bytes(&self) -> zeroize::Zeroizing<Vec<u8>> {
        zeroize::Zeroizing::new(match self {
            EcSecretKey::P256(k) => k.to_bytes().to_vec(),
            EcSecretKey::P384(k) => k.to_bytes().to_vec(),
        })
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            EcSecretKey::P256(k) => EcPublicKey::P256(k.public_key()),
            EcSecretKey::P384(k) => EcPublicKey::P384(k.public_key()),
        }
    }
}

impl EcPublicKey {
    /// Decode a SEC1 point (compressed or uncompressed).
    pub fn from_sec1_bytes(curve: EccCurveId, bytes: &[u8]) -> Result<Self, CryptoError> {
        let key = match curve {
            EccCurveId::NistP256 => p256::PublicKey::from_sec1_bytes(bytes).map(EcPublicKey::P256),
            EccCurveId::NistP384 => p384::PublicKey::from_sec1_bytes(bytes).map(EcPublicKey::P384),
        };
        key.map_err(|_| CryptoError::EccPointNotOnCurve)
    }

    pub fn curve(&self) -> EccCurveId {
        match self {
            EcPublicKey::P256(_) => EccCurveId::NistP256,
            EcPublicKey::P384(_) => EccCurveId::NistP384,
        }
    }

    /// Uncompressed SEC1 encoding `04 || x || y`.
    pub fn to_uncompressed(&self) -> Vec<u8> {
        match self {
            EcPublicKey::P256(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            EcPublicKey::P384(k) => k.to_encoded_point(false).as_bytes().to_vec(),
        }
    }
}
