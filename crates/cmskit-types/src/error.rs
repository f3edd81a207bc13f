/// Failures of the primitives in `cmskit-crypto` and the codecs in
/// `cmskit-utils`.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    // General errors
    #[error("null or empty input")]
    NullInput,
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,
    #[error("invalid key")]
    InvalidKey,

    // Buffer errors
    #[error("input data too long")]
    InputOverflow,

    // RSA errors
    #[error("rsa: decryption failed")]
    RsaDecryptFail,
    #[error("rsa: invalid padding")]
    RsaInvalidPadding,

    // ECC errors
    #[error("ecc: point not on curve")]
    EccPointNotOnCurve,
    #[error("ecc: invalid private key")]
    EccInvalidPrivateKey,
    #[error("ecc: invalid public key")]
    EccInvalidPublicKey,

    // Symmetric errors
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid iv length")]
    InvalidIvLength,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("key unwrap: integrity check failed")]
    KeyUnwrapFail,
    #[error("key wrap: invalid wrapped key length {0}")]
    InvalidWrappedLength(usize),

    // Random
    #[error("failed to obtain entropy")]
    EntropyFail,

    // KDF errors
    #[error("kdf: derived key length overflow")]
    KdfDkLenOverflow,

    // Decode errors
    #[error("decode: asn1 buffer failed")]
    DecodeAsn1Fail,
    #[error("decode: unknown oid")]
    DecodeUnknownOid,
    #[error("decode: pem framing failed")]
    DecodePemFail,
}

/// X.509 and PKCS#8 errors.
#[derive(Debug, thiserror::Error)]
pub enum PkiError {
    #[error("invalid certificate: {0}")]
    InvalidCert(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("unsupported certificate extension: {0}")]
    UnsupportedExtension(String),
    #[error("asn1 parse error: {0}")]
    Asn1Error(String),
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// CMS message engine errors.
///
/// Primitive failures convert through `From<CryptoError>`: unwrap integrity
/// failures become [`CmsError::Integrity`], malformed input becomes
/// [`CmsError::Decode`] and unknown OIDs become
/// [`CmsError::UnsupportedAlgorithm`].
#[derive(Debug, thiserror::Error)]
pub enum CmsError {
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error("insufficient setup: {0}")]
    InsufficientSetup(String),
    #[error("bad decryption: {0}")]
    BadDecryption(String),
    #[error("unexpected structure: {0}")]
    UnexpectedStructure(String),
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
    #[error("certificate error: {0}")]
    Pki(#[from] PkiError),
    #[error("crypto error: {0}")]
    Crypto(CryptoError),
}

impl From<CryptoError> for CmsError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyUnwrapFail => CmsError::Integrity(e.to_string()),
            CryptoError::InvalidWrappedLength(_) => CmsError::UnexpectedStructure(e.to_string()),
            CryptoError::DecodeAsn1Fail | CryptoError::DecodePemFail => {
                CmsError::Decode(e.to_string())
            }
            CryptoError::DecodeUnknownOid => CmsError::UnsupportedAlgorithm(e.to_string()),
            other => CmsError::Crypto(other),
        }
    }
}

impl CmsError {
    /// Build a decode error from any displayable cause.
    pub fn decode(e: impl std::fmt::Display) -> Self {
        CmsError::Decode(e.to_string())
    }

    /// Build an unexpected-structure error from any displayable cause.
    pub fn structure(e: impl std::fmt::Display) -> Self {
        CmsError::UnexpectedStructure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_failure_maps_to_integrity() {
        let e: CmsError = CryptoError::KeyUnwrapFail.into();
        assert!(matches!(e, CmsError::Integrity(_)));
    }

    #[test]
    fn test_wrapped_length_maps_to_structure() {
        let e: CmsError = CryptoError::InvalidWrappedLength(39).into();
        assert!(matches!(e, CmsError::UnexpectedStructure(_)));
        assert!(e.to_string().contains("39"));
    }

    #[test]
    fn test_other_crypto_errors_pass_through() {
        let e: CmsError = CryptoError::InvalidPadding.into();
        assert!(matches!(e, CmsError::Crypto(CryptoError::InvalidPadding)));
    }

    #[test]
    fn test_decode_helpers() {
        assert!(matches!(CmsError::decode("x"), CmsError::Decode(_)));
        assert!(matches!(
            CmsError::structure("missing field"),
            CmsError::UnexpectedStructure(_)
        ));
    }
}
