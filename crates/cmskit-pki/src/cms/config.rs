//! CMS message configuration with builder pattern.

use std::fmt;

use cmskit_crypto::rsa::OaepParams;
use cmskit_types::{CipherAlgId, HashAlgId, KeyWrapAlgId};

use crate::x509::IdentifierKind;

/// Serialization format for encoded messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `-----BEGIN CMS-----` armor, 64-column base64.
    #[default]
    Pem,
    /// Raw DER.
    Der,
}

/// Defaults applied when building new messages, signers and recipients.
#[derive(Clone)]
pub struct CmsConfig {
    /// Format used by `Display` and `encode` when none is given. Default: PEM.
    pub output_format: OutputFormat,
    /// Content-encryption cipher for new Enveloped/Encrypted data. Default: AES-128-CBC.
    pub content_cipher: CipherAlgId,
    /// Digest for new signers and DigestedData. Default: SHA-256.
    pub digest: HashAlgId,
    /// PBKDF2 iteration count for password recipients. Default: 2048.
    pub pbkdf2_iterations: u32,
    /// Largest PBKDF2 iteration count accepted from a received message. Default: 10,000,000.
    pub pbkdf2_max_iterations: u32,
    /// PBKDF2 PRF; `None` leaves the parameter out (HMAC-SHA1 implied).
    pub pbkdf2_prf: Option<HashAlgId>,
    /// Identifier form for new signers and certificate recipients.
    pub signer_identifier: IdentifierKind,
    /// RSA-OAEP parameters for new key-transport recipients; `None` selects PKCS#1 v1.5.
    pub oaep: Option<OaepParams>,
    /// Key wrap for new key-agreement recipients. Default: AES-128 wrap.
    pub key_agreement_wrap: KeyWrapAlgId,
}

impl Default for CmsConfig {
    fn default() -> Self {
        CmsConfigBuilder::default().build()
    }
}

impl fmt::Debug for CmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsConfig")
            .field("output_format", &self.output_format)
            .field("content_cipher", &self.content_cipher)
            .field("digest", &self.digest)
            .field("pbkdf2_iterations", &self.pbkdf2_iterations)
            .field("pbkdf2_max_iterations", &self.pbkdf2_max_iterations)
            .field("pbkdf2_prf", &self.pbkdf2_prf)
            .field("signer_identifier", &self.signer_identifier)
            .field("oaep", &self.oaep.as_ref().map(|p| p.hash))
            .field("key_agreement_wrap", &self.key_agreement_wrap)
            .finish()
    }
}

impl CmsConfig {
    /// Create a builder for CMS configuration.
    pub fn builder() -> CmsConfigBuilder {
        CmsConfigBuilder::default()
    }
}

/// Builder for [`CmsConfig`].
#[derive(Debug, Clone)]
pub struct CmsConfigBuilder {
    output_format: OutputFormat,
    content_cipher: CipherAlgId,
    digest: HashAlgId,
    pbkdf2_iterations: u32,
    pbkdf2_max_iterations: u32,
    pbkdf2_prf: Option<HashAlgId>,
    signer_identifier: IdentifierKind,
    oaep: Option<OaepParams>,
    key_agreement_wrap: KeyWrapAlgId,
}

impl Default for CmsConfigBuilder {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Pem,
            content_cipher: CipherAlgId::Aes128Cbc,
            digest: HashAlgId::Sha256,
            pbkdf2_iterations: 2048,
            pbkdf2_max_iterations: 10_000_000,
            pbkdf2_prf: None,
            signer_identifier: IdentifierKind::IssuerAndSerialNumber,
            oaep: None,
            key_agreement_wrap: KeyWrapAlgId::Aes128Wrap,
        }
    }
}

impl CmsConfigBuilder {
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn content_cipher(mut self, cipher: CipherAlgId) -> Self {
        self.content_cipher = cipher;
        self
    }

    pub fn digest(mut self, hash: HashAlgId) -> Self {
        self.digest = hash;
        self
    }

    pub fn pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.pbkdf2_iterations = iterations;
        self
    }

    pub fn pbkdf2_max_iterations(mut self, iterations: u32) -> Self {
        self.pbkdf2_max_iterations = iterations;
        self
    }

    pub fn pbkdf2_prf(mut self, prf: Option<HashAlgId>) -> Self {
        self.pbkdf2_prf = prf;
        self
    }

    pub fn signer_identifier(mut self, kind: IdentifierKind) -> Self {
        self.signer_identifier = kind;
        self
    }

    pub fn oaep(mut self, params: Option<OaepParams>) -> Self {
        self.oaep = params;
        self
    }

    pub fn key_agreement_wrap(mut self, wrap: KeyWrapAlgId) -> Self {
        self.key_agreement_wrap = wrap;
        self
    }

    pub fn build(self) -> CmsConfig {
        CmsConfig {
            output_format: self.output_format,
            content_cipher: self.content_cipher,
            digest: self.digest,
            pbkdf2_iterations: self.pbkdf2_iterations,
            pbkdf2_max_iterations: self.pbkdf2_max_iterations,
            pbkdf2_prf: self.pbkdf2_prf,
            signer_identifier: self.signer_identifier,
            oaep: self.oaep,
            key_agreement_wrap: self.key_agreement_wrap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_defaults() {
        let config = CmsConfig::builder().build();
        assert_eq!(config.output_format, OutputFormat::Pem);
        assert_eq!(config.content_cipher, CipherAlgId::Aes128Cbc);
        assert_eq!(config.digest, HashAlgId::Sha256);
        assert_eq!(config.pbkdf2_iterations, 2048);
        assert_eq!(config.pbkdf2_max_iterations, 10_000_000);
        assert!(config.pbkdf2_prf.is_none());
        assert_eq!(config.signer_identifier, IdentifierKind::IssuerAndSerialNumber);
        assert!(config.oaep.is_none());
        assert_eq!(config.key_agreement_wrap, KeyWrapAlgId::Aes128Wrap);
    }

    #[test]
    fn test_config_builder_overrides() {
        let config = CmsConfig::builder()
            .output_format(OutputFormat::Der)
            .content_cipher(CipherAlgId::Aes256Cbc)
            .digest(HashAlgId::Sha384)
            .pbkdf2_iterations(10_000)
            .pbkdf2_max_iterations(20_000)
            .pbkdf2_prf(Some(HashAlgId::Sha256))
            .signer_identifier(IdentifierKind::SubjectKeyIdentifier)
            .oaep(Some(OaepParams::default()))
            .key_agreement_wrap(KeyWrapAlgId::Aes256Wrap)
            .build();
        assert_eq!(config.output_format, OutputFormat::Der);
        assert_eq!(config.content_cipher, CipherAlgId::Aes256Cbc);
        assert_eq!(config.pbkdf2_prf, Some(HashAlgId::Sha256));
        assert_eq!(config.pbkdf2_max_iterations, 20_000);
        assert_eq!(config.key_agreement_wrap, KeyWrapAlgId::Aes256Wrap);
        assert!(format!("{config:?}").contains("Sha384"));
    }
}
