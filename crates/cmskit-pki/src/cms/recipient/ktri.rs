//! Key transport recipients (RFC 5652 section 6.2.1).
//!
//! ```text
//! KeyTransRecipientInfo ::= SEQUENCE {
//!     version                CMSVersion,  -- 0 or 2
//!     rid                    RecipientIdentifier,
//!     keyEncryptionAlgorithm KeyEncryptionAlgorithmIdentifier,
//!     encryptedKey           EncryptedKey }
//! ```
//!
//! The CEK is encrypted with RSA, either PKCS#1 v1.5 (`rsaEncryption`) or
//! RSAES-OAEP (RFC 4055 section 4.1):
//!
//! ```text
//! RSAES-OAEP-params ::= SEQUENCE {
//!     hashFunc    [0] AlgorithmIdentifier DEFAULT sha1Identifier,
//!     maskGenFunc [1] AlgorithmIdentifier DEFAULT mgf1SHA1Identifier,
//!     pSourceFunc [2] AlgorithmIdentifier DEFAULT pSpecifiedEmptyIdentifier }
//! ```

use cmskit_crypto::rsa::{OaepParams, RsaPadding, RsaPublicKey};
use cmskit_types::{CmsError, HashAlgId, PkeyAlgId};
use cmskit_utils::asn1::{Decoder, Encoder};
use cmskit_utils::oid::{known, Oid};
use tracing::debug;
use zeroize::Zeroizing;

use super::{read_algorithm_identifier, KeyRecovery, Secret};
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_null, enc_octet, enc_seq};
use crate::oid_mapping::{hash_to_oid, oid_to_hash};
use crate::x509::{CertIdentifier, Certificate, IdentifierKind};

/// A `KeyTransRecipientInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTransRecipient {
    pub identifier: CertIdentifier,
    pub key_encryption_algorithm: Oid,
    /// Complete parameter element, if any.
    pub key_encryption_params: Option<Vec<u8>>,
    pub encrypted_key: Vec<u8>,
}

impl KeyTransRecipient {
    /// Encrypt `cek` to the RSA key in `cert`.
    ///
    /// `oaep` selects RSAES-OAEP; only the fields that differ from the
    /// RFC 4055 defaults are written into the parameters.
    pub fn create(
        cert: &Certificate,
        kind: IdentifierKind,
        cek: &[u8],
        oaep: Option<&OaepParams>,
    ) -> Result<Self, CmsError> {
        if cert.public_key.key_type() != Some(PkeyAlgId::Rsa) {
            return Err(CmsError::UnsupportedAlgorithm(
                "key transport needs an RSA certificate".into(),
            ));
        }
        let identifier = CertIdentifier::from_certificate(cert, kind)?;
        let public = RsaPublicKey::from_pkcs1_der(&cert.public_key.public_key)?;
        let (padding, key_encryption_algorithm, params) = match oaep {
            Some(p) => (
                RsaPadding::Oaep(p.clone()),
                known::id_rsaes_oaep(),
                oaep_params_der(p),
            ),
            None => (RsaPadding::Pkcs1v15Encrypt, known::rsa_encryption(), enc_null()),
        };
        let encrypted_key = public.encrypt(&padding, cek)?;
        debug!(alg = %key_encryption_algorithm, "created key transport recipient");
        Ok(Self {
            identifier,
            key_encryption_algorithm,
            key_encryption_params: Some(params),
            encrypted_key,
        })
    }

    /// 0 for issuerAndSerialNumber, 2 for subjectKeyIdentifier.
    pub fn version(&self) -> u32 {
        match self.identifier.kind() {
            IdentifierKind::IssuerAndSerialNumber => 0,
            IdentifierKind::SubjectKeyIdentifier => 2,
        }
    }

    /// RSA padding named by `keyEncryptionAlgorithm`.
    pub fn padding(&self) -> Result<RsaPadding, CmsError> {
        if self.key_encryption_algorithm == known::rsa_encryption() {
            Ok(RsaPadding::Pkcs1v15Encrypt)
        } else if self.key_encryption_algorithm == known::id_rsaes_oaep() {
            Ok(RsaPadding::Oaep(parse_oaep_params(
                self.key_encryption_params.as_deref(),
            )?))
        } else {
            Err(CmsError::UnsupportedAlgorithm(format!(
                "key transport algorithm {}",
                self.key_encryption_algorithm
            )))
        }
    }

    pub(super) fn decode_fields(content: &[u8]) -> Result<Self, CmsError> {
        let mut dec = Decoder::new(content);
        let version = dec.read_u32()?;
        if version != 0 && version != 2 {
            return Err(CmsError::structure(format!(
                "KeyTransRecipientInfo version {version}"
            )));
        }
        let identifier = CertIdentifier::decode(&mut dec)?;
        let (key_encryption_algorithm, key_encryption_params) =
            read_algorithm_identifier(&mut dec)?;
        let encrypted_key = dec.read_tlv()?.octets()?;
        Ok(Self {
            identifier,
            key_encryption_algorithm,
            key_encryption_params,
            encrypted_key,
        })
    }

    pub(super) fn encode_fields(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.write_uint(u64::from(self.version()))
            .write_raw(&self.identifier.to_der())
            .write_raw(&enc_alg_id(
                &self.key_encryption_algorithm,
                self.key_encryption_params.as_deref(),
            ))
            .write_octet_string(&self.encrypted_key);
        enc.finish()
    }
}

impl KeyRecovery for KeyTransRecipient {
    fn unwrap_cek(&self, secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        let Secret::PrivateKey(key) = secret else {
            return Err(CmsError::InsufficientSetup(
                "key transport recipients need an RSA private key".into(),
            ));
        };
        let padding = self.padding()?;
        key.rsa_decrypt(&padding, &self.encrypted_key)
            .map_err(|e| CmsError::BadDecryption(format!("key transport: {e}")))
    }
}

/// `RSAES-OAEP-params` with default fields omitted.
pub(crate) fn oaep_params_der(params: &OaepParams) -> Vec<u8> {
    let mut fields = Vec::new();
    if params.hash != HashAlgId::Sha1 {
        let hash = enc_alg_id(&hash_to_oid(params.hash), Some(&enc_null()));
        fields.extend_from_slice(&enc_explicit_ctx(0, &hash));
    }
    if params.mgf_hash != HashAlgId::Sha1 {
        let hash = enc_alg_id(&hash_to_oid(params.mgf_hash), Some(&enc_null()));
        let mgf = enc_alg_id(&known::id_mgf1(), Some(&hash));
        fields.extend_from_slice(&enc_explicit_ctx(1, &mgf));
    }
    if !params.label.is_empty() {
        let source = enc_alg_id(&known::id_p_specified(), Some(&enc_octet(&params.label)));
        fields.extend_from_slice(&enc_explicit_ctx(2, &source));
    }
    enc_seq(&fields)
}

/// Parse `RSAES-OAEP-params`. Absent, NULL and empty parameters all mean
/// the defaults.
pub(crate) fn parse_oaep_params(params: Option<&[u8]>) -> Result<OaepParams, CmsError> {
    let mut out = OaepParams::default();
    let Some(der) = params else {
        return Ok(out);
    };
    if der == [0x05, 0x00] {
        return Ok(out);
    }
    let mut outer = Decoder::new(der);
    let mut seq = outer.read_sequence()?;
    if let Some(tlv) = seq.try_read_context_specific(0, true)? {
        let (oid, _) = read_algorithm_identifier(&mut Decoder::new(tlv.value))?;
        out.hash = oaep_hash(&oid)?;
    }
    if let Some(tlv) = seq.try_read_context_specific(1, true)? {
        let (oid, mgf_params) = read_algorithm_identifier(&mut Decoder::new(tlv.value))?;
        if oid != known::id_mgf1() {
            return Err(CmsError::UnsupportedAlgorithm(format!("mask generation {oid}")));
        }
        let inner = mgf_params.ok_or_else(|| CmsError::structure("MGF1 without a hash"))?;
        let (hash_oid, _) = read_algorithm_identifier(&mut Decoder::new(&inner))?;
        out.mgf_hash = oaep_hash(&hash_oid)?;
    }
    if let Some(tlv) = seq.try_read_context_specific(2, true)? {
        let (oid, source) = read_algorithm_identifier(&mut Decoder::new(tlv.value))?;
        if oid != known::id_p_specified() {
            return Err(CmsError::UnsupportedAlgorithm(format!("OAEP label source {oid}")));
        }
        out.label = match source {
            Some(value) => Decoder::new(&value).read_octet_string()?.to_vec(),
            None => Vec::new(),
        };
    }
    if !seq.is_empty() {
        return Err(CmsError::structure("unexpected field in RSAES-OAEP-params"));
    }
    Ok(out)
}

fn oaep_hash(oid: &Oid) -> Result<HashAlgId, CmsError> {
    oid_to_hash(oid).ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("OAEP hash {oid}")))
}
