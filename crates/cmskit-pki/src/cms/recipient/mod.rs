//! RecipientInfo (RFC 5652 section 6.2).
//!
//! ```text
//! RecipientInfo ::= CHOICE {
//!     ktri  KeyTransRecipientInfo,
//!     kari  [1] KeyAgreeRecipientInfo,
//!     kekri [2] KEKRecipientInfo,
//!     pwri  [3] PasswordRecipientInfo,
//!     ori   [4] OtherRecipientInfo }
//! ```
//!
//! Each variant recovers the content-encryption key from a [`Secret`]. The
//! content itself is decrypted by [`EnvelopedData`](super::EnvelopedData).

mod kari;
mod kek;
mod ktri;
mod pwri;

use std::fmt;

use cmskit_crypto::modes::{tdes_wrap, wrap};
use cmskit_types::{CmsError, KeyWrapAlgId};
use cmskit_utils::asn1::Decoder;
use cmskit_utils::oid::Oid;
use zeroize::Zeroizing;

use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_null, enc_seq};
use crate::oid_mapping::wrap_to_oid;
use crate::pkcs8::PrivateKey;
use crate::x509::{Certificate, KeyUsage};

pub use kari::{KeyAgreeRecipient, Originator, RecipientEncryptedKey};
pub use kek::KekRecipient;
pub use ktri::KeyTransRecipient;
pub use pwri::{PasswordRecipient, Pbkdf2Params};

/// Material a recipient can turn into the content-encryption key.
#[derive(Clone, Copy)]
pub enum Secret<'a> {
    /// RSA key for key transport, EC key for key agreement.
    PrivateKey(&'a PrivateKey),
    /// Pre-shared key-encryption key, or the CEK itself for EncryptedData.
    Key(&'a [u8]),
    Password(&'a [u8]),
}

impl fmt::Debug for Secret<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrivateKey(k) => write!(f, "Secret::PrivateKey({:?})", k.key_type()),
            Self::Key(k) => write!(f, "Secret::Key([{} bytes])", k.len()),
            Self::Password(_) => f.write_str("Secret::Password(..)"),
        }
    }
}

/// Recovery of the content-encryption key, shared by every recipient kind.
pub(crate) trait KeyRecovery {
    fn unwrap_cek(&self, secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError>;
}

/// `OtherRecipientInfo`, carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherRecipient {
    pub ori_type: Oid,
    /// Complete encoding of `oriValue`.
    pub value: Vec<u8>,
}

impl OtherRecipient {
    fn decode_fields(content: &[u8]) -> Result<Self, CmsError> {
        let mut dec = Decoder::new(content);
        let ori_type = Oid::from_der_value(dec.read_oid()?)?;
        let value = dec.read_tlv()?.raw.to_vec();
        Ok(Self { ori_type, value })
    }

    fn encode_fields(&self) -> Vec<u8> {
        let mut out = self.ori_type.to_der();
        out.extend_from_slice(&self.value);
        out
    }
}

impl KeyRecovery for OtherRecipient {
    fn unwrap_cek(&self, _secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        Err(CmsError::UnsupportedAlgorithm(format!(
            "other recipient type {}",
            self.ori_type
        )))
    }
}

/// One entry of `recipientInfos`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientInfo {
    KeyTrans(KeyTransRecipient),
    KeyAgree(KeyAgreeRecipient),
    Kek(KekRecipient),
    Password(PasswordRecipient),
    Other(OtherRecipient),
}

impl RecipientInfo {
    /// Decode a single `RecipientInfo` element.
    pub fn from_der(der: &[u8]) -> Result<Self, CmsError> {
        let mut dec = Decoder::new(der);
        let tlv = dec.read_tlv()?;
        if !dec.is_empty() {
            return Err(CmsError::decode("trailing data after RecipientInfo"));
        }
        if !tlv.tag.constructed {
            return Err(CmsError::structure("RecipientInfo must be constructed"));
        }
        if tlv.tag.is_universal(0x10) {
            return Ok(Self::KeyTrans(KeyTransRecipient::decode_fields(tlv.value)?));
        }
        let recipient = if tlv.tag.is_context(1) {
            Self::KeyAgree(KeyAgreeRecipient::decode_fields(tlv.value)?)
        } else if tlv.tag.is_context(2) {
            Self::Kek(KekRecipient::decode_fields(tlv.value)?)
        } else if tlv.tag.is_context(3) {
            Self::Password(PasswordRecipient::decode_fields(tlv.value)?)
        } else if tlv.tag.is_context(4) {
            Self::Other(OtherRecipient::decode_fields(tlv.value)?)
        } else {
            return Err(CmsError::structure(format!(
                "unknown RecipientInfo choice {:?}",
                tlv.tag
            )));
        };
        Ok(recipient)
    }

    pub fn to_der(&self) -> Vec<u8> {
        match self {
            Self::KeyTrans(r) => enc_seq(&r.encode_fields()),
            Self::KeyAgree(r) => enc_explicit_ctx(1, &r.encode_fields()),
            Self::Kek(r) => enc_explicit_ctx(2, &r.encode_fields()),
            Self::Password(r) => enc_explicit_ctx(3, &r.encode_fields()),
            Self::Other(r) => enc_explicit_ctx(4, &r.encode_fields()),
        }
    }

    /// The `version` field; `ori` carries none.
    pub fn version(&self) -> Option<u32> {
        match self {
            Self::KeyTrans(r) => Some(r.version()),
            Self::KeyAgree(_) => Some(3),
            Self::Kek(_) => Some(4),
            Self::Password(_) => Some(0),
            Self::Other(_) => None,
        }
    }

    /// Recover the content-encryption key.
    pub fn unwrap_key(&self, secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        self.recovery().unwrap_cek(secret)
    }

    /// True when `cert` names this recipient and allows the matching key usage.
    pub fn matches_certificate(&self, cert: &Certificate) -> bool {
        match self {
            Self::KeyTrans(r) => cert.matches_identifier(&r.identifier, &[KeyUsage::KEY_ENCIPHERMENT]),
            Self::KeyAgree(r) => r.encrypted_key_for(cert).is_some(),
            _ => false,
        }
    }

    fn recovery(&self) -> &dyn KeyRecovery {
        match self {
            Self::KeyTrans(r) => r,
            Self::KeyAgree(r) => r,
            Self::Kek(r) => r,
            Self::Password(r) => r,
            Self::Other(r) => r,
        }
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

/// Read an `AlgorithmIdentifier`, returning the parameters as a complete element.
pub(crate) fn read_algorithm_identifier(
    dec: &mut Decoder<'_>,
) -> Result<(Oid, Option<Vec<u8>>), CmsError> {
    let mut seq = dec.read_sequence()?;
    let oid = Oid::from_der_value(seq.read_oid()?)?;
    let params = if seq.is_empty() {
        None
    } else {
        Some(seq.read_tlv()?.raw.to_vec())
    };
    Ok((oid, params))
}

/// Key-wrap `AlgorithmIdentifier`; CMS3DESwrap carries NULL parameters.
pub(crate) fn wrap_algorithm_der(alg: KeyWrapAlgId) -> Vec<u8> {
    match alg {
        KeyWrapAlgId::TdesWrap => enc_alg_id(&wrap_to_oid(alg), Some(&enc_null())),
        _ => enc_alg_id(&wrap_to_oid(alg), None),
    }
}

pub(crate) fn wrap_cek(alg: KeyWrapAlgId, kek: &[u8], cek: &[u8]) -> Result<Vec<u8>, CmsError> {
    check_kek_len(alg, kek)?;
    Ok(match alg {
        KeyWrapAlgId::TdesWrap => tdes_wrap::key_wrap(kek, cek)?,
        _ => wrap::key_wrap(kek, cek)?,
    })
}

pub(crate) fn unwrap_cek(
    alg: KeyWrapAlgId,
    kek: &[u8],
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CmsError> {
    check_kek_len(alg, kek)?;
    Ok(match alg {
        KeyWrapAlgId::TdesWrap => tdes_wrap::key_unwrap(kek, wrapped)?,
        _ => wrap::key_unwrap(kek, wrapped)?,
    })
}

fn check_kek_len(alg: KeyWrapAlgId, kek: &[u8]) -> Result<(), CmsError> {
    if kek.len() != alg.kek_len() {
        return Err(CmsError::InsufficientSetup(format!(
            "{alg:?} needs a {}-byte key-encryption key, got {}",
            alg.kek_len(),
            kek.len()
        )));
    }
    Ok(())
}
