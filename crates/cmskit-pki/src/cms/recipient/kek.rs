//! Pre-shared key-encryption key recipients (RFC 5652 section 6.2.3).
//!
//! ```text
//! KEKRecipientInfo ::= SEQUENCE {
//!     version                CMSVersion,  -- always 4
//!     kekid                  KEKIdentifier,
//!     keyEncryptionAlgorithm KeyEncryptionAlgorithmIdentifier,
//!     encryptedKey           EncryptedKey }
//!
//! KEKIdentifier ::= SEQUENCE {
//!     keyIdentifier OCTET STRING,
//!     date          GeneralizedTime OPTIONAL,
//!     other         OtherKeyAttribute OPTIONAL }
//! ```

use cmskit_types::{CmsError, KeyWrapAlgId};
use cmskit_utils::asn1::{Decoder, Encoder};
use cmskit_utils::oid::Oid;
use tracing::debug;
use zeroize::Zeroizing;

use super::{read_algorithm_identifier, unwrap_cek, wrap_cek, KeyRecovery, Secret};
use crate::encoding::{enc_alg_id, enc_null};
use crate::oid_mapping::{oid_to_wrap, wrap_to_oid};

/// A `KEKRecipientInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KekRecipient {
    pub key_identifier: Vec<u8>,
    /// UNIX timestamp of the `date` field.
    pub date: Option<i64>,
    /// Complete `OtherKeyAttribute` element.
    pub other: Option<Vec<u8>>,
    pub key_encryption_algorithm: Oid,
    pub key_encryption_params: Option<Vec<u8>>,
    pub encrypted_key: Vec<u8>,
}

impl KekRecipient {
    /// Wrap `cek` under `kek` with the AES key wrap matching its length.
    pub fn create(kek: &[u8], key_identifier: &[u8], date: Option<i64>, cek: &[u8]) -> Result<Self, CmsError> {
        let wrap = KeyWrapAlgId::aes_for_kek_len(kek.len()).ok_or_else(|| {
            CmsError::InsufficientSetup(format!(
                "key-encryption key must be 16, 24 or 32 bytes, got {}",
                kek.len()
            ))
        })?;
        Self::create_with(wrap, kek, key_identifier, date, cek)
    }

    /// Wrap `cek` under `kek` with an explicit key-wrap algorithm.
    pub fn create_with(
        wrap: KeyWrapAlgId,
        kek: &[u8],
        key_identifier: &[u8],
        date: Option<i64>,
        cek: &[u8],
    ) -> Result<Self, CmsError> {
        let encrypted_key = wrap_cek(wrap, kek, cek)?;
        debug!(?wrap, id = %hex_id(key_identifier), "created KEK recipient");
        let params = match wrap {
            KeyWrapAlgId::TdesWrap => Some(enc_null()),
            _ => None,
        };
        Ok(Self {
            key_identifier: key_identifier.to_vec(),
            date,
            other: None,
            key_encryption_algorithm: wrap_to_oid(wrap),
            key_encryption_params: params,
            encrypted_key,
        })
    }

    pub fn version(&self) -> u32 {
        4
    }

    pub fn wrap_algorithm(&self) -> Result<KeyWrapAlgId, CmsError> {
        oid_to_wrap(&self.key_encryption_algorithm).ok_or_else(|| {
            CmsError::UnsupportedAlgorithm(format!("key wrap {}", self.key_encryption_algorithm))
        })
    }

    pub(super) fn decode_fields(content: &[u8]) -> Result<Self, CmsError> {
        let mut dec = Decoder::new(content);
        let version = dec.read_u32()?;
        if version != 4 {
            return Err(CmsError::structure(format!("KEKRecipientInfo version {version}")));
        }
        let mut kekid = dec.read_sequence()?;
        let key_identifier = kekid.read_tlv()?.octets()?;
        let mut date = None;
        let mut other = None;
        while !kekid.is_empty() {
            let tag = kekid.peek_tag()?;
            if tag.is_universal(0x18) && date.is_none() && other.is_none() {
                date = Some(kekid.read_time()?);
            } else if tag.is_universal(0x10) && other.is_none() {
                other = Some(kekid.read_tlv()?.raw.to_vec());
            } else {
                return Err(CmsError::structure("malformed KEKIdentifier"));
            }
        }
        let (key_encryption_algorithm, key_encryption_params) =
            read_algorithm_identifier(&mut dec)?;
        let encrypted_key = dec.read_tlv()?.octets()?;
        Ok(Self {
            key_identifier,
            date,
            other,
            key_encryption_algorithm,
            key_encryption_params,
            encrypted_key,
        })
    }

    pub(super) fn encode_fields(&self) -> Vec<u8> {
        let mut kekid = Encoder::new();
        kekid.write_octet_string(&self.key_identifier);
        if let Some(date) = self.date {
            kekid.write_generalized_time(date);
        }
        if let Some(other) = &self.other {
            kekid.write_raw(other);
        }

        let mut enc = Encoder::new();
        enc.write_uint(u64::from(self.version()))
            .write_sequence(&kekid.finish())
            .write_raw(&enc_alg_id(
                &self.key_encryption_algorithm,
                self.key_encryption_params.as_deref(),
            ))
            .write_octet_string(&self.encrypted_key);
        enc.finish()
    }
}

impl KeyRecovery for KekRecipient {
    fn unwrap_cek(&self, secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        let Secret::Key(kek) = secret else {
            return Err(CmsError::InsufficientSetup(
                "KEK recipients need a key-encryption key".into(),
            ));
        };
        unwrap_cek(self.wrap_algorithm()?, kek, &self.encrypted_key)
    }
}

fn hex_id(id: &[u8]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::RecipientInfo;
    use cmskit_utils::oid::known;

    const KEK: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    #[test]
    fn test_kek_recipient_lengths_select_wrap() {
        let cek = [0x33u8; 32];
        for (len, oid) in [
            (16, known::id_aes128_wrap()),
            (24, known::id_aes192_wrap()),
            (32, known::id_aes256_wrap()),
        ] {
            let kek = vec![0x0fu8; len];
            let kekri = KekRecipient::create(&kek, b"zzz", None, &cek).unwrap();
            assert_eq!(kekri.key_encryption_algorithm, oid);
            assert_eq!(kekri.encrypted_key.len(), 40);
            let recovered = kekri.unwrap_cek(&Secret::Key(&kek)).unwrap();
            assert_eq!(&recovered[..], &cek[..]);
        }
        assert!(matches!(
            KekRecipient::create(&[0u8; 20], b"zzz", None, &cek).unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
    }

    #[test]
    fn test_kek_recipient_roundtrip_with_date() {
        let cek = [0x9au8; 16];
        let kekri = KekRecipient::create(&KEK, &[0xde, 0xad, 0xbe, 0xef], Some(1_700_000_000), &cek)
            .unwrap();
        let ri = RecipientInfo::Kek(kekri);
        assert_eq!(ri.version(), Some(4));
        let der = ri.to_der();
        assert_eq!(der[0], 0xa2);
        // GeneralizedTime 20231114221320Z
        assert!(der.windows(15).any(|w| w == b"20231114221320Z"));
        let parsed = RecipientInfo::from_der(&der).unwrap();
        assert_eq!(parsed, ri);
        let RecipientInfo::Kek(parsed) = parsed else {
            panic!("expected kekri");
        };
        assert_eq!(parsed.date, Some(1_700_000_000));
        assert_eq!(parsed.key_identifier, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_kek_recipient_wrong_key() {
        let kekri = KekRecipient::create(&KEK, b"zzz", None, &[1u8; 16]).unwrap();
        let mut wrong = KEK;
        wrong[0] ^= 1;
        assert!(matches!(
            kekri.unwrap_cek(&Secret::Key(&wrong)).unwrap_err(),
            CmsError::Integrity(_)
        ));
        assert!(matches!(
            kekri.unwrap_cek(&Secret::Password(b"zzz")).unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
    }

    #[test]
    fn test_kek_recipient_tdes_wrap() {
        let kek = hex::decode("0123456789abcdeffedcba987654321089abcdef01234567").unwrap();
        let cek = [0x4cu8; 24];
        let kekri = KekRecipient::create_with(KeyWrapAlgId::TdesWrap, &kek, b"beef", None, &cek)
            .unwrap();
        assert_eq!(kekri.key_encryption_algorithm, known::id_alg_cms3des_wrap());
        assert_eq!(kekri.encrypted_key.len(), 40);
        let ri = RecipientInfo::Kek(kekri);
        let parsed = RecipientInfo::from_der(&ri.to_der()).unwrap();
        assert_eq!(&parsed.unwrap_key(&Secret::Key(&kek)).unwrap()[..], &cek[..]);
    }

    #[test]
    fn test_kek_identifier_other_attribute_kept() {
        // KEKIdentifier { 'ab', OtherKeyAttribute { 1.2.3 } }
        let other = hex::decode("300406022a03").unwrap();
        let mut kekri = KekRecipient::create(&KEK, b"ab", None, &[7u8; 16]).unwrap();
        kekri.other = Some(other.clone());
        let der = RecipientInfo::Kek(kekri).to_der();
        let RecipientInfo::Kek(parsed) = RecipientInfo::from_der(&der).unwrap() else {
            panic!("expected kekri");
        };
        assert_eq!(parsed.other, Some(other));
        assert_eq!(parsed.date, None);
    }
}
