//! Password recipients (RFC 3211, RFC 5652 section 6.2.4).
//!
//! ```text
//! PasswordRecipientInfo ::= SEQUENCE {
//!     version                CMSVersion,  -- always 0
//!     keyDerivationAlgorithm [0] KeyDerivationAlgorithmIdentifier OPTIONAL,
//!     keyEncryptionAlgorithm KeyEncryptionAlgorithmIdentifier,
//!     encryptedKey           EncryptedKey }
//! ```
//!
//! The KEK comes from PBKDF2 and wraps the CEK with `id-alg-PWRI-KEK`, whose
//! parameter names the inner CBC cipher and its IV.

use cmskit_crypto::modes::{block_cipher, pwri};
use cmskit_crypto::pbkdf2::pbkdf2;
use cmskit_crypto::random::random_bytes;
use cmskit_types::{CipherAlgId, CmsError, HashAlgId};
use cmskit_utils::asn1::{Decoder, Encoder};
use cmskit_utils::oid::{known, Oid};
use tracing::debug;
use zeroize::Zeroizing;

use super::{read_algorithm_identifier, KeyRecovery, Secret};
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_null, enc_octet};
use crate::oid_mapping::{cipher_to_oid, hmac_to_oid, oid_to_cipher, oid_to_hmac};

const SALT_LEN: usize = 8;

/// Decoded `PBKDF2-params` (RFC 8018 appendix A.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pbkdf2Params {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub key_length: Option<u32>,
    /// HMAC hash; SHA-1 when the field is absent.
    pub prf: HashAlgId,
}

/// A `PasswordRecipientInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRecipient {
    pub key_derivation_algorithm: Option<Oid>,
    pub key_derivation_params: Option<Vec<u8>>,
    pub key_encryption_algorithm: Oid,
    pub key_encryption_params: Option<Vec<u8>>,
    pub encrypted_key: Vec<u8>,
}

impl PasswordRecipient {
    /// Derive a KEK from `password` and wrap `cek` under `cipher`.
    ///
    /// `prf` of `None` leaves the PRF field out, which means HMAC-SHA1.
    pub fn create(
        password: &[u8],
        cipher: CipherAlgId,
        cek: &[u8],
        iterations: u32,
        prf: Option<HashAlgId>,
    ) -> Result<Self, CmsError> {
        let salt = random_bytes(SALT_LEN)?;
        let kek = Zeroizing::new(pbkdf2(
            prf.unwrap_or(HashAlgId::Sha1),
            password,
            &salt,
            iterations,
            cipher.key_len(),
        )?);
        let iv = random_bytes(cipher.block_size())?;
        let wrapper = block_cipher(cipher, &kek)?;
        let encrypted_key = pwri::key_wrap(wrapper.as_ref(), &iv, cek)?;

        let mut params = Encoder::new();
        params
            .write_octet_string(&salt)
            .write_uint(u64::from(iterations));
        if let Some(hash) = prf {
            let hmac = hmac_to_oid(hash)
                .ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("PBKDF2 PRF {}", hash.name())))?;
            params.write_raw(&enc_alg_id(&hmac, Some(&enc_null())));
        }
        let mut kdf_params = Encoder::new();
        kdf_params.write_sequence(&params.finish());

        debug!(?cipher, iterations, "created password recipient");
        Ok(Self {
            key_derivation_algorithm: Some(known::id_pbkdf2()),
            key_derivation_params: Some(kdf_params.finish()),
            key_encryption_algorithm: known::id_alg_pwri_kek(),
            key_encryption_params: Some(enc_alg_id(&cipher_to_oid(cipher), Some(&enc_octet(&iv)))),
            encrypted_key,
        })
    }

    pub fn version(&self) -> u32 {
        0
    }

    /// PBKDF2 parameters of the key derivation algorithm.
    pub fn pbkdf2_params(&self) -> Result<Pbkdf2Params, CmsError> {
        let alg = self.key_derivation_algorithm.as_ref().ok_or_else(|| {
            CmsError::InsufficientSetup(
                "no key derivation algorithm; supply the key-encryption key instead".into(),
            )
        })?;
        if *alg != known::id_pbkdf2() {
            return Err(CmsError::UnsupportedAlgorithm(format!("key derivation {alg}")));
        }
        let der = self
            .key_derivation_params
            .as_deref()
            .ok_or_else(|| CmsError::structure("PBKDF2 without parameters"))?;
        let mut outer = Decoder::new(der);
        let mut seq = outer.read_sequence()?;
        let salt_tag = seq.peek_tag()?;
        if !salt_tag.is_universal(0x04) {
            return Err(CmsError::UnsupportedAlgorithm(
                "PBKDF2 salt from another source".into(),
            ));
        }
        let salt = seq.read_tlv()?.octets()?;
        let iterations = seq.read_u32()?;
        let mut key_length = None;
        let mut prf = HashAlgId::Sha1;
        if !seq.is_empty() && seq.peek_tag()?.is_universal(0x02) {
            key_length = Some(seq.read_u32()?);
        }
        if !seq.is_empty() {
            let (oid, _) = read_algorithm_identifier(&mut seq)?;
            prf = oid_to_hmac(&oid)
                .ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("PBKDF2 PRF {oid}")))?;
        }
        Ok(Pbkdf2Params {
            salt,
            iterations,
            key_length,
            prf,
        })
    }

    /// Inner cipher and IV of `id-alg-PWRI-KEK`.
    pub fn key_cipher(&self) -> Result<(CipherAlgId, Vec<u8>), CmsError> {
        if self.key_encryption_algorithm != known::id_alg_pwri_kek() {
            return Err(CmsError::UnsupportedAlgorithm(format!(
                "password key encryption {}",
                self.key_encryption_algorithm
            )));
        }
        let der = self
            .key_encryption_params
            .as_deref()
            .ok_or_else(|| CmsError::structure("id-alg-PWRI-KEK without parameters"))?;
        let (oid, params) = read_algorithm_identifier(&mut Decoder::new(der))?;
        let cipher = oid_to_cipher(&oid)
            .ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("PWRI cipher {oid}")))?;
        let iv = match params {
            Some(p) => Decoder::new(&p).read_octets()?,
            None => return Err(CmsError::structure("PWRI cipher without an IV")),
        };
        if iv.len() != cipher.block_size() {
            return Err(CmsError::structure(format!("PWRI IV of {} bytes", iv.len())));
        }
        Ok((cipher, iv))
    }

    /// Run PBKDF2 over `password` with the stored parameters.
    pub fn derive_kek(&self, password: &[u8]) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        let (cipher, _) = self.key_cipher()?;
        let params = self.pbkdf2_params()?;
        if let Some(len) = params.key_length {
            if len as usize != cipher.key_len() {
                return Err(CmsError::structure(format!(
                    "PBKDF2 key length {len} does not fit {cipher:?}"
                )));
            }
        }
        Ok(Zeroizing::new(pbkdf2(
            params.prf,
            password,
            &params.salt,
            params.iterations,
            cipher.key_len(),
        )?))
    }

    pub(super) fn decode_fields(content: &[u8]) -> Result<Self, CmsError> {
        let mut dec = Decoder::new(content);
        let version = dec.read_u32()?;
        if version != 0 {
            return Err(CmsError::structure(format!(
                "PasswordRecipientInfo version {version}"
            )));
        }
        let (key_derivation_algorithm, key_derivation_params) =
            match dec.try_read_context_specific(0, true)? {
                Some(tlv) => {
                    let mut inner = Decoder::new(tlv.value);
                    let oid = Oid::from_der_value(inner.read_oid()?)?;
                    let params = if inner.is_empty() {
                        None
                    } else {
                        Some(inner.read_tlv()?.raw.to_vec())
                    };
                    (Some(oid), params)
                }
                None => (None, None),
            };
        let (key_encryption_algorithm, key_encryption_params) =
            read_algorithm_identifier(&mut dec)?;
        let encrypted_key = dec.read_tlv()?.octets()?;
        Ok(Self {
            key_derivation_algorithm,
            key_derivation_params,
            key_encryption_algorithm,
            key_encryption_params,
            encrypted_key,
        })
    }

    pub(super) fn encode_fields(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.write_uint(u64::from(self.version()));
        if let Some(oid) = &self.key_derivation_algorithm {
            let mut inner = oid.to_der();
            if let Some(params) = &self.key_derivation_params {
                inner.extend_from_slice(params);
            }
            enc.write_raw(&enc_explicit_ctx(0, &inner));
        }
        enc.write_raw(&enc_alg_id(
            &self.key_encryption_algorithm,
            self.key_encryption_params.as_deref(),
        ))
        .write_octet_string(&self.encrypted_key);
        enc.finish()
    }
}

impl KeyRecovery for PasswordRecipient {
    fn unwrap_cek(&self, secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        let kek = match secret {
            Secret::Password(password) => self.derive_kek(password)?,
            // a KEK derived out of band
            Secret::Key(kek) => Zeroizing::new(kek.to_vec()),
            Secret::PrivateKey(_) => {
                return Err(CmsError::InsufficientSetup(
                    "password recipients need a password".into(),
                ))
            }
        };
        let (cipher, iv) = self.key_cipher()?;
        let unwrapper = block_cipher(cipher, &kek)?;
        Ok(pwri::key_unwrap(unwrapper.as_ref(), &iv, &self.encrypted_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::RecipientInfo;

    #[test]
    fn test_password_recipient_roundtrip() {
        let cek = [0x61u8; 16];
        let pwri =
            PasswordRecipient::create(b"password", CipherAlgId::Aes128Cbc, &cek, 2048, None).unwrap();
        let params = pwri.pbkdf2_params().unwrap();
        assert_eq!(params.salt.len(), 8);
        assert_eq!(params.iterations, 2048);
        assert_eq!(params.prf, HashAlgId::Sha1);
        assert_eq!(params.key_length, None);
        // 4 + 16 bytes rounds up to two AES blocks
        assert_eq!(pwri.encrypted_key.len(), 32);

        let ri = RecipientInfo::Password(pwri);
        assert_eq!(ri.version(), Some(0));
        let der = ri.to_der();
        assert_eq!(der[0], 0xa3);
        let parsed = RecipientInfo::from_der(&der).unwrap();
        assert_eq!(parsed, ri);
        let recovered = parsed.unwrap_key(&Secret::Password(b"password")).unwrap();
        assert_eq!(&recovered[..], &cek[..]);
    }

    #[test]
    fn test_password_recipient_wrong_password() {
        let pwri = PasswordRecipient::create(b"password", CipherAlgId::Aes256Cbc, &[7u8; 32], 1000, None)
            .unwrap();
        assert!(matches!(
            pwri.unwrap_cek(&Secret::Password(b"zzz")).unwrap_err(),
            CmsError::Integrity(_)
        ));
    }

    #[test]
    fn test_password_recipient_ciphers_and_prf() {
        for cipher in [
            CipherAlgId::Aes128Cbc,
            CipherAlgId::Aes192Cbc,
            CipherAlgId::Aes256Cbc,
            CipherAlgId::TdesEde3Cbc,
        ] {
            let cek = vec![0x0bu8; cipher.key_len()];
            let pwri =
                PasswordRecipient::create(b"swordfish", cipher, &cek, 100, Some(HashAlgId::Sha256))
                    .unwrap();
            assert_eq!(pwri.pbkdf2_params().unwrap().prf, HashAlgId::Sha256);
            let (found, iv) = pwri.key_cipher().unwrap();
            assert_eq!(found, cipher);
            assert_eq!(iv.len(), cipher.block_size());
            let recovered = pwri.unwrap_cek(&Secret::Password(b"swordfish")).unwrap();
            assert_eq!(&recovered[..], &cek[..]);
        }
    }

    #[test]
    fn test_password_recipient_accepts_derived_kek() {
        let cek = [0x21u8; 16];
        let pwri =
            PasswordRecipient::create(b"pw", CipherAlgId::Aes128Cbc, &cek, 10, None).unwrap();
        let kek = pwri.derive_kek(b"pw").unwrap();
        assert_eq!(kek.len(), 16);
        let recovered = pwri.unwrap_cek(&Secret::Key(&kek)).unwrap();
        assert_eq!(&recovered[..], &cek[..]);
    }

    #[test]
    fn test_password_recipient_unsupported_algorithms() {
        let mut pwri =
            PasswordRecipient::create(b"pw", CipherAlgId::Aes128Cbc, &[1u8; 16], 10, None).unwrap();
        pwri.key_encryption_algorithm = known::id_aes128_wrap();
        assert!(matches!(
            pwri.unwrap_cek(&Secret::Password(b"pw")).unwrap_err(),
            CmsError::UnsupportedAlgorithm(_)
        ));

        let mut no_kdf =
            PasswordRecipient::create(b"pw", CipherAlgId::Aes128Cbc, &[1u8; 16], 10, None).unwrap();
        no_kdf.key_derivation_algorithm = None;
        no_kdf.key_derivation_params = None;
        assert!(matches!(
            no_kdf.unwrap_cek(&Secret::Password(b"pw")).unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
        let reparsed = RecipientInfo::from_der(&RecipientInfo::Password(no_kdf).to_der()).unwrap();
        let RecipientInfo::Password(reparsed) = reparsed else {
            panic!("expected pwri");
        };
        assert!(reparsed.key_derivation_algorithm.is_none());
    }
}
