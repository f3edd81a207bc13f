//! Key agreement recipients (RFC 5652 section 6.2.2, RFC 5753).
//!
//! ```text
//! KeyAgreeRecipientInfo ::= SEQUENCE {
//!     version                CMSVersion,  -- always 3
//!     originator             [0] EXPLICIT OriginatorIdentifierOrKey,
//!     ukm                    [1] EXPLICIT UserKeyingMaterial OPTIONAL,
//!     keyEncryptionAlgorithm KeyEncryptionAlgorithmIdentifier,
//!     recipientEncryptedKeys RecipientEncryptedKeys }
//! ```
//!
//! The key-encryption key is derived from an ephemeral-static ECDH secret
//! with the ANSI X9.63 KDF over a DER `ECC-CMS-SharedInfo`.

use cmskit_crypto::ecdh::EcdhKeyPair;
use cmskit_crypto::x963kdf::X963Kdf;
use cmskit_types::{CmsError, EccCurveId, HashAlgId, KeyWrapAlgId, PkeyAlgId};
use cmskit_utils::asn1::{Decoder, Encoder};
use cmskit_utils::oid::{known, Oid};
use tracing::debug;
use zeroize::Zeroizing;

use super::{read_algorithm_identifier, unwrap_cek, wrap_algorithm_der, wrap_cek, KeyRecovery, Secret};
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_octet, enc_seq};
use crate::oid_mapping::{is_binary_curve, oid_to_wrap};
use crate::x509::{CertIdentifier, Certificate, IdentifierKind, KeyUsage};

/// `OriginatorIdentifierOrKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Originator {
    /// Static originator key named by certificate; not usable for decryption here.
    Certificate(CertIdentifier),
    /// `originatorKey [1] OriginatorPublicKey`.
    PublicKey {
        algorithm: Oid,
        params: Option<Vec<u8>>,
        /// SEC1 point from the BIT STRING.
        public_key: Vec<u8>,
    },
}

/// One `RecipientEncryptedKey`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientEncryptedKey {
    pub identifier: CertIdentifier,
    pub encrypted_key: Vec<u8>,
}

/// A `KeyAgreeRecipientInfo`; all encrypted keys share one originator key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAgreeRecipient {
    pub originator: Originator,
    pub ukm: Option<Vec<u8>>,
    /// KDF scheme, e.g. `dhSinglePass-stdDH-sha256kdf-scheme`.
    pub key_encryption_algorithm: Oid,
    /// The key-wrap `AlgorithmIdentifier`, exactly as encoded.
    pub key_encryption_params: Option<Vec<u8>>,
    pub encrypted_keys: Vec<RecipientEncryptedKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Agreement {
    Standard,
    Cofactor,
    Mqv,
}

fn scheme_table() -> [(Oid, HashAlgId, Agreement); 15] {
    use Agreement::*;
    [
        (known::dh_single_pass_std_dh_sha1kdf(), HashAlgId::Sha1, Standard),
        (known::dh_single_pass_std_dh_sha224kdf(), HashAlgId::Sha224, Standard),
        (known::dh_single_pass_std_dh_sha256kdf(), HashAlgId::Sha256, Standard),
        (known::dh_single_pass_std_dh_sha384kdf(), HashAlgId::Sha384, Standard),
        (known::dh_single_pass_std_dh_sha512kdf(), HashAlgId::Sha512, Standard),
        (known::dh_single_pass_cofactor_dh_sha1kdf(), HashAlgId::Sha1, Cofactor),
        (known::dh_single_pass_cofactor_dh_sha224kdf(), HashAlgId::Sha224, Cofactor),
        (known::dh_single_pass_cofactor_dh_sha256kdf(), HashAlgId::Sha256, Cofactor),
        (known::dh_single_pass_cofactor_dh_sha384kdf(), HashAlgId::Sha384, Cofactor),
        (known::dh_single_pass_cofactor_dh_sha512kdf(), HashAlgId::Sha512, Cofactor),
        (known::mqv_single_pass_sha1kdf(), HashAlgId::Sha1, Mqv),
        (known::mqv_single_pass_sha224kdf(), HashAlgId::Sha224, Mqv),
        (known::mqv_single_pass_sha256kdf(), HashAlgId::Sha256, Mqv),
        (known::mqv_single_pass_sha384kdf(), HashAlgId::Sha384, Mqv),
        (known::mqv_single_pass_sha512kdf(), HashAlgId::Sha512, Mqv),
    ]
}

fn kdf_scheme(oid: &Oid) -> Result<(HashAlgId, Agreement), CmsError> {
    scheme_table()
        .into_iter()
        .find(|(scheme, _, _)| scheme == oid)
        .map(|(_, hash, agreement)| (hash, agreement))
        .ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("key agreement scheme {oid}")))
}

fn standard_scheme(hash: HashAlgId) -> Oid {
    match hash {
        HashAlgId::Sha384 => known::dh_single_pass_std_dh_sha384kdf(),
        HashAlgId::Sha512 => known::dh_single_pass_std_dh_sha512kdf(),
        _ => known::dh_single_pass_std_dh_sha256kdf(),
    }
}

/// DER `ECC-CMS-SharedInfo` (RFC 5753 section 7.2).
///
/// ```text
/// ECC-CMS-SharedInfo ::= SEQUENCE {
///     keyInfo     AlgorithmIdentifier,
///     entityUInfo [0] EXPLICIT OCTET STRING OPTIONAL,
///     suppPubInfo [2] EXPLICIT OCTET STRING }
/// ```
pub(crate) fn ecc_cms_shared_info(wrap_algorithm: &[u8], ukm: Option<&[u8]>, kek_len: usize) -> Vec<u8> {
    let mut fields = wrap_algorithm.to_vec();
    if let Some(ukm) = ukm {
        fields.extend_from_slice(&enc_explicit_ctx(0, &enc_octet(ukm)));
    }
    let bits = (kek_len as u32) * 8;
    fields.extend_from_slice(&enc_explicit_ctx(2, &enc_octet(&bits.to_be_bytes())));
    enc_seq(&fields)
}

fn derive_kek(
    z: &[u8],
    hash: HashAlgId,
    wrap_algorithm: &[u8],
    ukm: Option<&[u8]>,
    kek_len: usize,
) -> Result<Zeroizing<Vec<u8>>, CmsError> {
    let shared_info = ecc_cms_shared_info(wrap_algorithm, ukm, kek_len);
    Ok(Zeroizing::new(
        X963Kdf::new(hash).derive_vec(z, &shared_info, kek_len)?,
    ))
}

impl KeyAgreeRecipient {
    /// Encrypt `cek` to the EC key in `cert` through an ephemeral ECDH
    /// exchange. The KDF hash follows the curve size.
    pub fn create(
        cert: &Certificate,
        kind: IdentifierKind,
        cek: &[u8],
        wrap: KeyWrapAlgId,
    ) -> Result<Self, CmsError> {
        if cert.public_key.key_type() != Some(PkeyAlgId::Ecdsa) {
            return Err(CmsError::UnsupportedAlgorithm(
                "key agreement needs an EC certificate".into(),
            ));
        }
        let curve = cert.public_key.ec_curve()?;
        let identifier = CertIdentifier::from_certificate(cert, kind)?;
        let hash = match curve {
            EccCurveId::NistP256 => HashAlgId::Sha256,
            EccCurveId::NistP384 => HashAlgId::Sha384,
        };

        let ephemeral = EcdhKeyPair::generate(curve);
        let z = ephemeral.shared_secret(&cert.public_key.public_key)?;
        let wrap_der = wrap_algorithm_der(wrap);
        let kek = derive_kek(&z, hash, &wrap_der, None, wrap.kek_len())?;
        let encrypted_key = wrap_cek(wrap, &kek, cek)?;
        debug!(?curve, ?wrap, "created key agreement recipient");

        Ok(Self {
            originator: Originator::PublicKey {
                algorithm: known::ec_public_key(),
                params: None,
                public_key: ephemeral.public_key_bytes(),
            },
            ukm: None,
            key_encryption_algorithm: standard_scheme(hash),
            key_encryption_params: Some(wrap_der),
            encrypted_keys: vec![RecipientEncryptedKey {
                identifier,
                encrypted_key,
            }],
        })
    }

    pub fn version(&self) -> u32 {
        3
    }

    /// The key-wrap algorithm from the scheme parameters.
    pub fn wrap_algorithm(&self) -> Result<KeyWrapAlgId, CmsError> {
        let params = self
            .key_encryption_params
            .as_deref()
            .ok_or_else(|| CmsError::structure("key agreement scheme without a key-wrap algorithm"))?;
        let (oid, _) = read_algorithm_identifier(&mut Decoder::new(params))?;
        oid_to_wrap(&oid).ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("key wrap {oid}")))
    }

    pub(super) fn decode_fields(content: &[u8]) -> Result<Self, CmsError> {
        let mut dec = Decoder::new(content);
        let version = dec.read_u32()?;
        if version != 3 {
            return Err(CmsError::structure(format!(
                "KeyAgreeRecipientInfo version {version}"
            )));
        }

        let explicit = dec.read_context_specific(0, true)?;
        let choice = Decoder::new(explicit.value).read_tlv()?;
        let originator = if choice.tag.is_context(1) && choice.tag.constructed {
            let mut opk = Decoder::new(choice.value);
            let (algorithm, params) = read_algorithm_identifier(&mut opk)?;
            let (_, public_key) = opk.read_bit_string()?;
            Originator::PublicKey {
                algorithm,
                params,
                public_key: public_key.to_vec(),
            }
        } else {
            Originator::Certificate(CertIdentifier::from_tlv(&choice)?)
        };

        let ukm = match dec.try_read_context_specific(1, true)? {
            Some(tlv) => Some(Decoder::new(tlv.value).read_tlv()?.octets()?),
            None => None,
        };
        let (key_encryption_algorithm, key_encryption_params) =
            read_algorithm_identifier(&mut dec)?;

        let mut keys = dec.read_sequence()?;
        let mut encrypted_keys = Vec::new();
        while !keys.is_empty() {
            let mut rek = keys.read_sequence()?;
            let rid = rek.read_tlv()?;
            let identifier = CertIdentifier::from_tlv(&rid)?;
            let encrypted_key = rek.read_tlv()?.octets()?;
            encrypted_keys.push(RecipientEncryptedKey {
                identifier,
                encrypted_key,
            });
        }
        if encrypted_keys.is_empty() {
            return Err(CmsError::structure("KeyAgreeRecipientInfo without encrypted keys"));
        }

        Ok(Self {
            originator,
            ukm,
            key_encryption_algorithm,
            key_encryption_params,
            encrypted_keys,
        })
    }

    pub(super) fn encode_fields(&self) -> Vec<u8> {
        let originator = match &self.originator {
            Originator::Certificate(id) => id.to_der(),
            Originator::PublicKey {
                algorithm,
                params,
                public_key,
            } => {
                let mut opk = Encoder::new();
                opk.write_raw(&enc_alg_id(algorithm, params.as_deref()))
                    .write_bit_string(0, public_key);
                enc_explicit_ctx(1, &opk.finish())
            }
        };
        let mut keys = Vec::new();
        for key in &self.encrypted_keys {
            let mut rek = key.identifier.to_key_agree_der();
            rek.extend_from_slice(&enc_octet(&key.encrypted_key));
            keys.extend_from_slice(&enc_seq(&rek));
        }

        let mut enc = Encoder::new();
        enc.write_uint(u64::from(self.version()))
            .write_raw(&enc_explicit_ctx(0, &originator));
        if let Some(ukm) = &self.ukm {
            enc.write_raw(&enc_explicit_ctx(1, &enc_octet(ukm)));
        }
        enc.write_raw(&enc_alg_id(
            &self.key_encryption_algorithm,
            self.key_encryption_params.as_deref(),
        ))
        .write_sequence(&keys);
        enc.finish()
    }
}

impl KeyAgreeRecipient {
    /// Position of the encrypted key addressed to `cert`, provided `cert`
    /// allows key agreement.
    pub fn encrypted_key_for(&self, cert: &Certificate) -> Option<usize> {
        self.encrypted_keys
            .iter()
            .position(|k| cert.matches_identifier(&k.identifier, &[KeyUsage::KEY_AGREEMENT]))
    }

    /// This recipient narrowed to the one encrypted key addressed to `cert`.
    pub fn select(&self, cert: &Certificate) -> Option<Self> {
        let index = self.encrypted_key_for(cert)?;
        Some(Self {
            encrypted_keys: vec![self.encrypted_keys[index].clone()],
            ..self.clone()
        })
    }

    /// Recover the content-encryption key from the encrypted key at `index`.
    /// No other entry is tried.
    pub fn unwrap_encrypted_key(
        &self,
        index: usize,
        secret: &Secret<'_>,
    ) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        let rek = self.encrypted_keys.get(index).ok_or_else(|| {
            CmsError::InsufficientSetup(format!("no encrypted key at position {index}"))
        })?;
        let (wrap, kek) = self.agreed_kek(secret)?;
        unwrap_cek(wrap, &kek, &rek.encrypted_key)
    }

    fn agreed_kek(&self, secret: &Secret<'_>) -> Result<(KeyWrapAlgId, Zeroizing<Vec<u8>>), CmsError> {
        let Secret::PrivateKey(key) = secret else {
            return Err(CmsError::InsufficientSetup(
                "key agreement recipients need an EC private key".into(),
            ));
        };
        if key.curve().is_none() {
            return Err(CmsError::InsufficientSetup(
                "key agreement recipients need an EC private key".into(),
            ));
        }
        let Originator::PublicKey {
            params, public_key, ..
        } = &self.originator
        else {
            return Err(CmsError::UnsupportedAlgorithm(
                "static originator keys named by certificate".into(),
            ));
        };

        let (hash, agreement) = kdf_scheme(&self.key_encryption_algorithm)?;
        match agreement {
            Agreement::Mqv => {
                return Err(CmsError::UnsupportedAlgorithm("MQV key agreement".into()))
            }
            // prime curves have cofactor 1, so only binary curves differ
            Agreement::Cofactor if originator_on_binary_curve(params.as_deref()) => {
                return Err(CmsError::UnsupportedAlgorithm(
                    "cofactor DH on binary curves".into(),
                ))
            }
            _ => {}
        }

        let wrap = self.wrap_algorithm()?;
        let wrap_der = self.key_encryption_params.as_deref().unwrap_or_default();
        let z = key.ecdh(public_key)?;
        let kek = derive_kek(&z, hash, wrap_der, self.ukm.as_deref(), wrap.kek_len())?;
        Ok((wrap, kek))
    }
}

impl KeyRecovery for KeyAgreeRecipient {
    /// A private key alone cannot tell encrypted keys apart, so a recipient
    /// with several must first be narrowed with [`KeyAgreeRecipient::select`].
    fn unwrap_cek(&self, secret: &Secret<'_>) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        match self.encrypted_keys.len() {
            1 => self.unwrap_encrypted_key(0, secret),
            n => {
                debug!(count = n, "key agreement recipient needs a certificate to pick a key");
                Err(CmsError::InsufficientSetup(format!(
                    "{n} encrypted keys; select one by recipient certificate"
                )))
            }
        }
    }
}

fn originator_on_binary_curve(params: Option<&[u8]>) -> bool {
    let Some(der) = params else {
        return false;
    };
    Decoder::new(der)
        .read_oid()
        .ok()
        .and_then(|value| Oid::from_der_value(value).ok())
        .is_some_and(|oid| is_binary_curve(&oid))
}
