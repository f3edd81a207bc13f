//! The parts of an X.509 certificate a CMS engine looks at.
//!
//! Names and serial numbers are kept as their exact encodings because CMS
//! identifiers compare them byte for byte. The complete certificate DER is
//! kept in `raw` so that certificates can be copied into messages unchanged.

use std::fmt;

use cmskit_types::{EccCurveId, PkeyAlgId, PkiError};
use cmskit_utils::asn1::{Decoder, Encoder, Tlv};
use cmskit_utils::oid::{known, oid_to_dn_short_name, Oid};

use super::signing::verify_digest_signature;
use crate::encoding::{asn1_err, enc_alg_id, enc_null, enc_seq};
use crate::oid_mapping::{oid_to_curve_id, signature_oid_parts};

/// A parsed certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub raw: Vec<u8>,
    /// 1, 2 or 3.
    pub version: u8,
    /// INTEGER content octets as encoded.
    pub serial_number: Vec<u8>,
    pub issuer: DistinguishedName,
    pub subject: DistinguishedName,
    pub not_before: i64,
    pub not_after: i64,
    pub public_key: SubjectPublicKeyInfo,
    pub extensions: Vec<X509Extension>,
    pub tbs_raw: Vec<u8>,
    pub signature_algorithm: Oid,
    pub signature_value: Vec<u8>,
}

/// A `Name`, with the attribute values decoded for display and lookup.
///
/// Equality compares the encodings.
#[derive(Debug, Clone)]
pub struct DistinguishedName {
    pub entries: Vec<(String, String)>,
    pub raw: Vec<u8>,
}

/// `SubjectPublicKeyInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPublicKeyInfo {
    pub algorithm: Oid,
    /// Complete parameters element. NULL is normalised to `None`.
    pub parameters: Option<Vec<u8>>,
    /// Content of the subjectPublicKey BIT STRING.
    pub public_key: Vec<u8>,
}

/// One entry of the `extensions` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Extension {
    pub oid: Oid,
    pub critical: bool,
    /// Content of the extnValue OCTET STRING.
    pub value: Vec<u8>,
}

/// `AlgorithmIdentifier` as (algorithm, parameters element). NULL parameters
/// read as absent.
fn read_algorithm(dec: &mut Decoder<'_>) -> Result<(Oid, Option<Vec<u8>>), PkiError> {
    let mut alg = dec.read_sequence().map_err(asn1_err)?;
    let oid = Oid::from_der_value(alg.read_oid().map_err(asn1_err)?).map_err(asn1_err)?;
    if alg.is_empty() {
        return Ok((oid, None));
    }
    let params = alg.read_tlv().map_err(asn1_err)?;
    let is_null = params.tag.is_universal(0x05) && params.value.is_empty();
    Ok((oid, (!is_null).then(|| params.raw.to_vec())))
}

fn expect_sequence<'a>(dec: &mut Decoder<'a>, what: &str) -> Result<Tlv<'a>, PkiError> {
    let tlv = dec.read_tlv().map_err(asn1_err)?;
    if !tlv.tag.is_universal(0x10) || !tlv.tag.constructed {
        return Err(PkiError::InvalidCert(format!("{what} is not a SEQUENCE")));
    }
    Ok(tlv)
}

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

impl DistinguishedName {
    /// One RDN per `(short name, value)` pair, in order.
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let entries: Vec<(String, String)> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let raw = super::builder::encode_name(&entries);
        Self { entries, raw }
    }

    /// First value of the attribute with short name `attr`.
    pub fn get(&self, attr: &str) -> Option<&str> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == attr).then_some(v.as_str()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self, PkiError> {
        Self::decode(&mut Decoder::new(der))
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>) -> Result<Self, PkiError> {
        let name = expect_sequence(dec, "Name")?;
        let mut rdns = Decoder::new(name.value);
        let mut entries = Vec::new();
        while !rdns.is_empty() {
            let mut rdn = rdns.read_set().map_err(asn1_err)?;
            while !rdn.is_empty() {
                let mut atav = rdn.read_sequence().map_err(asn1_err)?;
                let oid = Oid::from_der_value(atav.read_oid().map_err(asn1_err)?)
                    .map_err(asn1_err)?;
                let key = oid_to_dn_short_name(&oid)
                    .map(str::to_string)
                    .unwrap_or_else(|| oid.to_dot_string());
                let value = match atav.peek_tag().map_err(asn1_err)?.number {
                    0x0C | 0x13 | 0x14 | 0x16 | 0x1E => atav.read_string().map_err(asn1_err)?,
                    // RFC 4514 hex form for anything that is not a string
                    _ => {
                        let raw = atav.read_tlv().map_err(asn1_err)?.raw;
                        format!("#{}", raw.iter().map(|b| format!("{b:02x}")).collect::<String>())
                    }
                };
                entries.push((key, value));
            }
        }
        Ok(Self {
            entries,
            raw: name.raw.to_vec(),
        })
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for DistinguishedName {}

// ---------------------------------------------------------------------------
// SubjectPublicKeyInfo
// ---------------------------------------------------------------------------

impl SubjectPublicKeyInfo {
    pub fn key_type(&self) -> Option<PkeyAlgId> {
        if self.algorithm == known::rsa_encryption() {
            Some(PkeyAlgId::Rsa)
        } else if self.algorithm == known::ec_public_key() {
            Some(PkeyAlgId::Ecdsa)
        } else {
            None
        }
    }

    /// Named curve of an EC key. Explicit curve parameters are not supported.
    pub fn ec_curve(&self) -> Result<EccCurveId, PkiError> {
        let params = self
            .parameters
            .as_deref()
            .ok_or_else(|| PkiError::InvalidCert("EC key without curve parameters".into()))?;
        let oid = Decoder::new(params)
            .read_oid()
            .and_then(Oid::from_der_value)
            .map_err(|_| PkiError::InvalidCert("EC parameters are not a named curve".into()))?;
        oid_to_curve_id(&oid).ok_or_else(|| PkiError::InvalidCert(format!("unsupported curve {oid}")))
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>) -> Result<Self, PkiError> {
        let mut spki = dec.read_sequence().map_err(asn1_err)?;
        let (algorithm, parameters) = read_algorithm(&mut spki)?;
        let (_, bits) = spki.read_bit_string().map_err(asn1_err)?;
        Ok(Self {
            algorithm,
            parameters,
            public_key: bits.to_vec(),
        })
    }

    /// DER encoding. RSA keys get the NULL parameters RFC 3279 requires.
    pub fn to_der(&self) -> Vec<u8> {
        let params = match &self.parameters {
            Some(p) => Some(p.clone()),
            None if self.key_type() == Some(PkeyAlgId::Rsa) => Some(enc_null()),
            None => None,
        };
        let mut body = Encoder::new();
        body.write_raw(&enc_alg_id(&self.algorithm, params.as_deref()))
            .write_bit_string(0, &self.public_key);
        enc_seq(&body.finish())
    }
}

// ---------------------------------------------------------------------------
// Extensions
// ---------------------------------------------------------------------------

impl X509Extension {
    fn decode_list(content: &[u8]) -> Result<Vec<Self>, PkiError> {
        let mut list = Decoder::new(content).read_sequence().map_err(asn1_err)?;
        let mut out = Vec::new();
        while !list.is_empty() {
            let mut ext = list.read_sequence().map_err(asn1_err)?;
            let oid = Oid::from_der_value(ext.read_oid().map_err(asn1_err)?).map_err(asn1_err)?;
            let critical = match ext.peek_tag() {
                Ok(tag) if tag.is_universal(0x01) => ext.read_boolean().map_err(asn1_err)?,
                _ => false,
            };
            let value = ext.read_octet_string().map_err(asn1_err)?.to_vec();
            out.push(Self { oid, critical, value });
        }
        Ok(out)
    }

    pub fn to_der(&self) -> Vec<u8> {
        let mut body = Encoder::new();
        body.write_raw(&self.oid.to_der());
        if self.critical {
            body.write_boolean(true);
        }
        body.write_octet_string(&self.value);
        enc_seq(&body.finish())
    }
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

impl Certificate {
    pub fn from_der(data: &[u8]) -> Result<Self, PkiError> {
        let cert = expect_sequence(&mut Decoder::new(data), "certificate")?;
        let mut outer = Decoder::new(cert.value);
        let tbs = expect_sequence(&mut outer, "tbsCertificate")?;
        let mut fields = Decoder::new(tbs.value);

        let version = match fields.try_read_context_specific(0, true).map_err(asn1_err)? {
            Some(v) => match Decoder::new(v.value).read_u32().map_err(asn1_err)? {
                n @ 0..=2 => n as u8 + 1,
                n => return Err(PkiError::InvalidCert(format!("unknown version {n}"))),
            },
            None => 1,
        };
        let serial_number = fields.read_integer().map_err(asn1_err)?.to_vec();
        read_algorithm(&mut fields)?;
        let issuer = DistinguishedName::decode(&mut fields)?;
        let mut validity = fields.read_sequence().map_err(asn1_err)?;
        let not_before = validity.read_time().map_err(asn1_err)?;
        let not_after = validity.read_time().map_err(asn1_err)?;
        let subject = DistinguishedName::decode(&mut fields)?;
        let public_key = SubjectPublicKeyInfo::decode(&mut fields)?;

        // issuerUniqueID, subjectUniqueID
        for n in [1, 2] {
            fields.try_read_context_specific(n, false).map_err(asn1_err)?;
        }
        let extensions = match fields.try_read_context_specific(3, true).map_err(asn1_err)? {
            Some(exts) => X509Extension::decode_list(exts.value)?,
            None => Vec::new(),
        };

        let (signature_algorithm, _) = read_algorithm(&mut outer)?;
        let (_, signature) = outer.read_bit_string().map_err(asn1_err)?;

        Ok(Self {
            raw: cert.raw.to_vec(),
            version,
            serial_number,
            issuer,
            subject,
            not_before,
            not_after,
            public_key,
            extensions,
            tbs_raw: tbs.raw.to_vec(),
            signature_algorithm,
            signature_value: signature.to_vec(),
        })
    }

    /// First `CERTIFICATE` block of `pem`.
    pub fn from_pem(pem: &str) -> Result<Self, PkiError> {
        let blocks = cmskit_utils::pem::parse(pem).map_err(asn1_err)?;
        let block = blocks
            .iter()
            .find(|b| b.label == "CERTIFICATE")
            .ok_or_else(|| PkiError::InvalidCert("no CERTIFICATE block found".into()))?;
        Self::from_der(&block.data)
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.raw.clone()
    }

    pub fn to_pem(&self) -> String {
        cmskit_utils::pem::encode("CERTIFICATE", &self.raw)
    }

    /// Check this certificate's signature with `issuer`'s key. `Ok(false)`
    /// when the key type does not match the signature algorithm.
    pub fn verify_signature(&self, issuer: &Certificate) -> Result<bool, PkiError> {
        let Some((pkey, Some(hash))) = signature_oid_parts(&self.signature_algorithm) else {
            return Err(PkiError::InvalidCert(format!(
                "unsupported signature algorithm {}",
                self.signature_algorithm
            )));
        };
        if issuer.public_key.key_type() != Some(pkey) {
            return Ok(false);
        }
        let digest = cmskit_crypto::hash::digest(hash, &self.tbs_raw);
        verify_digest_signature(&issuer.public_key, hash, &digest, &self.signature_value)
    }

    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject
    }

    /// `issuer`'s subject is this certificate's issuer and its key verifies
    /// the signature.
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        self.issuer == issuer.subject && matches!(self.verify_signature(issuer), Ok(true))
    }

    /// Serial comparison that ignores redundant leading zero octets.
    pub fn has_serial(&self, serial: &[u8]) -> bool {
        fn significant(b: &[u8]) -> &[u8] {
            let skip = b.iter().take_while(|&&x| x == 0).count();
            &b[skip..]
        }
        significant(&self.serial_number) == significant(serial)
    }

    pub(crate) fn extension(&self, oid: &Oid) -> Option<&X509Extension> {
        self.extensions.iter().find(|e| &e.oid == oid)
    }
}
