//! CMS attributes (RFC 5652 section 5.3) and the attribute values signers
//! carry: content type, message digest, signing time, S/MIME capabilities
//! (RFC 8551) and ESS signing certificates (RFC 2634 / RFC 5035).

use cmskit_crypto::hash::digest;
use cmskit_types::{CmsError, HashAlgId};
use cmskit_utils::asn1::{Decoder, Encoder};
use cmskit_utils::oid::{known, Oid};

use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_int, enc_octet, enc_seq};
use crate::oid_mapping::{hash_to_oid, oid_to_hash};
use crate::x509::Certificate;

/// One `Attribute ::= SEQUENCE { attrType, attrValues SET OF AttributeValue }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub oid: Oid,
    /// Complete DER encodings of each value.
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    pub fn new(oid: Oid, values: Vec<Vec<u8>>) -> Self {
        Self { oid, values }
    }

    /// Attribute with a single value.
    pub fn single(oid: Oid, value: Vec<u8>) -> Self {
        Self::new(oid, vec![value])
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CmsError> {
        let mut outer = Decoder::new(der);
        let mut seq = outer.read_sequence().map_err(CmsError::decode)?;
        let oid = Oid::from_der_value(seq.read_oid().map_err(CmsError::decode)?)
            .map_err(CmsError::decode)?;
        let mut set = seq.read_set().map_err(CmsError::decode)?;
        let mut values = Vec::new();
        while !set.is_empty() {
            values.push(set.read_tlv().map_err(CmsError::decode)?.raw.to_vec());
        }
        Ok(Self { oid, values })
    }

    pub fn to_der(&self) -> Vec<u8> {
        let mut set = Encoder::new();
        set.write_set_of(&self.values);
        let mut inner = self.oid.to_der();
        inner.extend_from_slice(&set.finish());
        enc_seq(&inner)
    }

    pub fn first_value(&self) -> Option<&[u8]> {
        self.values.first().map(Vec::as_slice)
    }
}

pub(crate) fn content_type_attribute(content_type: &Oid) -> Attribute {
    Attribute::single(known::id_content_type(), content_type.to_der())
}

pub(crate) fn message_digest_attribute(digest: &[u8]) -> Attribute {
    Attribute::single(known::id_message_digest(), enc_octet(digest))
}

pub(crate) fn signing_time_attribute(timestamp: i64) -> Attribute {
    let mut enc = Encoder::new();
    enc.write_time(timestamp);
    Attribute::single(known::id_signing_time(), enc.finish())
}

/// Digest carried by an `id-messageDigest` value.
pub(crate) fn parse_message_digest(value: &[u8]) -> Result<Vec<u8>, CmsError> {
    Decoder::new(value).read_octets().map_err(CmsError::decode)
}

// ---------------------------------------------------------------------------
// S/MIME capabilities
// ---------------------------------------------------------------------------

/// One `SMIMECapability ::= SEQUENCE { capabilityID, parameters ANY OPTIONAL }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmimeCapability {
    pub oid: Oid,
    /// Complete DER encoding of the parameters, when present.
    pub parameters: Option<Vec<u8>>,
}

impl SmimeCapability {
    pub fn new(oid: Oid) -> Self {
        Self {
            oid,
            parameters: None,
        }
    }

    pub fn with_parameters(oid: Oid, parameters: Vec<u8>) -> Self {
        Self {
            oid,
            parameters: Some(parameters),
        }
    }

    /// Parse an `SMIMECapabilities` attribute value.
    pub fn decode_list(value: &[u8]) -> Result<Vec<Self>, CmsError> {
        let mut outer = Decoder::new(value);
        let mut seq = outer.read_sequence().map_err(CmsError::decode)?;
        let mut caps = Vec::new();
        while !seq.is_empty() {
            let mut cap = seq.read_sequence().map_err(CmsError::decode)?;
            let oid = Oid::from_der_value(cap.read_oid().map_err(CmsError::decode)?)
                .map_err(CmsError::decode)?;
            let parameters = if cap.is_empty() {
                None
            } else {
                Some(cap.read_tlv().map_err(CmsError::decode)?.raw.to_vec())
            };
            caps.push(Self { oid, parameters });
        }
        Ok(caps)
    }

    /// Encode an `SMIMECapabilities` value; order is preference order.
    pub fn encode_list(caps: &[Self]) -> Vec<u8> {
        let body: Vec<u8> = caps
            .iter()
            .flat_map(|c| enc_alg_id(&c.oid, c.parameters.as_deref()))
            .collect();
        enc_seq(&body)
    }
}

// ---------------------------------------------------------------------------
// ESS signing certificate
// ---------------------------------------------------------------------------

/// `IssuerSerial` with the issuer reduced to its directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerSerial {
    /// DER `Name`.
    pub issuer: Vec<u8>,
    /// INTEGER content octets.
    pub serial: Vec<u8>,
}

/// `ESSCertID` (v1, SHA-1 implied) or `ESSCertIDv2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssCertId {
    pub hash: HashAlgId,
    pub cert_hash: Vec<u8>,
    pub issuer_serial: Option<IssuerSerial>,
}

impl EssCertId {
    pub fn for_certificate(cert: &Certificate, hash: HashAlgId) -> Self {
        Self {
            hash,
            cert_hash: digest(hash, &cert.raw),
            issuer_serial: Some(IssuerSerial {
                issuer: cert.issuer.raw.clone(),
                serial: cert.serial_number.clone(),
            }),
        }
    }

    /// True when the hash covers `cert` and the issuer/serial, if any, name it.
    pub fn matches(&self, cert: &Certificate) -> bool {
        if digest(self.hash, &cert.raw) != self.cert_hash {
            return false;
        }
        match &self.issuer_serial {
            Some(is) => cert.issuer.raw == is.issuer && cert.has_serial(&is.serial),
            None => true,
        }
    }

    fn decode(dec: &mut Decoder<'_>, v2: bool) -> Result<Self, CmsError> {
        let mut seq = dec.read_sequence().map_err(CmsError::decode)?;
        let mut hash = if v2 { HashAlgId::Sha256 } else { HashAlgId::Sha1 };
        if v2 && seq.peek_tag().map_err(CmsError::decode)?.is_universal(0x10) {
            let mut alg = seq.read_sequence().map_err(CmsError::decode)?;
            let oid = Oid::from_der_value(alg.read_oid().map_err(CmsError::decode)?)
                .map_err(CmsError::decode)?;
            hash = oid_to_hash(&oid).ok_or_else(|| {
                CmsError::UnsupportedAlgorithm(format!("ESS certificate hash {oid}"))
            })?;
        }
        let cert_hash = seq.read_octet_string().map_err(CmsError::decode)?.to_vec();
        let issuer_serial = if seq.is_empty() {
            None
        } else {
            Some(decode_issuer_serial(&mut seq)?)
        };
        Ok(Self {
            hash,
            cert_hash,
            issuer_serial,
        })
    }

    fn encode(&self, v2: bool) -> Vec<u8> {
        let mut inner = Vec::new();
        // hashAlgorithm DEFAULT sha256
        if v2 && self.hash != HashAlgId::Sha256 {
            inner.extend_from_slice(&enc_alg_id(&hash_to_oid(self.hash), None));
        }
        inner.extend_from_slice(&enc_octet(&self.cert_hash));
        if let Some(is) = &self.issuer_serial {
            let general_names = enc_seq(&enc_explicit_ctx(4, &is.issuer));
            let mut body = general_names;
            body.extend_from_slice(&enc_int(&is.serial));
            inner.extend_from_slice(&enc_seq(&body));
        }
        enc_seq(&inner)
    }
}

fn decode_issuer_serial(dec: &mut Decoder<'_>) -> Result<IssuerSerial, CmsError> {
    let mut seq = dec.read_sequence().map_err(CmsError::decode)?;
    let mut names = seq.read_sequence().map_err(CmsError::decode)?;
    let mut issuer = None;
    while !names.is_empty() {
        let name = names.read_tlv().map_err(CmsError::decode)?;
        if name.tag.is_context(4) && issuer.is_none() {
            issuer = Some(name.value.to_vec());
        }
    }
    let issuer =
        issuer.ok_or_else(|| CmsError::structure("issuerSerial without a directoryName"))?;
    let serial = seq.read_integer().map_err(CmsError::decode)?.to_vec();
    Ok(IssuerSerial { issuer, serial })
}

/// `SigningCertificate` / `SigningCertificateV2`. Policies are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningCertificate {
    pub v2: bool,
    pub certs: Vec<EssCertId>,
}

impl SigningCertificate {
    /// A v2 value naming `cert` by its SHA-256 hash and issuer/serial.
    pub fn for_certificate(cert: &Certificate) -> Self {
        Self {
            v2: true,
            certs: vec![EssCertId::for_certificate(cert, HashAlgId::Sha256)],
        }
    }

    pub fn attribute_oid(&self) -> Oid {
        if self.v2 {
            known::id_aa_signing_certificate_v2()
        } else {
            known::id_aa_signing_certificate()
        }
    }

    pub fn decode(value: &[u8], v2: bool) -> Result<Self, CmsError> {
        let mut outer = Decoder::new(value);
        let mut seq = outer.read_sequence().map_err(CmsError::decode)?;
        let mut list = seq.read_sequence().map_err(CmsError::decode)?;
        let mut certs = Vec::new();
        while !list.is_empty() {
            certs.push(EssCertId::decode(&mut list, v2)?);
        }
        Ok(Self { v2, certs })
    }

    pub fn to_der(&self) -> Vec<u8> {
        let list: Vec<u8> = self.certs.iter().flat_map(|c| c.encode(self.v2)).collect();
        enc_seq(&enc_seq(&list))
    }

    pub fn to_attribute(&self) -> Attribute {
        Attribute::single(self.attribute_oid(), self.to_der())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = include_str!("../../../../tests/data/rsa2048.crt");
    const EC_CERT: &str = include_str!("../../../../tests/data/ec_p256.crt");

    #[test]
    fn test_attribute_roundtrip() {
        let attr = content_type_attribute(&known::id_data());
        let der = attr.to_der();
        assert_eq!(
            hex::encode(&der),
            "301806092a864886f70d010903310b06092a864886f70d010701"
        );
        assert_eq!(Attribute::from_der(&der).unwrap(), attr);
    }

    #[test]
    fn test_message_digest_value() {
        let attr = message_digest_attribute(&[0xaa; 4]);
        assert_eq!(parse_message_digest(attr.first_value().unwrap()).unwrap(), vec![0xaa; 4]);
    }

    #[test]
    fn test_signing_time_uses_utc_time() {
        // 2025-01-01T00:00:00Z
        let attr = signing_time_attribute(1_735_689_600);
        assert_eq!(attr.first_value().unwrap()[0], 0x17);
        assert_eq!(&attr.first_value().unwrap()[2..], b"250101000000Z");
    }

    #[test]
    fn test_smime_capabilities() {
        let caps = vec![
            SmimeCapability::new(known::aes256_cbc()),
            SmimeCapability::with_parameters(known::des_ede3_cbc(), vec![0x05, 0x00]),
        ];
        let der = SmimeCapability::encode_list(&caps);
        assert_eq!(SmimeCapability::decode_list(&der).unwrap(), caps);
        assert!(SmimeCapability::decode_list(&[0x30, 0x02, 0x05, 0x00]).is_err());
    }

    #[test]
    fn test_ess_v2_default_hash_omitted() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        let sc = SigningCertificate::for_certificate(&cert);
        let der = sc.to_der();
        // SEQ { SEQ { SEQ { OCTET STRING ... } } }: no AlgorithmIdentifier first
        let mut dec = Decoder::new(&der);
        let mut outer = dec.read_sequence().unwrap();
        let mut list = outer.read_sequence().unwrap();
        let mut id = list.read_sequence().unwrap();
        assert!(id.peek_tag().unwrap().is_universal(0x04));

        let parsed = SigningCertificate::decode(&der, true).unwrap();
        assert_eq!(parsed, sc);
        assert!(parsed.certs[0].matches(&cert));
        assert!(!parsed.certs[0].matches(&Certificate::from_pem(EC_CERT).unwrap()));
    }

    #[test]
    fn test_ess_v2_explicit_hash() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        let sc = SigningCertificate {
            v2: true,
            certs: vec![EssCertId::for_certificate(&cert, HashAlgId::Sha384)],
        };
        let parsed = SigningCertificate::decode(&sc.to_der(), true).unwrap();
        assert_eq!(parsed.certs[0].hash, HashAlgId::Sha384);
        assert!(parsed.certs[0].matches(&cert));
    }

    #[test]
    fn test_ess_v1_sha1() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        let sc = SigningCertificate {
            v2: false,
            certs: vec![EssCertId {
                hash: HashAlgId::Sha1,
                cert_hash: digest(HashAlgId::Sha1, &cert.raw),
                issuer_serial: None,
            }],
        };
        assert_eq!(sc.attribute_oid(), known::id_aa_signing_certificate());
        let parsed = SigningCertificate::decode(&sc.to_der(), false).unwrap();
        assert!(parsed.certs[0].matches(&cert));
    }
}
