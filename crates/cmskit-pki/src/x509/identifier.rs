//! Certificate identifiers used as CMS signer and recipient identifiers.
//!
//! ```text
//! SignerIdentifier ::= CHOICE {
//!     issuerAndSerialNumber IssuerAndSerialNumber,
//!     subjectKeyIdentifier  [0] SubjectKeyIdentifier }
//! ```
//!
//! `RecipientIdentifier` has the same shape. Key agreement recipients use
//! `rKeyId [0] IMPLICIT RecipientKeyIdentifier` instead of the bare key id.

use cmskit_types::PkiError;
use cmskit_utils::asn1::{Decoder, Encoder, Tlv};

use super::certificate::{Certificate, DistinguishedName};
use crate::encoding::asn1_err;

/// Which identifier form to derive from a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentifierKind {
    #[default]
    IssuerAndSerialNumber,
    SubjectKeyIdentifier,
}

/// Identifies a certificate by issuer and serial number or by subject key id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertIdentifier {
    IssuerAndSerial {
        /// DER `Name` of the issuer.
        issuer: Vec<u8>,
        /// INTEGER content octets.
        serial: Vec<u8>,
    },
    SubjectKeyId(Vec<u8>),
}

impl CertIdentifier {
    /// Derive an identifier of the requested kind from `cert`.
    pub fn from_certificate(cert: &Certificate, kind: IdentifierKind) -> Result<Self, PkiError> {
        match kind {
            IdentifierKind::IssuerAndSerialNumber => Ok(Self::IssuerAndSerial {
                issuer: cert.issuer.raw.clone(),
                serial: cert.serial_number.clone(),
            }),
            IdentifierKind::SubjectKeyIdentifier => cert
                .subject_key_identifier()
                .map(Self::SubjectKeyId)
                .ok_or_else(|| {
                    PkiError::UnsupportedExtension("subjectKeyIdentifier is not present".into())
                }),
        }
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            Self::IssuerAndSerial { .. } => IdentifierKind::IssuerAndSerialNumber,
            Self::SubjectKeyId(_) => IdentifierKind::SubjectKeyIdentifier,
        }
    }

    /// `SignerIdentifier` / `RecipientIdentifier` encoding.
    pub fn to_der(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        match self {
            Self::IssuerAndSerial { issuer, serial } => {
                let mut inner = Encoder::new();
                inner.write_raw(issuer);
                inner.write_tlv(0x02, serial);
                enc.write_sequence(&inner.finish());
            }
            Self::SubjectKeyId(ski) => {
                enc.write_context_specific(0, false, ski);
            }
        }
        enc.finish()
    }

    /// `KeyAgreeRecipientIdentifier` encoding.
    pub fn to_key_agree_der(&self) -> Vec<u8> {
        match self {
            Self::IssuerAndSerial { .. } => self.to_der(),
            Self::SubjectKeyId(ski) => {
                let mut inner = Encoder::new();
                inner.write_octet_string(ski);
                let mut enc = Encoder::new();
                enc.write_context_specific(0, true, &inner.finish());
                enc.finish()
            }
        }
    }

    /// Parse any of the identifier encodings from an element already read.
    pub fn from_tlv(tlv: &Tlv<'_>) -> Result<Self, PkiError> {
        if tlv.tag.is_universal(0x10) && tlv.tag.constructed {
            let mut dec = Decoder::new(tlv.value);
            let issuer_tlv = dec.read_tlv().map_err(asn1_err)?;
            // validates the Name
            DistinguishedName::from_der(issuer_tlv.raw)?;
            let serial = dec.read_integer().map_err(asn1_err)?.to_vec();
            return Ok(Self::IssuerAndSerial {
                issuer: issuer_tlv.raw.to_vec(),
                serial,
            });
        }
        if tlv.tag.is_context(0) {
            if !tlv.tag.constructed {
                return Ok(Self::SubjectKeyId(tlv.value.to_vec()));
            }
            // RecipientKeyIdentifier; date and other are ignored
            let mut dec = Decoder::new(tlv.value);
            let mut rki = dec.read_sequence().map_err(asn1_err)?;
            let ski = rki.read_octet_string().map_err(asn1_err)?;
            return Ok(Self::SubjectKeyId(ski.to_vec()));
        }
        Err(PkiError::Asn1Error(format!(
            "unexpected identifier tag {:?}",
            tlv.tag
        )))
    }

    /// Parse the next identifier from `dec`.
    pub fn decode(dec: &mut Decoder<'_>) -> Result<Self, PkiError> {
        let tlv = dec.read_tlv().map_err(asn1_err)?;
        Self::from_tlv(&tlv)
    }
}

impl Certificate {
    /// True when `id` names this certificate and its key may be used for any
    /// of `usages` (see [`Certificate::permits_any_usage`]).
    pub fn matches_identifier(&self, id: &CertIdentifier, usages: &[u16]) -> bool {
        let named = match id {
            CertIdentifier::IssuerAndSerial { issuer, serial } => {
                self.issuer.raw == *issuer && self.has_serial(serial)
            }
            CertIdentifier::SubjectKeyId(ski) => {
                self.subject_key_identifier().as_deref() == Some(ski.as_slice())
            }
        };
        named && self.permits_any_usage(usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::KeyUsage;

    const RSA_CERT: &str = include_str!("../../../../tests/data/rsa2048.crt");
    const EC_CERT: &str = include_str!("../../../../tests/data/ec_p256.crt");

    #[test]
    fn test_issuer_and_serial_roundtrip() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        let id = CertIdentifier::from_certificate(&cert, IdentifierKind::default()).unwrap();
        assert_eq!(id.kind(), IdentifierKind::IssuerAndSerialNumber);

        let der = id.to_der();
        let parsed = CertIdentifier::decode(&mut Decoder::new(&der)).unwrap();
        assert_eq!(parsed, id);
        assert!(cert.matches_identifier(&parsed, &[KeyUsage::KEY_ENCIPHERMENT]));
        assert!(!cert.matches_identifier(&parsed, &[KeyUsage::KEY_AGREEMENT]));
    }

    #[test]
    fn test_subject_key_identifier_forms() {
        let cert = Certificate::from_pem(EC_CERT).unwrap();
        let id = CertIdentifier::from_certificate(&cert, IdentifierKind::SubjectKeyIdentifier)
            .unwrap();
        assert_eq!(
            id,
            CertIdentifier::SubjectKeyId(
                hex::decode("f68ce57becc8f46fbf58b799d639709d3564dd49").unwrap()
            )
        );

        let der = id.to_der();
        assert_eq!(der[0], 0x80);
        assert_eq!(CertIdentifier::decode(&mut Decoder::new(&der)).unwrap(), id);

        let der = id.to_key_agree_der();
        assert_eq!(der[0], 0xa0);
        assert_eq!(CertIdentifier::decode(&mut Decoder::new(&der)).unwrap(), id);
        assert!(cert.matches_identifier(&id, &[KeyUsage::KEY_AGREEMENT]));
    }

    #[test]
    fn test_serial_leading_zero_matches() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        let mut serial = vec![0x00];
        serial.extend_from_slice(&cert.serial_number);
        let id = CertIdentifier::IssuerAndSerial {
            issuer: cert.issuer.raw.clone(),
            serial,
        };
        assert!(cert.matches_identifier(&id, &[]));

        let other = Certificate::from_pem(EC_CERT).unwrap();
        assert!(!other.matches_identifier(&id, &[]));
    }

    #[test]
    fn test_missing_subject_key_identifier() {
        use crate::pkcs8::PrivateKey;
        use crate::x509::CertificateBuilder;
        use cmskit_types::EccCurveId;

        let key = PrivateKey::generate_ec(EccCurveId::NistP256);
        let cert = CertificateBuilder::self_signed(
            DistinguishedName::new(&[("CN", "no ski")]),
            &key,
            1_700_000_000,
            1_800_000_000,
        )
        .unwrap();
        let err = CertIdentifier::from_certificate(&cert, IdentifierKind::SubjectKeyIdentifier)
            .unwrap_err();
        assert!(err.to_string().contains("subjectKeyIdentifier is not present"));
    }
}
