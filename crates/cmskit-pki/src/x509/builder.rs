//! Minting certificates for signers and recipients.
//!
//! Produces X.509 v3 certificates signed by a [`PrivateKey`]. The result is
//! reparsed, so a built certificate is indistinguishable from a loaded one.

use cmskit_types::PkiError;
use cmskit_utils::asn1::Encoder;
use cmskit_utils::oid::{known, Oid};

use super::certificate::{Certificate, DistinguishedName, SubjectPublicKeyInfo, X509Extension};
use super::extensions::KeyUsage;
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_octet, enc_seq, enc_set, enc_uint};
use crate::pkcs8::PrivateKey;

/// DER `Name` from `(short name, value)` pairs, one single-valued RDN each.
/// Unrecognised short names are written as commonName.
pub(crate) fn encode_name(entries: &[(String, String)]) -> Vec<u8> {
    let rdns: Vec<u8> = entries
        .iter()
        .flat_map(|(key, value)| {
            let oid = match key.as_str() {
                "C" => known::country_name(),
                "O" => known::organization_name(),
                "OU" => known::organizational_unit_name(),
                "L" => known::locality_name(),
                "ST" => known::state_or_province_name(),
                "serialNumber" => known::serial_number_attr(),
                "emailAddress" => known::email_address(),
                _ => known::common_name(),
            };
            let mut atav = Encoder::new();
            atav.write_raw(&oid.to_der());
            // RFC 5280 keeps countryName a PrintableString
            if key == "C" {
                atav.write_printable_string(value);
            } else {
                atav.write_utf8_string(value);
            }
            enc_set(&enc_seq(&atav.finish()))
        })
        .collect();
    enc_seq(&rdns)
}

/// Builder for X.509 v3 certificates.
pub struct CertificateBuilder {
    serial_number: Vec<u8>,
    issuer: DistinguishedName,
    subject: DistinguishedName,
    validity: (i64, i64),
    subject_public_key: Option<SubjectPublicKeyInfo>,
    extensions: Vec<X509Extension>,
}

impl Default for CertificateBuilder {
    fn default() -> Self {
        Self {
            serial_number: vec![0x01],
            issuer: DistinguishedName::new(&[]),
            subject: DistinguishedName::new(&[]),
            validity: (0, 0),
            subject_public_key: None,
            extensions: Vec::new(),
        }
    }
}

impl CertificateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serial_number(mut self, serial: &[u8]) -> Self {
        self.serial_number = serial.to_vec();
        self
    }

    pub fn issuer(mut self, dn: DistinguishedName) -> Self {
        self.issuer = dn;
        self
    }

    pub fn subject(mut self, dn: DistinguishedName) -> Self {
        self.subject = dn;
        self
    }

    /// Validity window as UNIX timestamps.
    pub fn validity(mut self, not_before: i64, not_after: i64) -> Self {
        self.validity = (not_before, not_after);
        self
    }

    pub fn subject_public_key(mut self, spki: SubjectPublicKeyInfo) -> Self {
        self.subject_public_key = Some(spki);
        self
    }

    /// `value` is the extnValue content.
    pub fn add_extension(mut self, oid: Oid, critical: bool, value: Vec<u8>) -> Self {
        self.extensions.push(X509Extension {
            oid,
            critical,
            value,
        });
        self
    }

    pub fn add_basic_constraints(self, is_ca: bool, path_len: Option<u32>) -> Self {
        let mut body = Encoder::new();
        if is_ca {
            body.write_boolean(true);
        }
        if let Some(len) = path_len {
            body.write_uint(u64::from(len));
        }
        self.add_extension(known::basic_constraints(), true, enc_seq(&body.finish()))
    }

    pub fn add_subject_key_identifier(self, key_id: &[u8]) -> Self {
        self.add_extension(known::subject_key_identifier(), false, enc_octet(key_id))
    }

    /// Critical KeyUsage from a mask of [`KeyUsage`] flags.
    pub fn add_key_usage(self, usage: u16) -> Self {
        let content = KeyUsage(usage).to_bit_string();
        let mut enc = Encoder::new();
        enc.write_bit_string(content[0], &content[1..]);
        self.add_extension(known::key_usage(), true, enc.finish())
    }

    /// Sign the certificate with `signing_key`.
    pub fn build(self, signing_key: &PrivateKey) -> Result<Certificate, PkiError> {
        let spki = self
            .subject_public_key
            .as_ref()
            .ok_or_else(|| PkiError::InvalidCert("subject public key not set".into()))?;
        let signature_algorithm = enc_alg_id(
            &signing_key.signature_algorithm()?,
            signing_key.signature_algorithm_params().as_deref(),
        );

        let (not_before, not_after) = self.validity;
        let mut validity = Encoder::new();
        validity.write_time(not_before).write_time(not_after);

        let mut tbs = Encoder::new();
        tbs.write_raw(&enc_explicit_ctx(0, &enc_uint(2)))
            .write_integer(&self.serial_number)
            .write_raw(&signature_algorithm)
            .write_raw(&self.issuer.raw)
            .write_raw(&enc_seq(&validity.finish()))
            .write_raw(&self.subject.raw)
            .write_raw(&spki.to_der());
        if !self.extensions.is_empty() {
            let list: Vec<u8> = self.extensions.iter().flat_map(X509Extension::to_der).collect();
            tbs.write_raw(&enc_explicit_ctx(3, &enc_seq(&list)));
        }
        let tbs = enc_seq(&tbs.finish());
        let signature = signing_key.sign(&tbs)?;

        let mut cert = Encoder::new();
        cert.write_raw(&tbs)
            .write_raw(&signature_algorithm)
            .write_bit_string(0, &signature);
        Certificate::from_der(&enc_seq(&cert.finish()))
    }

    /// Self-signed CA certificate for `signing_key` with a random positive
    /// serial and digitalSignature plus keyCertSign usage.
    pub fn self_signed(
        subject: DistinguishedName,
        signing_key: &PrivateKey,
        not_before: i64,
        not_after: i64,
    ) -> Result<Certificate, PkiError> {
        let mut serial = [0u8; 16];
        getrandom::getrandom(&mut serial)
            .map_err(|_| PkiError::InvalidCert("failed to generate random serial".into()))?;
        serial[0] = (serial[0] & 0x7F) | 0x01;

        CertificateBuilder::new()
            .serial_number(&serial)
            .issuer(subject.clone())
            .subject(subject)
            .validity(not_before, not_after)
            .subject_public_key(signing_key.public_key_info()?)
            .add_basic_constraints(true, None)
            .add_key_usage(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_CERT_SIGN)
            .build(signing_key)
    }
}
