//! The certificate extensions that steer CMS signer and recipient handling.

use cmskit_types::PkiError;
use cmskit_utils::asn1::Decoder;
use cmskit_utils::oid::known;

use super::certificate::Certificate;
use crate::encoding::asn1_err;

/// BasicConstraints (RFC 5280 section 4.2.1.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub path_len_constraint: Option<u32>,
}

impl BasicConstraints {
    pub fn from_der(value: &[u8]) -> Result<Self, PkiError> {
        let mut seq = Decoder::new(value).read_sequence().map_err(asn1_err)?;
        let is_ca = match seq.peek_tag() {
            Ok(tag) if tag.is_universal(0x01) => seq.read_boolean().map_err(asn1_err)?,
            _ => false,
        };
        let path_len_constraint = if seq.is_empty() {
            None
        } else {
            Some(seq.read_u32().map_err(asn1_err)?)
        };
        Ok(Self {
            is_ca,
            path_len_constraint,
        })
    }
}

/// KeyUsage (RFC 5280 section 4.2.1.3). Bit `n` of the BIT STRING maps to
/// `0x80 >> n` of the low byte; `decipherOnly` (bit 8) lands in the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub u16);

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: u16 = 0x0080;
    pub const NON_REPUDIATION: u16 = 0x0040;
    pub const KEY_ENCIPHERMENT: u16 = 0x0020;
    pub const DATA_ENCIPHERMENT: u16 = 0x0010;
    pub const KEY_AGREEMENT: u16 = 0x0008;
    pub const KEY_CERT_SIGN: u16 = 0x0004;
    pub const CRL_SIGN: u16 = 0x0002;
    pub const ENCIPHER_ONLY: u16 = 0x0001;
    pub const DECIPHER_ONLY: u16 = 0x8000;

    pub fn has(&self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn from_der(value: &[u8]) -> Result<Self, PkiError> {
        let (unused, bits) = Decoder::new(value).read_bit_string().map_err(asn1_err)?;
        let mut octets = [0u8; 2];
        for (dst, src) in octets.iter_mut().zip(bits) {
            *dst = *src;
        }
        // padding bits of the final octet carry no meaning
        if let Some(last) = bits.len().checked_sub(1).filter(|&i| i < 2) {
            octets[last] &= 0xFFu8 << unused;
        }
        Ok(Self(u16::from_le_bytes(octets)))
    }

    /// BIT STRING content (unused-bits octet first) with trailing zero bits
    /// trimmed as DER requires.
    pub fn to_bit_string(&self) -> Vec<u8> {
        let [low, high] = self.0.to_le_bytes();
        let mut octets = vec![low];
        if high != 0 {
            octets.push(high);
        }
        let last = octets[octets.len() - 1];
        let unused = if last == 0 { 0 } else { last.trailing_zeros() as u8 };
        let mut out = vec![unused];
        out.extend_from_slice(&octets);
        out
    }
}

impl Certificate {
    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        self.extension(&known::basic_constraints())
            .and_then(|e| BasicConstraints::from_der(&e.value).ok())
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.extension(&known::key_usage())
            .and_then(|e| KeyUsage::from_der(&e.value).ok())
    }

    pub fn subject_key_identifier(&self) -> Option<Vec<u8>> {
        let ext = self.extension(&known::subject_key_identifier())?;
        let ski = Decoder::new(&ext.value).read_octet_string().ok()?;
        Some(ski.to_vec())
    }

    pub fn is_ca(&self) -> bool {
        self.basic_constraints().is_some_and(|bc| bc.is_ca)
    }

    /// True when the key may be used for at least one of `usages`. A
    /// certificate without KeyUsage is unrestricted.
    pub fn permits_any_usage(&self, usages: &[u16]) -> bool {
        match self.key_usage() {
            Some(ku) => usages.is_empty() || usages.iter().any(|&u| ku.has(u)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_usage_single_octet() {
        // digitalSignature | keyEncipherment | keyCertSign, 2 unused bits
        let ku = KeyUsage::from_der(&[0x03, 0x02, 0x02, 0xa4]).unwrap();
        assert!(ku.has(KeyUsage::DIGITAL_SIGNATURE));
        assert!(ku.has(KeyUsage::KEY_ENCIPHERMENT));
        assert!(ku.has(KeyUsage::KEY_CERT_SIGN));
        assert!(!ku.has(KeyUsage::KEY_AGREEMENT));
        assert_eq!(ku.to_bit_string(), vec![0x02, 0xa4]);
    }

    #[test]
    fn test_key_usage_decipher_only() {
        let ku = KeyUsage::from_der(&[0x03, 0x03, 0x07, 0x08, 0x80]).unwrap();
        assert!(ku.has(KeyUsage::KEY_AGREEMENT));
        assert!(ku.has(KeyUsage::DECIPHER_ONLY));
        assert_eq!(ku.to_bit_string(), vec![0x07, 0x08, 0x80]);
    }

    #[test]
    fn test_key_usage_ignores_padding_bits() {
        // keyAgreement with a stray padding bit set
        let ku = KeyUsage::from_der(&[0x03, 0x02, 0x03, 0x09]).unwrap();
        assert_eq!(ku, KeyUsage(KeyUsage::KEY_AGREEMENT));
    }

    #[test]
    fn test_basic_constraints() {
        let bc = BasicConstraints::from_der(&[0x30, 0x06, 0x01, 0x01, 0xff, 0x02, 0x01, 0x00])
            .unwrap();
        assert!(bc.is_ca);
        assert_eq!(bc.path_len_constraint, Some(0));

        let bc = BasicConstraints::from_der(&[0x30, 0x00]).unwrap();
        assert!(!bc.is_ca);
        assert_eq!(bc.path_len_constraint, None);
    }
}
