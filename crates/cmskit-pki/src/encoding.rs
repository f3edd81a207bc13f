//! Shared ASN.1 encoding helpers for the PKI crate.
//!
//! Thin wrappers over `cmskit_utils::asn1::Encoder` producing one DER element
//! each. Used across the x509, pkcs8 and cms modules.

use cmskit_types::PkiError;
use cmskit_utils::asn1::{tags, Encoder};
use cmskit_utils::oid::Oid;

/// Encode a SEQUENCE containing `content`.
pub(crate) fn enc_seq(content: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_sequence(content);
    e.finish()
}

/// Encode a SET containing `content`.
pub(crate) fn enc_set(content: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_set(content);
    e.finish()
}

/// Encode an OCTET STRING.
pub(crate) fn enc_octet(content: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_octet_string(content);
    e.finish()
}

/// Encode an INTEGER from big-endian bytes.
pub(crate) fn enc_int(value: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_integer(value);
    e.finish()
}

/// Encode a small non-negative INTEGER.
pub(crate) fn enc_uint(value: u64) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_uint(value);
    e.finish()
}

/// Encode a NULL value.
pub(crate) fn enc_null() -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_null();
    e.finish()
}

/// Encode a raw TLV (Tag-Length-Value).
pub(crate) fn enc_tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut e = Encoder::new();
    e.write_tlv(tag, value);
    e.finish()
}

/// Encode an EXPLICIT (constructed) context-specific tagged value.
pub(crate) fn enc_explicit_ctx(tag_num: u8, content: &[u8]) -> Vec<u8> {
    enc_tlv(
        tags::CONTEXT_SPECIFIC | tags::CONSTRUCTED | tag_num,
        content,
    )
}

/// Encode an IMPLICIT primitive context-specific tagged value.
pub(crate) fn enc_implicit_ctx(tag_num: u8, content: &[u8]) -> Vec<u8> {
    enc_tlv(tags::CONTEXT_SPECIFIC | tag_num, content)
}

/// Encode an `AlgorithmIdentifier { algorithm, parameters }`.
///
/// `params` is a complete DER element; `None` omits the field.
pub(crate) fn enc_alg_id(oid: &Oid, params: Option<&[u8]>) -> Vec<u8> {
    let mut inner = oid.to_der();
    if let Some(p) = params {
        inner.extend_from_slice(p);
    }
    enc_seq(&inner)
}

/// Concatenate multiple raw byte slices into a single DER fragment.
pub(crate) fn enc_raw_parts(parts: &[&[u8]]) -> Vec<u8> {
    let mut e = Encoder::new();
    for p in parts {
        e.write_raw(p);
    }
    e.finish()
}

/// Map a decoder failure into a PKI error.
pub(crate) fn asn1_err(e: impl std::fmt::Display) -> PkiError {
    PkiError::Asn1Error(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmskit_utils::oid::known;

    #[test]
    fn test_alg_id_with_null() {
        let der = enc_alg_id(&known::sha256(), Some(&enc_null()));
        assert_eq!(hex::encode(der), "300d06096086480165030402010500");
    }

    #[test]
    fn test_alg_id_without_params() {
        let der = enc_alg_id(&known::id_aes128_wrap(), None);
        assert_eq!(hex::encode(der), "300b0609608648016503040105");
    }

    #[test]
    fn test_context_tags() {
        assert_eq!(enc_explicit_ctx(0, &[0x05, 0x00]), vec![0xa0, 0x02, 0x05, 0x00]);
        assert_eq!(enc_implicit_ctx(0, &[0xab]), vec![0x80, 0x01, 0xab]);
        assert_eq!(enc_uint(3), vec![0x02, 0x01, 0x03]);
        assert_eq!(enc_uint(128), vec![0x02, 0x02, 0x00, 0x80]);
    }
}
