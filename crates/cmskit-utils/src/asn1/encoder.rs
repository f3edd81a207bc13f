//! DER encoder.
//!
//! Writers append to an internal buffer and return `&mut Self` so calls
//! chain. Constructed values are built bottom-up: encode the members with a
//! child `Encoder`, then wrap the finished bytes.

use super::time::CivilTime;
use super::tags;

#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// One element with a single-octet identifier.
    pub fn write_tlv(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.reserve(value.len() + 6);
        self.buf.push(tag);
        self.buf.extend_from_slice(&encode_length(value.len()));
        self.buf.extend_from_slice(value);
        self
    }

    /// Already encoded elements, copied as-is.
    pub fn write_raw(&mut self, der: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(der);
        self
    }

    /// INTEGER from big-endian magnitude octets. A zero octet is prepended
    /// when the top bit would otherwise make the value negative.
    pub fn write_integer(&mut self, magnitude: &[u8]) -> &mut Self {
        match magnitude.first() {
            Some(&b) if b & 0x80 != 0 => {
                let padded = [&[0u8][..], magnitude].concat();
                self.write_tlv(tags::INTEGER, &padded)
            }
            _ => self.write_tlv(tags::INTEGER, magnitude),
        }
    }

    /// Minimal INTEGER encoding of `value`.
    pub fn write_uint(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take(7).take_while(|&&b| b == 0).count();
        self.write_integer(&bytes[skip..])
    }

    pub fn write_boolean(&mut self, value: bool) -> &mut Self {
        self.write_tlv(tags::BOOLEAN, &[if value { 0xFF } else { 0x00 }])
    }

    pub fn write_null(&mut self) -> &mut Self {
        self.write_tlv(tags::NULL, &[])
    }

    pub fn write_octet_string(&mut self, value: &[u8]) -> &mut Self {
        self.write_tlv(tags::OCTET_STRING, value)
    }

    pub fn write_bit_string(&mut self, unused_bits: u8, bits: &[u8]) -> &mut Self {
        let content = [&[unused_bits][..], bits].concat();
        self.write_tlv(tags::BIT_STRING, &content)
    }

    /// OBJECT IDENTIFIER from its content octets.
    pub fn write_oid(&mut self, content: &[u8]) -> &mut Self {
        self.write_tlv(tags::OID, content)
    }

    pub fn write_utf8_string(&mut self, s: &str) -> &mut Self {
        self.write_tlv(tags::UTF8_STRING, s.as_bytes())
    }

    pub fn write_printable_string(&mut self, s: &str) -> &mut Self {
        self.write_tlv(tags::PRINTABLE_STRING, s.as_bytes())
    }

    pub fn write_sequence(&mut self, content: &[u8]) -> &mut Self {
        self.write_tlv(tags::SEQUENCE, content)
    }

    /// SET whose content is already in the wanted order.
    pub fn write_set(&mut self, content: &[u8]) -> &mut Self {
        self.write_tlv(tags::SET, content)
    }

    /// SET OF, members sorted by their encodings (X.690 11.6).
    pub fn write_set_of(&mut self, members: &[Vec<u8>]) -> &mut Self {
        let mut ordered: Vec<&[u8]> = members.iter().map(Vec::as_slice).collect();
        ordered.sort_unstable();
        self.write_set(&ordered.concat())
    }

    /// `[tag_num]` with low tag number form.
    pub fn write_context_specific(
        &mut self,
        tag_num: u8,
        constructed: bool,
        content: &[u8],
    ) -> &mut Self {
        let mut tag = tags::CONTEXT_SPECIFIC | (tag_num & 0x1F);
        if constructed {
            tag |= tags::CONSTRUCTED;
        }
        self.write_tlv(tag, content)
    }

    pub fn write_utc_time(&mut self, timestamp: i64) -> &mut Self {
        let text = CivilTime::from_unix(timestamp).format_utc();
        self.write_tlv(tags::UTC_TIME, text.as_bytes())
    }

    pub fn write_generalized_time(&mut self, timestamp: i64) -> &mut Self {
        let text = CivilTime::from_unix(timestamp).format_generalized();
        self.write_tlv(tags::GENERALIZED_TIME, text.as_bytes())
    }

    /// X.509 / CMS `Time`: UTCTime inside 1950..2049, GeneralizedTime outside.
    pub fn write_time(&mut self, timestamp: i64) -> &mut Self {
        if CivilTime::from_unix(timestamp).fits_utc_time() {
            self.write_utc_time(timestamp)
        } else {
            self.write_generalized_time(timestamp)
        }
    }
}

/// Definite-form length octets, short form below 128.
pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let mut out = Vec::with_capacity(1 + bytes.len() - skip);
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::Decoder;

    #[test]
    fn test_write_strings() {
        let mut enc = Encoder::new();
        enc.write_utf8_string("Hi").write_printable_string("CN");
        assert_eq!(enc.finish(), &[0x0C, 2, b'H', b'i', 0x13, 2, b'C', b'N']);
    }

    #[test]
    fn test_write_integer_sign_padding() {
        let mut enc = Encoder::new();
        enc.write_integer(&[0x7F]).write_integer(&[0x80, 0x01]);
        assert_eq!(enc.finish(), &[0x02, 1, 0x7F, 0x02, 3, 0x00, 0x80, 0x01]);
    }

    #[test]
    fn test_write_uint_minimal() {
        let mut enc = Encoder::new();
        enc.write_uint(0).write_uint(2048).write_uint(200);
        assert_eq!(
            enc.finish(),
            &[0x02, 1, 0x00, 0x02, 2, 0x08, 0x00, 0x02, 2, 0x00, 0xC8]
        );
    }

    #[test]
    fn test_encode_length_forms() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(0x7F), vec![0x7F]);
        assert_eq!(encode_length(0x80), vec![0x81, 0x80]);
        assert_eq!(encode_length(0x1234), vec![0x82, 0x12, 0x34]);
        assert_eq!(encode_length(0x01_0000), vec![0x83, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_write_context_specific() {
        // [0] EXPLICIT INTEGER 2, then [1] IMPLICIT OCTET STRING
        let mut enc = Encoder::new();
        enc.write_context_specific(0, true, &[0x02, 1, 0x02])
            .write_context_specific(1, false, b"ab");
        assert_eq!(enc.finish(), &[0xA0, 3, 0x02, 1, 0x02, 0x81, 2, b'a', b'b']);
    }

    #[test]
    fn test_write_set_of_sorted() {
        let mut enc = Encoder::new();
        enc.write_set_of(&[vec![0x04, 1, 0x02], vec![0x02, 1, 0x01]]);
        assert_eq!(enc.finish(), &[0x31, 6, 0x02, 1, 0x01, 0x04, 1, 0x02]);
    }

    #[test]
    fn test_write_null_and_boolean() {
        let mut enc = Encoder::new();
        enc.write_null().write_boolean(true).write_boolean(false);
        assert_eq!(enc.finish(), &[0x05, 0, 0x01, 1, 0xFF, 0x01, 1, 0x00]);
    }

    #[test]
    fn test_write_time_switches_at_2050() {
        let mut enc = Encoder::new();
        // 2025-01-15 12:00:00, then 2050-06-20 00:00:00
        enc.write_time(1_736_942_400).write_time(2_539_296_000);
        let der = enc.finish();
        assert_eq!(&der[..15], b"\x17\x0d250115120000Z");
        assert_eq!(&der[15..], b"\x18\x0f20500620000000Z");

        let mut dec = Decoder::new(&der);
        assert_eq!(dec.read_time().unwrap(), 1_736_942_400);
        assert_eq!(dec.read_time().unwrap(), 2_539_296_000);
    }
}
