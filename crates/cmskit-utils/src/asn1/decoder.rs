//! ASN.1 BER/DER decoder.
//!
//! DER input is the common case. BER input is accepted where CMS producers are
//! known to emit it: indefinite lengths terminated by end-of-contents octets and
//! constructed (segmented) OCTET STRING / BIT STRING values.

use super::time::CivilTime;
use super::{tags, Header, Tag, TagClass, Tlv};
use cmskit_types::CryptoError;

/// Maximum nesting depth accepted while scanning indefinite-length values.
const MAX_DEPTH: usize = 64;

/// Cursor over a run of sibling elements. Readers borrow from the input.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Input not consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    /// Byte offset of the next element.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Next element in any form. Indefinite lengths are resolved, and
    /// `value` excludes the end-of-contents octets.
    pub fn read_tlv(&mut self) -> Result<Tlv<'a>, CryptoError> {
        let rest = self.remaining();
        let header = Header::parse(rest)?;
        let total = element_len(rest, 0)?;
        let content_end = match header.content_len {
            Some(len) => header.header_len + len,
            // strip the trailing end-of-contents octets
            None => total - 2,
        };
        let tlv = Tlv {
            tag: header.tag,
            value: &rest[header.header_len..content_end],
            raw: &rest[..total],
            indefinite: header.content_len.is_none(),
        };
        self.pos += total;
        Ok(tlv)
    }

    /// Next element, required to be universal `number` in the given form.
    /// `None` for `constructed` accepts either form.
    fn read_universal(&mut self, number: u8, constructed: Option<bool>) -> Result<Tlv<'a>, CryptoError> {
        let tlv = self.read_tlv()?;
        let form_ok = constructed.map_or(true, |c| c == tlv.tag.constructed);
        if !tlv.tag.is_universal(u32::from(number)) || !form_ok {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(tlv)
    }

    /// INTEGER content octets, two's complement, leading zero kept.
    pub fn read_integer(&mut self) -> Result<&'a [u8], CryptoError> {
        let tlv = self.read_universal(tags::INTEGER, Some(false))?;
        if tlv.value.is_empty() {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(tlv.value)
    }

    /// A small non-negative INTEGER such as a version or an iteration count.
    pub fn read_u32(&mut self) -> Result<u32, CryptoError> {
        let bytes = self.read_integer()?;
        if bytes[0] & 0x80 != 0 {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let significant = bytes.iter().skip_while(|&&b| b == 0).count();
        if significant > 4 {
            return Err(CryptoError::InputOverflow);
        }
        Ok(bytes[bytes.len() - significant..]
            .iter()
            .fold(0, |acc, &b| (acc << 8) | u32::from(b)))
    }

    /// Primitive OCTET STRING, borrowed.
    pub fn read_octet_string(&mut self) -> Result<&'a [u8], CryptoError> {
        Ok(self.read_universal(tags::OCTET_STRING, Some(false))?.value)
    }

    /// OCTET STRING in either form; BER segments are joined.
    pub fn read_octets(&mut self) -> Result<Vec<u8>, CryptoError> {
        self.read_universal(tags::OCTET_STRING, None)?.octets()
    }

    /// BIT STRING as `(unused_bits, bits)`.
    pub fn read_bit_string(&mut self) -> Result<(u8, &'a [u8]), CryptoError> {
        let tlv = self.read_universal(tags::BIT_STRING, Some(false))?;
        match tlv.value.split_first() {
            Some((&unused, bits)) if unused < 8 => Ok((unused, bits)),
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    /// OBJECT IDENTIFIER content octets.
    pub fn read_oid(&mut self) -> Result<&'a [u8], CryptoError> {
        let tlv = self.read_universal(tags::OID, Some(false))?;
        if tlv.value.is_empty() {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(tlv.value)
    }

    pub fn read_null(&mut self) -> Result<(), CryptoError> {
        let tlv = self.read_universal(tags::NULL, Some(false))?;
        if !tlv.value.is_empty() {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(())
    }

    /// SEQUENCE, returning a decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder<'a>, CryptoError> {
        Ok(Decoder::new(self.read_universal(0x10, Some(true))?.value))
    }

    /// SET or SET OF, returning a decoder over its content.
    pub fn read_set(&mut self) -> Result<Decoder<'a>, CryptoError> {
        Ok(Decoder::new(self.read_universal(0x11, Some(true))?.value))
    }

    /// The next tag, without consuming anything.
    pub fn peek_tag(&self) -> Result<Tag, CryptoError> {
        if self.is_empty() {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Tag::from_bytes(self.remaining()).map(|(tag, _)| tag)
    }

    /// BOOLEAN; BER allows any non-zero octet for TRUE.
    pub fn read_boolean(&mut self) -> Result<bool, CryptoError> {
        match self.read_universal(tags::BOOLEAN, Some(false))?.value {
            [b] => Ok(*b != 0),
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    /// A context-specific element `[tag_num]` in the given form.
    pub fn read_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
    ) -> Result<Tlv<'a>, CryptoError> {
        self.try_read_context_specific(tag_num, constructed)?
            .ok_or(CryptoError::DecodeAsn1Fail)
    }

    /// Like [`Decoder::read_context_specific`], but leaves the input alone and
    /// returns `None` when the next element is something else.
    pub fn try_read_context_specific(
        &mut self,
        tag_num: u32,
        constructed: bool,
    ) -> Result<Option<Tlv<'a>>, CryptoError> {
        if self.is_empty() {
            return Ok(None);
        }
        let tag = self.peek_tag()?;
        if !tag.is_context(tag_num) || tag.constructed != constructed {
            return Ok(None);
        }
        self.read_tlv().map(Some)
    }

    /// A directory string as used in names and attribute values.
    pub fn read_string(&mut self) -> Result<String, CryptoError> {
        let tlv = self.read_tlv()?;
        if tlv.tag.class != TagClass::Universal {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        match tlv.tag.number {
            // UTF8String, PrintableString, IA5String
            0x0C | 0x13 | 0x16 => {
                String::from_utf8(tlv.value.to_vec()).map_err(|_| CryptoError::DecodeAsn1Fail)
            }
            // TeletexString, read as Latin-1
            0x14 => Ok(tlv.value.iter().copied().map(char::from).collect()),
            // BMPString
            0x1E => {
                if tlv.value.len() % 2 != 0 {
                    return Err(CryptoError::DecodeAsn1Fail);
                }
                let units = tlv.value.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]]));
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|_| CryptoError::DecodeAsn1Fail)
            }
            _ => Err(CryptoError::DecodeAsn1Fail),
        }
    }

    /// UTCTime or GeneralizedTime, as seconds since the UNIX epoch.
    pub fn read_time(&mut self) -> Result<i64, CryptoError> {
        let tlv = self.read_tlv()?;
        let text = core::str::from_utf8(tlv.value).map_err(|_| CryptoError::DecodeAsn1Fail)?;
        let civil = if tlv.tag.is_universal(u32::from(tags::UTC_TIME)) {
            CivilTime::parse_utc(text)?
        } else if tlv.tag.is_universal(u32::from(tags::GENERALIZED_TIME)) {
            CivilTime::parse_generalized(text)?
        } else {
            return Err(CryptoError::DecodeAsn1Fail);
        };
        civil.to_unix()
    }
}

impl<'a> Tlv<'a> {
    /// Content octets of a string type, concatenating BER segments when the
    /// value uses the constructed form.
    pub fn octets(&self) -> Result<Vec<u8>, CryptoError> {
        if !self.tag.constructed {
            return Ok(self.value.to_vec());
        }
        let mut out = Vec::with_capacity(self.value.len());
        collect_segments(self.value, self.tag.number, &mut out, 0)?;
        Ok(out)
    }
}

fn collect_segments(
    content: &[u8],
    number: u32,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), CryptoError> {
    if depth > MAX_DEPTH {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let mut dec = Decoder::new(content);
    while !dec.is_empty() {
        let seg = dec.read_tlv()?;
        if seg.tag.class != TagClass::Universal || seg.tag.number != number {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        if seg.tag.constructed {
            collect_segments(seg.value, number, out, depth + 1)?;
        } else {
            out.extend_from_slice(seg.value);
        }
    }
    Ok(())
}

impl Header {
    /// Parse the identifier and length octets at the start of `input`.
    pub fn parse(input: &[u8]) -> Result<Self, CryptoError> {
        let (tag, tag_len) = Tag::from_bytes(input)?;
        let rest = &input[tag_len..];
        let first = *rest.first().ok_or(CryptoError::DecodeAsn1Fail)?;
        if first < 0x80 {
            return Ok(Header {
                tag,
                header_len: tag_len + 1,
                content_len: Some(first as usize),
            });
        }
        if first == 0x80 {
            // indefinite form is only legal on constructed encodings
            if !tag.constructed {
                return Err(CryptoError::DecodeAsn1Fail);
            }
            return Ok(Header {
                tag,
                header_len: tag_len + 1,
                content_len: None,
            });
        }
        let num_bytes = (first & 0x7F) as usize;
        if num_bytes > 4 || rest.len() < 1 + num_bytes {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let length = rest[1..=num_bytes]
            .iter()
            .fold(0usize, |acc, &b| (acc << 8) | b as usize);
        Ok(Header {
            tag,
            header_len: tag_len + 1 + num_bytes,
            content_len: Some(length),
        })
    }
}

/// Total encoded length (header, content and any end-of-contents octets) of
/// the element starting at `input[0]`.
pub fn element_len(input: &[u8], depth: usize) -> Result<usize, CryptoError> {
    if depth > MAX_DEPTH {
        return Err(CryptoError::DecodeAsn1Fail);
    }
    let header = Header::parse(input)?;
    match header.content_len {
        Some(len) => {
            let end = header
                .header_len
                .checked_add(len)
                .ok_or(CryptoError::DecodeAsn1Fail)?;
            if end > input.len() {
                return Err(CryptoError::DecodeAsn1Fail);
            }
            Ok(end)
        }
        None => {
            let mut pos = header.header_len;
            loop {
                let rest = input.get(pos..).ok_or(CryptoError::DecodeAsn1Fail)?;
                if rest.len() >= 2 && rest[0] == tags::END_OF_CONTENTS && rest[1] == 0x00 {
                    return Ok(pos + 2);
                }
                if rest.is_empty() {
                    return Err(CryptoError::DecodeAsn1Fail);
                }
                pos += element_len(rest, depth + 1)?;
            }
        }
    }
}
