//! ASN.1 tag parsing and encoding.

use super::{Tag, TagClass};
use cmskit_types::CryptoError;

impl TagClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0x00,
            TagClass::Application => 0x40,
            TagClass::ContextSpecific => 0x80,
            TagClass::Private => 0xC0,
        }
    }
}

impl Tag {
    /// A universal-class tag.
    pub const fn universal(number: u32, constructed: bool) -> Self {
        Tag {
            class: TagClass::Universal,
            constructed,
            number,
        }
    }

    /// A context-specific tag (`[number]`).
    pub const fn context(number: u32, constructed: bool) -> Self {
        Tag {
            class: TagClass::ContextSpecific,
            constructed,
            number,
        }
    }

    /// Universal SEQUENCE.
    pub const SEQUENCE: Tag = Tag::universal(0x10, true);
    /// Universal SET.
    pub const SET: Tag = Tag::universal(0x11, true);
    /// Universal OCTET STRING (primitive).
    pub const OCTET_STRING: Tag = Tag::universal(0x04, false);
    /// Universal OBJECT IDENTIFIER.
    pub const OID: Tag = Tag::universal(0x06, false);
    /// Universal INTEGER.
    pub const INTEGER: Tag = Tag::universal(0x02, false);

    /// True for a universal tag with the given number, either form.
    pub fn is_universal(&self, number: u32) -> bool {
        self.class == TagClass::Universal && self.number == number
    }

    /// True for a context-specific tag with the given number, either form.
    pub fn is_context(&self, number: u32) -> bool {
        self.class == TagClass::ContextSpecific && self.number == number
    }

    /// Same class and number with a different constructed bit.
    pub fn with_constructed(self, constructed: bool) -> Self {
        Tag {
            constructed,
            ..self
        }
    }

    /// Parse a tag from the first bytes of `input`.
    /// Returns the tag and number of bytes consumed.
    pub fn from_bytes(input: &[u8]) -> Result<(Self, usize), CryptoError> {
        let first = *input.first().ok_or(CryptoError::NullInput)?;
        let class = TagClass::from_bits(first >> 6);
        let constructed = (first & 0x20) != 0;

        let low_bits = first & 0x1F;
        if low_bits < 0x1F {
            return Ok((
                Tag {
                    class,
                    constructed,
                    number: low_bits as u32,
                },
                1,
            ));
        }

        // high tag number form, base-128 with continuation bits
        let mut number: u32 = 0;
        let mut i = 1;
        loop {
            let byte = *input.get(i).ok_or(CryptoError::DecodeAsn1Fail)?;
            if number > (u32::MAX >> 7) {
                return Err(CryptoError::DecodeAsn1Fail);
            }
            number = (number << 7) | (byte & 0x7F) as u32;
            i += 1;
            if (byte & 0x80) == 0 {
                break;
            }
        }
        Ok((
            Tag {
                class,
                constructed,
                number,
            },
            i,
        ))
    }

    /// Encode this tag to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let lead = self.class.bits() | if self.constructed { 0x20 } else { 0x00 };
        if self.number < 0x1F {
            return vec![lead | self.number as u8];
        }
        let mut groups = Vec::new();
        let mut num = self.number;
        while num > 0 {
            groups.push((num & 0x7F) as u8);
            num >>= 7;
        }
        let mut out = vec![lead | 0x1F];
        let last = groups.len() - 1;
        for (i, g) in groups.iter().rev().enumerate() {
            out.push(if i < last { g | 0x80 } else { *g });
        }
        out
    }
}
