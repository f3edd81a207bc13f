/// Hash algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha512_224,
    Sha512_256,
}

impl HashAlgId {
    /// Digest output length in bytes.
    pub fn output_len(self) -> usize {
        match self {
            HashAlgId::Md5 => 16,
            HashAlgId::Sha1 => 20,
            HashAlgId::Sha224 | HashAlgId::Sha512_224 => 28,
            HashAlgId::Sha256 | HashAlgId::Sha512_256 => 32,
            HashAlgId::Sha384 => 48,
            HashAlgId::Sha512 => 64,
        }
    }

    /// Lowercase name, e.g. `sha256` or `sha512/224`.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgId::Md5 => "md5",
            HashAlgId::Sha1 => "sha1",
            HashAlgId::Sha224 => "sha224",
            HashAlgId::Sha256 => "sha256",
            HashAlgId::Sha384 => "sha384",
            HashAlgId::Sha512 => "sha512",
            HashAlgId::Sha512_224 => "sha512/224",
            HashAlgId::Sha512_256 => "sha512/256",
        }
    }

    /// Parse a hash name as accepted by [`HashAlgId::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        let alg = match name.to_ascii_lowercase().as_str() {
            "md5" => HashAlgId::Md5,
            "sha1" => HashAlgId::Sha1,
            "sha224" => HashAlgId::Sha224,
            "sha256" => HashAlgId::Sha256,
            "sha384" => HashAlgId::Sha384,
            "sha512" => HashAlgId::Sha512,
            "sha512/224" => HashAlgId::Sha512_224,
            "sha512/256" => HashAlgId::Sha512_256,
            _ => return None,
        };
        Some(alg)
    }
}

/// Content-encryption cipher identifiers (CBC with PKCS#7 padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    TdesEde3Cbc,
}

impl CipherAlgId {
    /// Key length in bytes.
    pub fn key_len(self) -> usize {
        match self {
            CipherAlgId::Aes128Cbc => 16,
            CipherAlgId::Aes192Cbc => 24,
            CipherAlgId::Aes256Cbc => 32,
            CipherAlgId::TdesEde3Cbc => 24,
        }
    }

    /// Block length in bytes, which is also the IV length.
    pub fn block_size(self) -> usize {
        match self {
            CipherAlgId::TdesEde3Cbc => 8,
            _ => 16,
        }
    }
}

/// Key-wrap algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyWrapAlgId {
    Aes128Wrap,
    Aes192Wrap,
    Aes256Wrap,
    TdesWrap,
}

impl KeyWrapAlgId {
    /// Key-encryption key length in bytes.
    pub fn kek_len(self) -> usize {
        match self {
            KeyWrapAlgId::Aes128Wrap => 16,
            KeyWrapAlgId::Aes192Wrap | KeyWrapAlgId::TdesWrap => 24,
            KeyWrapAlgId::Aes256Wrap => 32,
        }
    }

    /// Pick the AES wrap variant matching a KEK length.
    pub fn aes_for_kek_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(KeyWrapAlgId::Aes128Wrap),
            24 => Some(KeyWrapAlgId::Aes192Wrap),
            32 => Some(KeyWrapAlgId::Aes256Wrap),
            _ => None,
        }
    }
}

/// Asymmetric (public key) algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkeyAlgId {
    Rsa,
    Ecdsa,
}

/// Elliptic curve identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EccCurveId {
    NistP256,
    NistP384,
}

impl EccCurveId {
    /// Field element length in bytes.
    pub fn field_len(self) -> usize {
        match self {
            EccCurveId::NistP256 => 32,
            EccCurveId::NistP384 => 48,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_names_roundtrip() {
        for alg in [
            HashAlgId::Md5,
            HashAlgId::Sha1,
            HashAlgId::Sha224,
            HashAlgId::Sha256,
            HashAlgId::Sha384,
            HashAlgId::Sha512,
            HashAlgId::Sha512_224,
            HashAlgId::Sha512_256,
        ] {
            assert_eq!(HashAlgId::from_name(alg.name()), Some(alg));
        }
        assert_eq!(HashAlgId::from_name("SHA256"), Some(HashAlgId::Sha256));
        assert_eq!(HashAlgId::from_name("md2"), None);
    }

    #[test]
    fn test_cipher_sizes() {
        assert_eq!(CipherAlgId::Aes256Cbc.key_len(), 32);
        assert_eq!(CipherAlgId::TdesEde3Cbc.block_size(), 8);
        assert_eq!(CipherAlgId::Aes128Cbc.block_size(), 16);
    }

    #[test]
    fn test_wrap_for_kek_len() {
        assert_eq!(
            KeyWrapAlgId::aes_for_kek_len(24),
            Some(KeyWrapAlgId::Aes192Wrap)
        );
        assert_eq!(KeyWrapAlgId::aes_for_kek_len(20), None);
        assert_eq!(KeyWrapAlgId::TdesWrap.kek_len(), 24);
    }
}
