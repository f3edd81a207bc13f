//! PBKDF2 (RFC 8018 section 5.2) with an HMAC-SHA PRF.
//!
//! Used by password recipients to turn a password into a key-encryption key.

use cmskit_types::{CryptoError, HashAlgId};

use crate::provider::Kdf;

/// PBKDF2 parameterised by its PRF hash and iteration count.
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2 {
    prf: HashAlgId,
    iterations: u32,
}

impl Pbkdf2 {
    /// Create a PBKDF2 instance. MD5 is not accepted as a PRF.
    pub fn new(prf: HashAlgId, iterations: u32) -> Result<Self, CryptoError> {
        if iterations == 0 || prf == HashAlgId::Md5 {
            return Err(CryptoError::InvalidArg);
        }
        Ok(Self { prf, iterations })
    }

    pub fn prf(&self) -> HashAlgId {
        self.prf
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

/// The salt travels as the context string.
impl Kdf for Pbkdf2 {
    fn derive(&self, password: &[u8], salt: &[u8], output: &mut [u8]) -> Result<(), CryptoError> {
        pbkdf2_into(self.prf, password, salt, self.iterations, output)
    }
}

/// Derive `dk_len` bytes from `password`.
pub fn pbkdf2(
    prf: HashAlgId,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    dk_len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let mut out = vec![0u8; dk_len];
    pbkdf2_into(prf, password, salt, iterations, &mut out)?;
    Ok(out)
}

fn pbkdf2_into(
    prf: HashAlgId,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
) -> Result<(), CryptoError> {
    if out.is_empty() || iterations == 0 {
        return Err(CryptoError::InvalidArg);
    }
    match prf {
        HashAlgId::Md5 => return Err(CryptoError::NotSupported),
        HashAlgId::Sha1 => ::pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, iterations, out),
        HashAlgId::Sha224 => ::pbkdf2::pbkdf2_hmac::<sha2::Sha224>(password, salt, iterations, out),
        HashAlgId::Sha256 => ::pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, out),
        HashAlgId::Sha384 => ::pbkdf2::pbkdf2_hmac::<sha2::Sha384>(password, salt, iterations, out),
        HashAlgId::Sha512 => ::pbkdf2::pbkdf2_hmac::<sha2::Sha512>(password, salt, iterations, out),
        HashAlgId::Sha512_224 => {
            ::pbkdf2::pbkdf2_hmac::<sha2::Sha512_224>(password, salt, iterations, out)
        }
        HashAlgId::Sha512_256 => {
            ::pbkdf2::pbkdf2_hmac::<sha2::Sha512_256>(password, salt, iterations, out)
        }
    }
    Ok(())
}
