//! Block cipher modes of operation.
//!
//! CBC (with and without PKCS#7 padding) plus the three key-wrap constructions
//! used by CMS recipients: AES Key Wrap (RFC 3394), TripleDES Key Wrap
//! (RFC 3217) and the password-based wrap of RFC 3211. Each mode operates on
//! top of a block cipher through the [`BlockCipher`](crate::provider::BlockCipher)
//! trait.

pub mod cbc;
pub mod pwri;
pub mod tdes_wrap;
pub mod wrap;

use cmskit_types::{CipherAlgId, CryptoError};

use crate::aes::AesKey;
use crate::des::TdesKey;
use crate::provider::BlockCipher;

/// Instantiate the block cipher behind a content-encryption algorithm.
pub fn block_cipher(alg: CipherAlgId, key: &[u8]) -> Result<Box<dyn BlockCipher>, CryptoError> {
    if key.len() != alg.key_len() {
        return Err(CryptoError::InvalidKeyLength {
            expected: alg.key_len(),
            got: key.len(),
        });
    }
    Ok(match alg {
        CipherAlgId::TdesEde3Cbc => Box::new(TdesKey::new(key)?),
        _ => Box::new(AesKey::new(key)?),
    })
}
