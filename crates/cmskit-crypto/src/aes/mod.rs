//! AES (Advanced Encryption Standard) block cipher.
//!
//! Provides AES-128, AES-192, and AES-256 single-block operations on top of
//! the RustCrypto `aes` crate; for modes of operation (CBC, key wrap) see the
//! [`modes`](crate::modes) module.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use cmskit_types::CryptoError;

use crate::provider::BlockCipher;

/// AES block size in bytes (128 bits).
pub const AES_BLOCK_SIZE: usize = 16;

enum Inner {
    Aes128(aes::Aes128),
    Aes192(aes::Aes192),
    Aes256(aes::Aes256),
}

/// An AES key with expanded round keys.
pub struct AesKey {
    inner: Inner,
}

impl AesKey {
    /// Create a new AES key from raw bytes.
    ///
    /// Accepts 16, 24, or 32-byte keys for AES-128, AES-192, and AES-256.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let bad = |_| CryptoError::InvalidKeyLength {
            expected: 16,
            got: key.len(),
        };
        let inner = match key.len() {
            16 => Inner::Aes128(aes::Aes128::new_from_slice(key).map_err(bad)?),
            24 => Inner::Aes192(aes::Aes192::new_from_slice(key).map_err(bad)?),
            32 => Inner::Aes256(aes::Aes256::new_from_slice(key).map_err(bad)?),
            got => return Err(CryptoError::InvalidKeyLength { expected: 16, got }),
        };
        Ok(Self { inner })
    }

    /// Return the key length in bytes.
    pub fn key_len(&self) -> usize {
        match self.inner {
            Inner::Aes128(_) => 16,
            Inner::Aes192(_) => 24,
            Inner::Aes256(_) => 32,
        }
    }
}

impl BlockCipher for AesKey {
    fn block_size(&self) -> usize {
        AES_BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        let b = GenericArray::from_mut_slice(block);
        match &self.inner {
            Inner::Aes128(c) => c.encrypt_block(b),
            Inner::Aes192(c) => c.encrypt_block(b),
            Inner::Aes256(c) => c.encrypt_block(b),
        }
        Ok(())
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != AES_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        let b = GenericArray::from_mut_slice(block);
        match &self.inner {
            Inner::Aes128(c) => c.decrypt_block(b),
            Inner::Aes192(c) => c.decrypt_block(b),
            Inner::Aes256(c) => c.decrypt_block(b),
        }
        Ok(())
    }
}
