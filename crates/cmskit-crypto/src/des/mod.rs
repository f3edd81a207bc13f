//! TripleDES (DES-EDE3) block cipher with 24-byte keys.

use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use cmskit_types::CryptoError;

use crate::provider::BlockCipher;

/// DES block size in bytes.
pub const DES_BLOCK_SIZE: usize = 8;

/// Three-key TripleDES key length in bytes.
pub const TDES_KEY_LEN: usize = 24;

/// An expanded three-key TripleDES key.
pub struct TdesKey {
    inner: des::TdesEde3,
}

impl TdesKey {
    /// Create a key from 24 raw bytes. Parity bits are ignored.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let inner =
            des::TdesEde3::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
                expected: TDES_KEY_LEN,
                got: key.len(),
            })?;
        Ok(Self { inner })
    }
}

impl BlockCipher for TdesKey {
    fn block_size(&self) -> usize {
        DES_BLOCK_SIZE
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != DES_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        self.inner.encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != DES_BLOCK_SIZE {
            return Err(CryptoError::InvalidArg);
        }
        self.inner.decrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }
}

/// Set odd parity on every byte of a DES key, as RFC 3217 requires before
/// wrapping.
pub fn set_odd_parity(key: &mut [u8]) {
    for b in key.iter_mut() {
        let ones = (*b & 0xFE).count_ones();
        *b = (*b & 0xFE) | u8::from(ones % 2 == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tdes_degenerates_to_des() {
        // with K1 = K2 = K3, EDE3 equals single DES; FIPS 81 style vector
        let k = hex::decode("0123456789abcdef").unwrap();
        let key: Vec<u8> = k.iter().chain(&k).chain(&k).copied().collect();
        let cipher = TdesKey::new(&key).unwrap();
        let mut block = hex::decode("4e6f772069732074").unwrap();
        cipher.encrypt_block(&mut block).unwrap();
        assert_eq!(hex::encode(&block), "3fa40e8a984d4815");
        cipher.decrypt_block(&mut block).unwrap();
        assert_eq!(&block, b"Now is t");
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(TdesKey::new(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_odd_parity() {
        let mut key = [0x00u8, 0x01, 0xFE, 0x7F];
        set_odd_parity(&mut key);
        assert_eq!(key, [0x01, 0x01, 0xFE, 0x7F]);
        for b in key {
            assert_eq!(b.count_ones() % 2, 1);
        }
    }
}
