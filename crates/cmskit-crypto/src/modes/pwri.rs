//! Password-based key wrap (RFC 3211 section 2.3).
//!
//! The formatted CEK block is CBC-encrypted twice with one continuous chain:
//! the second pass starts from the last ciphertext block of the first.

use cmskit_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::cbc::{cbc_decrypt_raw, cbc_encrypt_raw};
use crate::provider::BlockCipher;
use crate::random::fill_random;

/// Length of the formatted key block for a CEK of `cek_len` bytes.
///
/// At least two KEK blocks, rounded up to a whole number of blocks.
pub fn wrapped_len(cek_len: usize, block_size: usize) -> usize {
    let needed = 4 + cek_len;
    let rounded = needed.div_ceil(block_size) * block_size;
    rounded.max(2 * block_size)
}

/// Wrap `cek` under `cipher` keyed with the password-derived KEK.
pub fn key_wrap(cipher: &dyn BlockCipher, iv: &[u8], cek: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if cek.len() < 3 || cek.len() > 255 {
        return Err(CryptoError::InvalidArg);
    }
    let bs = cipher.block_size();
    let total = wrapped_len(cek.len(), bs);

    let mut block = Zeroizing::new(vec![0u8; total]);
    block[0] = cek.len() as u8;
    for i in 0..3 {
        block[1 + i] = !cek[i];
    }
    block[4..4 + cek.len()].copy_from_slice(cek);
    fill_random(&mut block[4 + cek.len()..])?;

    cbc_encrypt_raw(cipher, iv, &mut block)?;
    let chain = block[total - bs..].to_vec();
    cbc_encrypt_raw(cipher, &chain, &mut block)?;
    Ok(block.to_vec())
}

/// Unwrap a CEK. A failed check-byte comparison is a wrong password.
pub fn key_unwrap(
    cipher: &dyn BlockCipher,
    iv: &[u8],
    wrapped: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let bs = cipher.block_size();
    if wrapped.len() < 2 * bs || wrapped.len() % bs != 0 {
        return Err(CryptoError::InvalidWrappedLength(wrapped.len()));
    }

    // Undo the outer pass on blocks 1..n using block 0 as the chain value,
    // which recovers the last inner ciphertext block needed for block 0.
    let mut tail = Zeroizing::new(wrapped[bs..].to_vec());
    cbc_decrypt_raw(cipher, &wrapped[..bs], &mut tail)?;
    let mut head = Zeroizing::new(wrapped[..bs].to_vec());
    let last = tail[tail.len() - bs..].to_vec();
    cbc_decrypt_raw(cipher, &last, &mut head)?;

    let mut inner = Zeroizing::new(Vec::with_capacity(wrapped.len()));
    inner.extend_from_slice(&head);
    inner.extend_from_slice(&tail);
    cbc_decrypt_raw(cipher, iv, &mut inner)?;

    let len = inner[0] as usize;
    if len < 3 || 4 + len > inner.len() {
        return Err(CryptoError::KeyUnwrapFail);
    }
    let check = [!inner[1], !inner[2], !inner[3]];
    if check[..].ct_eq(&inner[4..7]).unwrap_u8() != 1 {
        return Err(CryptoError::KeyUnwrapFail);
    }
    Ok(Zeroizing::new(inner[4..4 + len].to_vec()))
}
