//! TripleDES Key Wrap (RFC 3217 section 3).

use cmskit_types::{CryptoError, HashAlgId};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::cbc::{cbc_decrypt_raw, cbc_encrypt_raw};
use crate::des::{set_odd_parity, TdesKey, TDES_KEY_LEN};
use crate::hash::digest;
use crate::random::fill_random;

/// Fixed IV of the second encryption pass.
pub const SECOND_PASS_IV: [u8; 8] = [0x4A, 0xDD, 0xA2, 0x2C, 0x79, 0xE8, 0x21, 0x05];

/// Length of every wrapped TripleDES key.
pub const WRAPPED_LEN: usize = 40;

fn icv(cek: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest(HashAlgId::Sha1, cek)[..8]);
    out
}

/// Wrap a 24-byte TripleDES CEK under a 24-byte TripleDES KEK.
pub fn key_wrap(kek: &[u8], cek: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut iv = [0u8; 8];
    fill_random(&mut iv)?;
    key_wrap_with_iv(kek, cek, &iv)
}

/// Wrap with a caller-chosen first-pass IV.
///
/// The CEK gets DES odd parity before the checksum is taken, so unwrapping
/// returns the parity-adjusted key.
pub fn key_wrap_with_iv(kek: &[u8], cek: &[u8], iv: &[u8; 8]) -> Result<Vec<u8>, CryptoError> {
    if cek.len() != TDES_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: TDES_KEY_LEN,
            got: cek.len(),
        });
    }
    let cipher = TdesKey::new(kek)?;
    let mut key = Zeroizing::new(cek.to_vec());
    set_odd_parity(&mut key);

    let mut temp = Zeroizing::new(Vec::with_capacity(WRAPPED_LEN));
    temp.extend_from_slice(iv);
    temp.extend_from_slice(&key);
    temp.extend_from_slice(&icv(&key));
    cbc_encrypt_raw(&cipher, iv, &mut temp[8..])?;

    temp.reverse();
    cbc_encrypt_raw(&cipher, &SECOND_PASS_IV, &mut temp)?;
    Ok(temp.to_vec())
}

/// Unwrap a TripleDES CEK. The wrapped key must be exactly 40 bytes.
pub fn key_unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped.len() != WRAPPED_LEN {
        return Err(CryptoError::InvalidWrappedLength(wrapped.len()));
    }
    let cipher = TdesKey::new(kek)?;

    let mut temp = Zeroizing::new(wrapped.to_vec());
    cbc_decrypt_raw(&cipher, &SECOND_PASS_IV, &mut temp)?;
    temp.reverse();

    let (iv, body) = temp.split_at_mut(8);
    cbc_decrypt_raw(&cipher, iv, body)?;
    let (cek, check) = body.split_at(TDES_KEY_LEN);
    if icv(cek)[..].ct_eq(check).unwrap_u8() != 1 {
        return Err(CryptoError::KeyUnwrapFail);
    }
    Ok(Zeroizing::new(cek.to_vec()))
}
