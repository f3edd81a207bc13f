//! AES Key Wrap (RFC 3394).

use cmskit_types::CryptoError;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::aes::AesKey;
use crate::provider::BlockCipher;

/// Default initial value from RFC 3394 section 2.2.3.1.
pub const DEFAULT_IV: [u8; 8] = [0xA6; 8];

/// Wrap a key using AES Key Wrap (RFC 3394).
///
/// `plaintext_key` must be a multiple of 8 bytes and at least 16 bytes long.
pub fn key_wrap(kek: &[u8], plaintext_key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if plaintext_key.len() < 16 || plaintext_key.len() % 8 != 0 {
        return Err(CryptoError::InvalidArg);
    }
    let cipher = AesKey::new(kek)?;
    let n = plaintext_key.len() / 8;

    let mut a = DEFAULT_IV;
    let mut r = Zeroizing::new(plaintext_key.to_vec());
    let mut b = [0u8; 16];
    for j in 0..6u64 {
        for i in 0..n {
            b[..8].copy_from_slice(&a);
            b[8..].copy_from_slice(&r[i * 8..(i + 1) * 8]);
            cipher.encrypt_block(&mut b)?;
            let t = (n as u64) * j + (i as u64) + 1;
            for (x, y) in a.iter_mut().zip(b[..8].iter().zip(t.to_be_bytes())) {
                *x = y.0 ^ y.1;
            }
            r[i * 8..(i + 1) * 8].copy_from_slice(&b[8..]);
        }
    }

    let mut out = Vec::with_capacity(8 + r.len());
    out.extend_from_slice(&a);
    out.extend_from_slice(&r);
    Ok(out)
}

/// Unwrap a key using AES Key Wrap (RFC 3394).
///
/// Fails with [`CryptoError::KeyUnwrapFail`] when the integrity check value
/// does not match, which is what a wrong KEK produces.
pub fn key_unwrap(kek: &[u8], wrapped_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if wrapped_key.len() < 24 || wrapped_key.len() % 8 != 0 {
        return Err(CryptoError::InvalidWrappedLength(wrapped_key.len()));
    }
    let cipher = AesKey::new(kek)?;
    let n = wrapped_key.len() / 8 - 1;

    let mut a = [0u8; 8];
    a.copy_from_slice(&wrapped_key[..8]);
    let mut r = Zeroizing::new(wrapped_key[8..].to_vec());
    let mut b = Zeroizing::new([0u8; 16]);
    for j in (0..6u64).rev() {
        for i in (0..n).rev() {
            let t = (n as u64) * j + (i as u64) + 1;
            for (x, y) in b[..8].iter_mut().zip(a.iter().zip(t.to_be_bytes())) {
                *x = y.0 ^ y.1;
            }
            b[8..].copy_from_slice(&r[i * 8..(i + 1) * 8]);
            cipher.decrypt_block(&mut b[..])?;
            a.copy_from_slice(&b[..8]);
            r[i * 8..(i + 1) * 8].copy_from_slice(&b[8..]);
        }
    }

    if a[..].ct_eq(&DEFAULT_IV[..]).unwrap_u8() != 1 {
        return Err(CryptoError::KeyUnwrapFail);
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // RFC 3394 section 4.1: 128 bits of key data with a 128-bit KEK
    #[test]
    fn test_rfc3394_4_1() {
        let kek = hex::decode("000102030405060708090A0B0C0D0E0F").unwrap();
        let key = hex::decode("00112233445566778899AABBCCDDEEFF").unwrap();
        let wrapped = key_wrap(&kek, &key).unwrap();
        assert_eq!(
            hex::encode_upper(&wrapped),
            "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5"
        );
        assert_eq!(key_unwrap(&kek, &wrapped).unwrap().as_slice(), &key[..]);
    }

    // RFC 3394 section 4.6: 256 bits of key data with a 256-bit KEK
    #[test]
    fn test_rfc3394_4_6() {
        let kek =
            hex::decode("000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F")
                .unwrap();
        let key =
            hex::decode("00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F")
                .unwrap();
        let wrapped = key_wrap(&kek, &key).unwrap();
        assert_eq!(
            hex::encode_upper(&wrapped),
            "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21"
        );
        assert_eq!(key_unwrap(&kek, &wrapped).unwrap().as_slice(), &key[..]);
    }

    #[test]
    fn test_wrong_kek_is_integrity_failure() {
        let wrapped = key_wrap(&[1u8; 16], &[2u8; 16]).unwrap();
        assert!(matches!(
            key_unwrap(&[3u8; 16], &wrapped),
            Err(CryptoError::KeyUnwrapFail)
        ));
    }

    #[test]
    fn test_bad_lengths() {
        assert!(key_wrap(&[0u8; 16], &[0u8; 8]).is_err());
        assert!(key_wrap(&[0u8; 16], &[0u8; 20]).is_err());
        assert!(matches!(
            key_unwrap(&[0u8; 16], &[0u8; 30]),
            Err(CryptoError::InvalidWrappedLength(30))
        ));
    }

    proptest! {
        #[test]
        fn prop_wrap_roundtrip(
            kek_len in prop::sample::select(vec![16usize, 24, 32]),
            cek_len in prop::sample::select(vec![16usize, 24, 32]),
            seed in any::<u8>(),
        ) {
            let kek: Vec<u8> = (0..kek_len).map(|i| seed.wrapping_add(i as u8)).collect();
            let cek: Vec<u8> = (0..cek_len).map(|i| seed.wrapping_mul(i as u8 | 1)).collect();
            let wrapped = key_wrap(&kek, &cek).unwrap();
            prop_assert_eq!(wrapped.len(), cek_len + 8);
            let unwrapped = key_unwrap(&kek, &wrapped).unwrap();
            prop_assert_eq!(unwrapped.as_slice(), &cek[..]);
        }
    }
}
