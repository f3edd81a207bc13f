//! CBC (Cipher Block Chaining) mode of operation.

use cmskit_types::{CipherAlgId, CryptoError};
use subtle::ConstantTimeEq;

use super::block_cipher;
use crate::provider::BlockCipher;

/// Encrypt block-aligned data in CBC mode without padding.
pub fn cbc_encrypt_raw(
    cipher: &dyn BlockCipher,
    iv: &[u8],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let bs = cipher.block_size();
    if iv.len() != bs {
        return Err(CryptoError::InvalidIvLength);
    }
    if data.len() % bs != 0 {
        return Err(CryptoError::InvalidArg);
    }
    let mut prev = iv.to_vec();
    for chunk in data.chunks_mut(bs) {
        for (c, p) in chunk.iter_mut().zip(&prev) {
            *c ^= p;
        }
        cipher.encrypt_block(chunk)?;
        prev.copy_from_slice(chunk);
    }
    Ok(())
}

/// Decrypt block-aligned data in CBC mode without removing padding.
pub fn cbc_decrypt_raw(
    cipher: &dyn BlockCipher,
    iv: &[u8],
    data: &mut [u8],
) -> Result<(), CryptoError> {
    let bs = cipher.block_size();
    if iv.len() != bs {
        return Err(CryptoError::InvalidIvLength);
    }
    if data.len() % bs != 0 {
        return Err(CryptoError::InvalidArg);
    }
    let mut prev = iv.to_vec();
    let mut saved = vec![0u8; bs];
    for chunk in data.chunks_mut(bs) {
        saved.copy_from_slice(chunk);
        cipher.decrypt_block(chunk)?;
        for (c, p) in chunk.iter_mut().zip(&prev) {
            *c ^= p;
        }
        std::mem::swap(&mut prev, &mut saved);
    }
    Ok(())
}

/// Encrypt data using CBC mode and PKCS#7 padding.
pub fn cbc_encrypt(
    cipher: &dyn BlockCipher,
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let bs = cipher.block_size();
    let pad_len = bs - (plaintext.len() % bs);
    let mut data = Vec::with_capacity(plaintext.len() + pad_len);
    data.extend_from_slice(plaintext);
    data.resize(plaintext.len() + pad_len, pad_len as u8);
    cbc_encrypt_raw(cipher, iv, &mut data)?;
    Ok(data)
}

/// Decrypt data using CBC mode and remove PKCS#7 padding.
pub fn cbc_decrypt(
    cipher: &dyn BlockCipher,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let bs = cipher.block_size();
    if ciphertext.is_empty() {
        return Err(CryptoError::InvalidArg);
    }
    let mut output = ciphertext.to_vec();
    cbc_decrypt_raw(cipher, iv, &mut output)?;

    // PKCS#7 unpad (constant-time check)
    let pad_val = *output.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad_val == 0 || pad_val > bs {
        return Err(CryptoError::InvalidPadding);
    }
    let pad_byte = pad_val as u8;
    let mut valid = 1u8;
    for &b in &output[output.len() - pad_val..] {
        valid &= b.ct_eq(&pad_byte).unwrap_u8();
    }
    if valid != 1 {
        return Err(CryptoError::InvalidPadding);
    }
    output.truncate(output.len() - pad_val);
    Ok(output)
}

/// Content encryption: `alg` in CBC mode with PKCS#7 padding.
pub fn encrypt_content(
    alg: CipherAlgId,
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = block_cipher(alg, key)?;
    cbc_encrypt(cipher.as_ref(), iv, plaintext)
}

/// Content decryption: `alg` in CBC mode with PKCS#7 padding.
pub fn decrypt_content(
    alg: CipherAlgId,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = block_cipher(alg, key)?;
    cbc_decrypt(cipher.as_ref(), iv, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aes::AesKey;
    use crate::des::TdesKey;

    fn nist_key() -> AesKey {
        AesKey::new(&hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap()).unwrap()
    }

    fn nist_iv() -> Vec<u8> {
        hex::decode("000102030405060708090a0b0c0d0e0f").unwrap()
    }

    // NIST SP 800-38A F.2.1
    #[test]
    fn test_cbc_aes128_nist_vector() {
        let pt = hex::decode(
            "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e5130c81c46a35ce411e5fbc1191a0a52eff69f2445df4f9b17ad2b417be66c3710",
        )
        .unwrap();
        let expected = "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b273bed6b8e3c1743b7116e69e222295163ff1caa1681fac09120eca307586e1a7";

        let mut raw = pt.clone();
        cbc_encrypt_raw(&nist_key(), &nist_iv(), &mut raw).unwrap();
        assert_eq!(hex::encode(&raw), expected);

        cbc_decrypt_raw(&nist_key(), &nist_iv(), &mut raw).unwrap();
        assert_eq!(raw, pt);

        let padded = cbc_encrypt(&nist_key(), &nist_iv(), &pt).unwrap();
        assert_eq!(hex::encode(&padded[..64]), expected);
        assert_eq!(padded.len(), 80);
    }

    #[test]
    fn test_cbc_padding_short() {
        let ct = cbc_encrypt(&nist_key(), &nist_iv(), b"Hello, World!").unwrap();
        assert_eq!(ct.len(), 16);
        let pt = cbc_decrypt(&nist_key(), &nist_iv(), &ct).unwrap();
        assert_eq!(pt, b"Hello, World!");
    }

    #[test]
    fn test_cbc_empty() {
        let ct = cbc_encrypt(&nist_key(), &nist_iv(), b"").unwrap();
        assert_eq!(ct.len(), 16);
        assert!(cbc_decrypt(&nist_key(), &nist_iv(), &ct).unwrap().is_empty());
    }

    #[test]
    fn test_cbc_invalid_iv() {
        assert!(matches!(
            cbc_encrypt(&nist_key(), &[0u8; 15], b"test"),
            Err(CryptoError::InvalidIvLength)
        ));
    }

    #[test]
    fn test_cbc_bad_padding() {
        let mut ct = cbc_encrypt(&nist_key(), &nist_iv(), b"abc").unwrap();
        // corrupt the padding through the IV-equivalent of the last block
        let mut iv = nist_iv();
        iv[15] ^= 0x01;
        assert!(cbc_decrypt(&nist_key(), &iv, &ct).is_err());
        ct.truncate(8);
        assert!(cbc_decrypt(&nist_key(), &nist_iv(), &ct).is_err());
    }

    #[test]
    fn test_tdes_cbc_roundtrip() {
        let key = TdesKey::new(&[0x11u8; 24]).unwrap();
        let iv = [0x22u8; 8];
        let ct = cbc_encrypt(&key, &iv, b"tripledes content").unwrap();
        assert_eq!(ct.len(), 24);
        assert_eq!(cbc_decrypt(&key, &iv, &ct).unwrap(), b"tripledes content");
    }

    #[test]
    fn test_content_helpers_check_key_length() {
        let iv = [0u8; 16];
        assert!(encrypt_content(CipherAlgId::Aes256Cbc, &[0u8; 16], &iv, b"x").is_err());
        let ct = encrypt_content(CipherAlgId::Aes192Cbc, &[7u8; 24], &iv, b"x").unwrap();
        assert_eq!(
            decrypt_content(CipherAlgId::Aes192Cbc, &[7u8; 24], &iv, &ct).unwrap(),
            b"x"
        );
    }
}
