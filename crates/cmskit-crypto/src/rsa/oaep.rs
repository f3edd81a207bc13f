//! EME-OAEP encoding (RFC 8017 section 7.1.1 / 7.1.2).
//!
//! Labels are arbitrary octet strings, as CMS `pSpecified` parameters allow.

use cmskit_types::{CryptoError, HashAlgId};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroizing;

use super::OaepParams;
use crate::hash::{digest, Hasher};
use crate::random::fill_random;

/// MGF1 mask generation over `hash`.
pub(super) fn mgf1(hash: HashAlgId, seed: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + hash.output_len());
    let mut hasher = Hasher::new(hash);
    let mut counter = 0u32;
    while out.len() < len {
        hasher.absorb(seed);
        hasher.absorb(&counter.to_be_bytes());
        out.extend_from_slice(&hasher.finalize_vec());
        counter += 1;
    }
    out.truncate(len);
    out
}

fn xor_in_place(target: &mut [u8], mask: &[u8]) {
    for (t, m) in target.iter_mut().zip(mask) {
        *t ^= m;
    }
}

/// Encode `msg` into a `k`-byte encoded message.
pub(super) fn encode(params: &OaepParams, msg: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let h_len = params.hash.output_len();
    if k < 2 * h_len + 2 || msg.len() > k - 2 * h_len - 2 {
        return Err(CryptoError::InputOverflow);
    }

    let db_len = k - h_len - 1;
    let mut db = Zeroizing::new(vec![0u8; db_len]);
    db[..h_len].copy_from_slice(&digest(params.hash, &params.label));
    db[db_len - msg.len() - 1] = 0x01;
    db[db_len - msg.len()..].copy_from_slice(msg);

    let mut seed = Zeroizing::new(vec![0u8; h_len]);
    fill_random(&mut seed)?;

    xor_in_place(&mut db, &mgf1(params.mgf_hash, &seed, db_len));
    xor_in_place(&mut seed, &mgf1(params.mgf_hash, &db, h_len));

    let mut em = Zeroizing::new(Vec::with_capacity(k));
    em.push(0x00);
    em.extend_from_slice(&seed);
    em.extend_from_slice(&db);
    Ok(em)
}

/// Decode a `k`-byte encoded message. All failures are reported alike.
pub(super) fn decode(params: &OaepParams, em: &[u8], k: usize) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let h_len = params.hash.output_len();
    if k < 2 * h_len + 2 || em.len() != k {
        return Err(CryptoError::RsaDecryptFail);
    }

    let mut seed = Zeroizing::new(em[1..1 + h_len].to_vec());
    let mut db = Zeroizing::new(em[1 + h_len..].to_vec());
    xor_in_place(&mut seed, &mgf1(params.mgf_hash, &db, h_len));
    let mask = mgf1(params.mgf_hash, &seed, db.len());
    xor_in_place(&mut db, &mask);

    let l_hash = digest(params.hash, &params.label);
    let mut good = em[0].ct_eq(&0u8) & db[..h_len].ct_eq(&l_hash[..]);

    let mut looking = Choice::from(1u8);
    let mut invalid = Choice::from(0u8);
    let mut index = 0u32;
    for (i, b) in db[h_len..].iter().enumerate() {
        let is_zero = b.ct_eq(&0u8);
        let is_one = b.ct_eq(&1u8);
        index.conditional_assign(&(i as u32), looking & is_one);
        invalid |= looking & !is_zero & !is_one;
        looking &= !is_one;
    }
    good &= !looking & !invalid;

    if !bool::from(good) {
        return Err(CryptoError::RsaDecryptFail);
    }
    let start = h_len + index as usize + 1;
    Ok(Zeroizing::new(db[start..].to_vec()))
}
