//! Shared OID-to-algorithm mapping helpers for the PKI crate.

use cmskit_types::{CipherAlgId, EccCurveId, HashAlgId, KeyWrapAlgId, PkeyAlgId};
use cmskit_utils::oid::{known, Oid};

/// Map an ECC curve OID to its `EccCurveId`.
///
/// Returns `None` for unrecognized OIDs; callers wrap in their own error type.
pub(crate) fn oid_to_curve_id(oid: &Oid) -> Option<EccCurveId> {
    if *oid == known::prime256v1() {
        Some(EccCurveId::NistP256)
    } else if *oid == known::secp384r1() {
        Some(EccCurveId::NistP384)
    } else {
        None
    }
}

pub(crate) fn curve_id_to_oid(curve: EccCurveId) -> Oid {
    match curve {
        EccCurveId::NistP256 => known::prime256v1(),
        EccCurveId::NistP384 => known::secp384r1(),
    }
}

/// Named binary curves (sect*). Cofactor DH differs from standard DH there.
pub(crate) fn is_binary_curve(oid: &Oid) -> bool {
    *oid == known::sect163k1() || *oid == known::sect233k1() || *oid == known::sect283k1()
}

pub(crate) fn hash_to_oid(hash: HashAlgId) -> Oid {
    match hash {
        HashAlgId::Md5 => known::md5(),
        HashAlgId::Sha1 => known::sha1(),
        HashAlgId::Sha224 => known::sha224(),
        HashAlgId::Sha256 => known::sha256(),
        HashAlgId::Sha384 => known::sha384(),
        HashAlgId::Sha512 => known::sha512(),
        HashAlgId::Sha512_224 => known::sha512_224(),
        HashAlgId::Sha512_256 => known::sha512_256(),
    }
}

pub(crate) fn oid_to_hash(oid: &Oid) -> Option<HashAlgId> {
    [
        HashAlgId::Md5,
        HashAlgId::Sha1,
        HashAlgId::Sha224,
        HashAlgId::Sha256,
        HashAlgId::Sha384,
        HashAlgId::Sha512,
        HashAlgId::Sha512_224,
        HashAlgId::Sha512_256,
    ]
    .into_iter()
    .find(|h| hash_to_oid(*h) == *oid)
}

pub(crate) fn hmac_to_oid(hash: HashAlgId) -> Option<Oid> {
    Some(match hash {
        HashAlgId::Md5 => return None,
        HashAlgId::Sha1 => known::hmac_with_sha1(),
        HashAlgId::Sha224 => known::hmac_with_sha224(),
        HashAlgId::Sha256 => known::hmac_with_sha256(),
        HashAlgId::Sha384 => known::hmac_with_sha384(),
        HashAlgId::Sha512 => known::hmac_with_sha512(),
        HashAlgId::Sha512_224 => known::hmac_with_sha512_224(),
        HashAlgId::Sha512_256 => known::hmac_with_sha512_256(),
    })
}

pub(crate) fn oid_to_hmac(oid: &Oid) -> Option<HashAlgId> {
    [
        HashAlgId::Sha1,
        HashAlgId::Sha224,
        HashAlgId::Sha256,
        HashAlgId::Sha384,
        HashAlgId::Sha512,
        HashAlgId::Sha512_224,
        HashAlgId::Sha512_256,
    ]
    .into_iter()
    .find(|h| hmac_to_oid(*h).as_ref() == Some(oid))
}

/// Signature algorithm OID for a key type and digest.
pub(crate) fn signature_oid(pkey: PkeyAlgId, hash: HashAlgId) -> Option<Oid> {
    Some(match (pkey, hash) {
        (PkeyAlgId::Rsa, HashAlgId::Md5) => known::md5_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha1) => known::sha1_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha224) => known::sha224_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha256) => known::sha256_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha384) => known::sha384_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha512) => known::sha512_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha512_224) => known::sha512_224_with_rsa_encryption(),
        (PkeyAlgId::Rsa, HashAlgId::Sha512_256) => known::sha512_256_with_rsa_encryption(),
        (PkeyAlgId::Ecdsa, HashAlgId::Sha1) => known::ecdsa_with_sha1(),
        (PkeyAlgId::Ecdsa, HashAlgId::Sha224) => known::ecdsa_with_sha224(),
        (PkeyAlgId::Ecdsa, HashAlgId::Sha256) => known::ecdsa_with_sha256(),
        (PkeyAlgId::Ecdsa, HashAlgId::Sha384) => known::ecdsa_with_sha384(),
        (PkeyAlgId::Ecdsa, HashAlgId::Sha512) => known::ecdsa_with_sha512(),
        (PkeyAlgId::Ecdsa, _) => return None,
    })
}

/// Split a signature algorithm OID into key type and digest.
///
/// Bare `rsaEncryption` yields no digest: the caller supplies it from context.
pub(crate) fn signature_oid_parts(oid: &Oid) -> Option<(PkeyAlgId, Option<HashAlgId>)> {
    if *oid == known::rsa_encryption() {
        return Some((PkeyAlgId::Rsa, None));
    }
    if *oid == known::ec_public_key() {
        return Some((PkeyAlgId::Ecdsa, None));
    }
    [
        HashAlgId::Md5,
        HashAlgId::Sha1,
        HashAlgId::Sha224,
        HashAlgId::Sha256,
        HashAlgId::Sha384,
        HashAlgId::Sha512,
        HashAlgId::Sha512_224,
        HashAlgId::Sha512_256,
    ]
    .into_iter()
    .find_map(|h| {
        [PkeyAlgId::Rsa, PkeyAlgId::Ecdsa]
            .into_iter()
            .find(|p| signature_oid(*p, h).as_ref() == Some(oid))
            .map(|p| (p, Some(h)))
    })
}

pub(crate) fn cipher_to_oid(alg: CipherAlgId) -> Oid {
    match alg {
        CipherAlgId::Aes128Cbc => known::aes128_cbc(),
        CipherAlgId::Aes192Cbc => known::aes192_cbc(),
        CipherAlgId::Aes256Cbc => known::aes256_cbc(),
        CipherAlgId::TdesEde3Cbc => known::des_ede3_cbc(),
    }
}

pub(crate) fn oid_to_cipher(oid: &Oid) -> Option<CipherAlgId> {
    [
        CipherAlgId::Aes128Cbc,
        CipherAlgId::Aes192Cbc,
        CipherAlgId::Aes256Cbc,
        CipherAlgId::TdesEde3Cbc,
    ]
    .into_iter()
    .find(|c| cipher_to_oid(*c) == *oid)
}

pub(crate) fn wrap_to_oid(alg: KeyWrapAlgId) -> Oid {
    match alg {
        KeyWrapAlgId::Aes128Wrap => known::id_aes128_wrap(),
        KeyWrapAlgId::Aes192Wrap => known::id_aes192_wrap(),
        KeyWrapAlgId::Aes256Wrap => known::id_aes256_wrap(),
        KeyWrapAlgId::TdesWrap => known::id_alg_cms3des_wrap(),
    }
}

pub(crate) fn oid_to_wrap(oid: &Oid) -> Option<KeyWrapAlgId> {
    [
        KeyWrapAlgId::Aes128Wrap,
        KeyWrapAlgId::Aes192Wrap,
        KeyWrapAlgId::Aes256Wrap,
        KeyWrapAlgId::TdesWrap,
    ]
    .into_iter()
    .find(|w| wrap_to_oid(*w) == *oid)
}
