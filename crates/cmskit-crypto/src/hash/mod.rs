//! Unified hash module.
//!
//! [`Hasher`] is a streaming digest context over every algorithm named by
//! [`HashAlgId`]. The MD5, SHA-1 and SHA-2 cores come from RustCrypto.

use std::io::Read;

use cmskit_types::{CryptoError, HashAlgId};
use sha2::Digest as _;

pub use crate::provider::{Digest, HashAlgorithm};

const READ_CHUNK: usize = 64 * 1024;

/// Streaming digest context.
#[derive(Clone)]
pub enum Hasher {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Sha512_224(sha2::Sha512_224),
    Sha512_256(sha2::Sha512_256),
}

impl Hasher {
    /// Create a fresh context for `alg`.
    pub fn new(alg: HashAlgId) -> Self {
        match alg {
            HashAlgId::Md5 => Hasher::Md5(md5::Md5::new()),
            HashAlgId::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            HashAlgId::Sha224 => Hasher::Sha224(sha2::Sha224::new()),
            HashAlgId::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            HashAlgId::Sha384 => Hasher::Sha384(sha2::Sha384::new()),
            HashAlgId::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
            HashAlgId::Sha512_224 => Hasher::Sha512_224(sha2::Sha512_224::new()),
            HashAlgId::Sha512_256 => Hasher::Sha512_256(sha2::Sha512_256::new()),
        }
    }

    /// The algorithm this context computes.
    pub fn algorithm(&self) -> HashAlgId {
        match self {
            Hasher::Md5(_) => HashAlgId::Md5,
            Hasher::Sha1(_) => HashAlgId::Sha1,
            Hasher::Sha224(_) => HashAlgId::Sha224,
            Hasher::Sha256(_) => HashAlgId::Sha256,
            Hasher::Sha384(_) => HashAlgId::Sha384,
            Hasher::Sha512(_) => HashAlgId::Sha512,
            Hasher::Sha512_224(_) => HashAlgId::Sha512_224,
            Hasher::Sha512_256(_) => HashAlgId::Sha512_256,
        }
    }

    /// Absorb `data`.
    pub fn absorb(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha224(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha384(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
            Hasher::Sha512_224(h) => h.update(data),
            Hasher::Sha512_256(h) => h.update(data),
        }
    }

    /// Produce the digest and reset the context.
    pub fn finalize_vec(&mut self) -> Vec<u8> {
        match self {
            Hasher::Md5(h) => h.finalize_reset().to_vec(),
            Hasher::Sha1(h) => h.finalize_reset().to_vec(),
            Hasher::Sha224(h) => h.finalize_reset().to_vec(),
            Hasher::Sha256(h) => h.finalize_reset().to_vec(),
            Hasher::Sha384(h) => h.finalize_reset().to_vec(),
            Hasher::Sha512(h) => h.finalize_reset().to_vec(),
            Hasher::Sha512_224(h) => h.finalize_reset().to_vec(),
            Hasher::Sha512_256(h) => h.finalize_reset().to_vec(),
        }
    }
}

impl Digest for Hasher {
    fn output_size(&self) -> usize {
        self.algorithm().output_len()
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.absorb(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let n = self.output_size();
        if out.len() < n {
            return Err(CryptoError::InvalidArg);
        }
        out[..n].copy_from_slice(&self.finalize_vec());
        Ok(())
    }

    fn reset(&mut self) {
        *self = Hasher::new(self.algorithm());
    }
}

impl HashAlgorithm for HashAlgId {
    fn new_digest(&self) -> Box<dyn Digest> {
        Box::new(Hasher::new(*self))
    }
}

/// One-shot digest of `data`.
pub fn digest(alg: HashAlgId, data: &[u8]) -> Vec<u8> {
    let mut h = Hasher::new(alg);
    h.absorb(data);
    h.finalize_vec()
}

/// Digest everything readable from `reader`.
pub fn digest_reader<R: Read + ?Sized>(alg: HashAlgId, reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut h = Hasher::new(alg);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        h.absorb(&buf[..n]);
    }
    Ok(h.finalize_vec())
}
