//! ANSI X9.63 key derivation (SEC 1 section 3.6.1).
//!
//! `K = H(Z || 00000001 || SharedInfo) || H(Z || 00000002 || SharedInfo) || ...`

use cmskit_types::{CryptoError, HashAlgId};

use crate::hash::Hasher;
use crate::provider::Kdf;

/// X9.63 KDF over one hash function.
#[derive(Debug, Clone, Copy)]
pub struct X963Kdf {
    hash: HashAlgId,
}

impl X963Kdf {
    pub fn new(hash: HashAlgId) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> HashAlgId {
        self.hash
    }

    /// Derive `len` bytes from shared secret `z` and `shared_info`.
    pub fn derive_vec(&self, z: &[u8], shared_info: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![0u8; len];
        self.derive(z, shared_info, &mut out)?;
        Ok(out)
    }
}

impl Kdf for X963Kdf {
    fn derive(&self, secret: &[u8], info: &[u8], output: &mut [u8]) -> Result<(), CryptoError> {
        let h_len = self.hash.output_len();
        let blocks = output.len().div_ceil(h_len);
        if blocks as u64 >= u32::MAX as u64 {
            return Err(CryptoError::KdfDkLenOverflow);
        }

        let mut hasher = Hasher::new(self.hash);
        for (i, chunk) in output.chunks_mut(h_len).enumerate() {
            let counter = (i as u32) + 1;
            hasher.absorb(secret);
            hasher.absorb(&counter.to_be_bytes());
            hasher.absorb(info);
            let block = hasher.finalize_vec();
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;

    // NIST CAVS ansx963_2001 SHA-256, empty SharedInfo, COUNT = 0
    #[test]
    fn test_cavs_sha256() {
        let z = hex::decode("96c05619d56c328ab95fe84b18264b08725b85e33fd34f08").unwrap();
        let out = X963Kdf::new(HashAlgId::Sha256).derive_vec(&z, &[], 16).unwrap();
        assert_eq!(hex::encode(out), "443024c3dae66b95e6f5670601558f71");
    }

    #[test]
    fn test_matches_definition() {
        let z = [0x0bu8; 32];
        let info = b"shared info";
        let out = X963Kdf::new(HashAlgId::Sha256).derive_vec(&z, info, 40).unwrap();

        let mut first = z.to_vec();
        first.extend_from_slice(&1u32.to_be_bytes());
        first.extend_from_slice(info);
        let mut second = z.to_vec();
        second.extend_from_slice(&2u32.to_be_bytes());
        second.extend_from_slice(info);

        assert_eq!(&out[..32], &digest(HashAlgId::Sha256, &first)[..]);
        assert_eq!(&out[32..], &digest(HashAlgId::Sha256, &second)[..8]);
    }

    #[test]
    fn test_prefix_stable() {
        let kdf = X963Kdf::new(HashAlgId::Sha384);
        let short = kdf.derive_vec(b"z", b"i", 24).unwrap();
        let long = kdf.derive_vec(b"z", b"i", 100).unwrap();
        assert_eq!(&long[..24], &short[..]);
    }
}
