//! Capability traits shared by the primitives in this crate.
//!
//! Key wrap, PWRI and CBC code is generic over [`BlockCipher`]; recipient and
//! signer code reaches RSA and EC keys through [`Signer`], [`Verifier`] and
//! [`KeyAgreement`] so that message code never names a concrete curve or
//! cipher type.

use cmskit_types::CryptoError;

/// Incremental message digest.
pub trait Digest: Send + Sync {
    fn output_size(&self) -> usize;

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Writes `output_size()` bytes to the front of `out`.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    fn reset(&mut self);
}

/// Factory for [`Digest`] contexts.
pub trait HashAlgorithm: Send + Sync {
    fn new_digest(&self) -> Box<dyn Digest>;

    fn hash(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut ctx = self.new_digest();
        ctx.update(data)?;
        let mut out = vec![0u8; ctx.output_size()];
        ctx.finish(&mut out)?;
        Ok(out)
    }
}

/// A keyed block cipher. Blocks are transformed in place and must be exactly
/// `block_size()` bytes.
pub trait BlockCipher: Send + Sync {
    fn block_size(&self) -> usize;

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;
}

/// Derives key material from a shared secret and a context string, filling
/// `output` completely.
pub trait Kdf: Send + Sync {
    fn derive(&self, secret: &[u8], context: &[u8], output: &mut [u8]) -> Result<(), CryptoError>;
}

/// Produces a signature over a precomputed digest.
pub trait Signer: Send + Sync {
    fn sign(&self, digest: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Checks a signature over a precomputed digest. `Ok(false)` is a signature
/// mismatch; errors are reserved for malformed keys or inputs.
pub trait Verifier: Send + Sync {
    fn verify(&self, digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError>;
}

/// Static-ephemeral Diffie-Hellman.
pub trait KeyAgreement: Send + Sync {
    /// Raw shared secret `Z` with an encoded peer public key.
    fn compute_shared_secret(&self, peer_public_key: &[u8]) -> Result<Vec<u8>, CryptoError>;
}
