//! Primitives behind the cmskit CMS engine.
//!
//! Block ciphers and digests wrap RustCrypto cores. On top of them sit the
//! CMS-specific constructions: CBC content encryption, the RFC 3394, 3217
//! and 3211 key wraps, and the X9.63 and PBKDF2 key derivations. RSA and EC
//! keys are adapted behind the traits in [`provider`].

#![forbid(unsafe_code)]

pub mod provider;
pub mod random;

pub mod aes;
pub mod des;

#[cfg(feature = "hash")]
pub mod hash;
#[cfg(feature = "modes")]
pub mod modes;

#[cfg(feature = "pbkdf2")]
pub mod pbkdf2;
#[cfg(feature = "x963kdf")]
pub mod x963kdf;

#[cfg(feature = "ecdh")]
pub mod ecc;
#[cfg(feature = "ecdh")]
pub mod ecdh;
#[cfg(feature = "ecdsa")]
pub mod ecdsa;
#[cfg(feature = "rsa")]
pub mod rsa;

pub use provider::{BlockCipher, Kdf};
