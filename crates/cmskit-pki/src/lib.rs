#![forbid(unsafe_code)]
#![doc = "X.509 certificates, PKCS#8 private keys and the CMS message engine."]

pub(crate) mod encoding;
pub(crate) mod oid_mapping;

#[cfg(feature = "x509")]
pub mod x509;

#[cfg(feature = "x509")]
pub mod pkcs8;

#[cfg(feature = "cms")]
pub mod cms;
