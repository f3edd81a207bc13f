#![forbid(unsafe_code)]
#![doc = "Encoding utilities for cmskit: ASN.1 BER/DER, OID registry, PEM."]

#[cfg(feature = "asn1")]
pub mod asn1;

#[cfg(feature = "pem")]
pub mod pem;

#[cfg(feature = "oid")]
pub mod oid;
