//! X.509 certificate handling for CMS signers and recipients.
//!
//! Only what CMS needs: DER/PEM parsing, the extensions that drive signer
//! and recipient matching, signature verification and a small builder.

mod builder;
mod certificate;
mod extensions;
mod identifier;
mod signing;

pub use builder::CertificateBuilder;
pub use certificate::{Certificate, DistinguishedName, SubjectPublicKeyInfo, X509Extension};
pub use extensions::{BasicConstraints, KeyUsage};
pub use identifier::{CertIdentifier, IdentifierKind};
pub use signing::verify_digest_signature;

#[cfg(test)]
mod tests {
    use super::*;
    use cmskit_types::{EccCurveId, PkeyAlgId};

    const RSA_CERT: &str = include_str!("../../../../tests/data/rsa2048.crt");
    const EC_P256_CERT: &str = include_str!("../../../../tests/data/ec_p256.crt");
    const EC_P384_CERT: &str = include_str!("../../../../tests/data/ec_p384.crt");

    #[test]
    fn test_parse_rsa_certificate() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        assert_eq!(cert.version, 3);
        assert_eq!(cert.serial_number, vec![0x10, 0x01]);
        assert_eq!(cert.subject.get("O"), Some("cmskit RSA"));
        assert!(cert.is_self_signed());
        assert_eq!(cert.public_key.key_type(), Some(PkeyAlgId::Rsa));
        assert!(cert.verify_signature(&cert).unwrap());

        let ku = cert.key_usage().unwrap();
        assert!(ku.has(KeyUsage::DIGITAL_SIGNATURE));
        assert!(ku.has(KeyUsage::KEY_ENCIPHERMENT));
        assert!(!ku.has(KeyUsage::KEY_AGREEMENT));
    }

    #[test]
    fn test_parse_ec_certificates() {
        let p256 = Certificate::from_pem(EC_P256_CERT).unwrap();
        assert_eq!(p256.serial_number, vec![0x20, 0x02]);
        assert_eq!(p256.public_key.ec_curve().unwrap(), EccCurveId::NistP256);
        assert!(p256.verify_signature(&p256).unwrap());

        let p384 = Certificate::from_pem(EC_P384_CERT).unwrap();
        assert_eq!(p384.public_key.ec_curve().unwrap(), EccCurveId::NistP384);
        assert!(p384.is_issued_by(&p384));
        assert!(!p384.is_issued_by(&p256));
    }

    #[test]
    fn test_der_pem_roundtrip() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        let again = Certificate::from_der(&cert.to_der()).unwrap();
        assert_eq!(again.raw, cert.raw);
        assert_eq!(Certificate::from_pem(&cert.to_pem()).unwrap().raw, cert.raw);
        assert_eq!(DistinguishedName::from_der(&cert.issuer.raw).unwrap(), cert.issuer);
    }

    #[test]
    fn test_key_type_mismatch_does_not_verify() {
        let rsa = Certificate::from_pem(RSA_CERT).unwrap();
        let ec = Certificate::from_pem(EC_P256_CERT).unwrap();
        assert!(!rsa.verify_signature(&ec).unwrap());
    }

    #[test]
    fn test_reject_garbage() {
        assert!(Certificate::from_der(&[0x02, 0x01, 0x00]).is_err());
        assert!(Certificate::from_pem("not pem").is_err());
    }
}
