//! OID (Object Identifier) management.

use cmskit_types::CryptoError;

/// A parsed OID represented as a sequence of arc values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid {
    arcs: Vec<u32>,
}

impl Oid {
    /// Create an OID from a slice of arc values.
    pub fn new(arcs: &[u32]) -> Self {
        Self {
            arcs: arcs.to_vec(),
        }
    }

    /// Return the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Encode this OID to DER bytes (just the value, no tag/length).
    pub fn to_der_value(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        if self.arcs.len() >= 2 {
            encode_arc(&mut buf, self.arcs[0] * 40 + self.arcs[1]);
            for &arc in &self.arcs[2..] {
                encode_arc(&mut buf, arc);
            }
        }
        buf
    }

    /// Full DER encoding including the OBJECT IDENTIFIER tag and length.
    pub fn to_der(&self) -> Vec<u8> {
        let value = self.to_der_value();
        let mut out = vec![0x06];
        out.extend_from_slice(&crate::asn1::encode_length(value.len()));
        out.extend_from_slice(&value);
        out
    }

    /// Parse an OID from DER value bytes.
    pub fn from_der_value(data: &[u8]) -> Result<Self, CryptoError> {
        if data.is_empty() {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        let mut arcs = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let (arc, consumed) = decode_arc(&data[i..])?;
            if i == 0 {
                // the first subidentifier packs two arcs
                let (a, b) = match arc {
                    0..=39 => (0, arc),
                    40..=79 => (1, arc - 40),
                    _ => (2, arc - 80),
                };
                arcs.push(a);
                arcs.push(b);
            } else {
                arcs.push(arc);
            }
            i += consumed;
        }

        Ok(Self { arcs })
    }

    /// Parse a dotted-decimal string such as `1.2.840.113549.1.7.2`.
    pub fn from_dot_string(s: &str) -> Result<Self, CryptoError> {
        let arcs = s
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| CryptoError::DecodeAsn1Fail))
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        Ok(Self { arcs })
    }

    /// Return the dotted-string representation (e.g., "1.2.840.113549.1.1.1").
    pub fn to_dot_string(&self) -> String {
        self.arcs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Registered name of this OID, if it is one the registry knows.
    pub fn name(&self) -> Option<&'static str> {
        oid_to_name(self)
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.to_dot_string()),
        }
    }
}

fn encode_arc(buf: &mut Vec<u8>, mut value: u32) {
    if value < 0x80 {
        buf.push(value as u8);
        return;
    }
    let mut bytes = Vec::new();
    while value > 0 {
        bytes.push((value & 0x7F) as u8);
        value >>= 7;
    }
    bytes.reverse();
    let last = bytes.len() - 1;
    for (i, b) in bytes.iter().enumerate() {
        buf.push(if i < last { b | 0x80 } else { *b });
    }
}

fn decode_arc(data: &[u8]) -> Result<(u32, usize), CryptoError> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(CryptoError::DecodeAsn1Fail);
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if (byte & 0x80) == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(CryptoError::DecodeAsn1Fail)
}

macro_rules! registry {
    ($($func:ident => $name:literal [$($arc:literal),+];)+) => {
        /// Well-known OIDs.
        pub mod known {
            use super::Oid;
            $(
                #[doc = concat!("`", $name, "`")]
                pub fn $func() -> Oid {
                    Oid::new(&[$($arc),+])
                }
            )+
        }

        static REGISTRY: &[(&str, &[u32])] = &[$(($name, &[$($arc),+])),+];
    };
}

registry! {
    // CMS content types
    id_data => "id-data" [1, 2, 840, 113549, 1, 7, 1];
    id_signed_data => "id-signedData" [1, 2, 840, 113549, 1, 7, 2];
    id_enveloped_data => "id-envelopedData" [1, 2, 840, 113549, 1, 7, 3];
    id_digested_data => "id-digestedData" [1, 2, 840, 113549, 1, 7, 5];
    id_encrypted_data => "id-encryptedData" [1, 2, 840, 113549, 1, 7, 6];
    id_ct_auth_data => "id-ct-authData" [1, 2, 840, 113549, 1, 9, 16, 1, 2];
    id_ct_tst_info => "id-ct-TSTInfo" [1, 2, 840, 113549, 1, 9, 16, 1, 4];
    id_ct_compressed_data => "id-ct-compressedData" [1, 2, 840, 113549, 1, 9, 16, 1, 9];

    // attributes
    id_content_type => "id-contentType" [1, 2, 840, 113549, 1, 9, 3];
    id_message_digest => "id-messageDigest" [1, 2, 840, 113549, 1, 9, 4];
    id_signing_time => "id-signingTime" [1, 2, 840, 113549, 1, 9, 5];
    id_countersignature => "id-countersignature" [1, 2, 840, 113549, 1, 9, 6];
    smime_capabilities => "pkcs-9-at-smimeCapabilities" [1, 2, 840, 113549, 1, 9, 15];
    id_aa_signing_certificate => "id-aa-signingCertificate" [1, 2, 840, 113549, 1, 9, 16, 2, 12];
    id_aa_signing_certificate_v2 => "id-aa-signingCertificateV2" [1, 2, 840, 113549, 1, 9, 16, 2, 47];
    id_aa_time_stamp_token => "id-aa-timeStampToken" [1, 2, 840, 113549, 1, 9, 16, 2, 14];
    id_aa_cms_algorithm_protection => "id-aa-CMSAlgorithmProtection" [1, 2, 840, 113549, 1, 9, 52];

    // digests
    md5 => "md5" [1, 2, 840, 113549, 2, 5];
    sha1 => "id-sha1" [1, 3, 14, 3, 2, 26];
    sha224 => "id-sha224" [2, 16, 840, 1, 101, 3, 4, 2, 4];
    sha256 => "id-sha256" [2, 16, 840, 1, 101, 3, 4, 2, 1];
    sha384 => "id-sha384" [2, 16, 840, 1, 101, 3, 4, 2, 2];
    sha512 => "id-sha512" [2, 16, 840, 1, 101, 3, 4, 2, 3];
    sha512_224 => "id-sha512/224" [2, 16, 840, 1, 101, 3, 4, 2, 5];
    sha512_256 => "id-sha512/256" [2, 16, 840, 1, 101, 3, 4, 2, 6];

    // HMAC PRFs for PBKDF2
    hmac_with_sha1 => "id-hmacWithSHA1" [1, 2, 840, 113549, 2, 7];
    hmac_with_sha224 => "id-hmacWithSHA224" [1, 2, 840, 113549, 2, 8];
    hmac_with_sha256 => "id-hmacWithSHA256" [1, 2, 840, 113549, 2, 9];
    hmac_with_sha384 => "id-hmacWithSHA384" [1, 2, 840, 113549, 2, 10];
    hmac_with_sha512 => "id-hmacWithSHA512" [1, 2, 840, 113549, 2, 11];
    hmac_with_sha512_224 => "id-hmacWithSHA512-224" [1, 2, 840, 113549, 2, 12];
    hmac_with_sha512_256 => "id-hmacWithSHA512-256" [1, 2, 840, 113549, 2, 13];

    // RSA
    rsa_encryption => "rsaEncryption" [1, 2, 840, 113549, 1, 1, 1];
    md5_with_rsa_encryption => "md5WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 4];
    sha1_with_rsa_encryption => "sha1WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 5];
    id_rsaes_oaep => "id-RSAES-OAEP" [1, 2, 840, 113549, 1, 1, 7];
    id_mgf1 => "id-mgf1" [1, 2, 840, 113549, 1, 1, 8];
    id_p_specified => "id-pSpecified" [1, 2, 840, 113549, 1, 1, 9];
    rsassa_pss => "id-RSASSA-PSS" [1, 2, 840, 113549, 1, 1, 10];
    sha256_with_rsa_encryption => "sha256WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 11];
    sha384_with_rsa_encryption => "sha384WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 12];
    sha512_with_rsa_encryption => "sha512WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 13];
    sha224_with_rsa_encryption => "sha224WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 14];
    sha512_224_with_rsa_encryption => "sha512-224WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 15];
    sha512_256_with_rsa_encryption => "sha512-256WithRSAEncryption" [1, 2, 840, 113549, 1, 1, 16];

    // EC
    ec_public_key => "id-ecPublicKey" [1, 2, 840, 10045, 2, 1];
    ecdsa_with_sha1 => "ecdsa-with-SHA1" [1, 2, 840, 10045, 4, 1];
    ecdsa_with_sha224 => "ecdsa-with-SHA224" [1, 2, 840, 10045, 4, 3, 1];
    ecdsa_with_sha256 => "ecdsa-with-SHA256" [1, 2, 840, 10045, 4, 3, 2];
    ecdsa_with_sha384 => "ecdsa-with-SHA384" [1, 2, 840, 10045, 4, 3, 3];
    ecdsa_with_sha512 => "ecdsa-with-SHA512" [1, 2, 840, 10045, 4, 3, 4];
    prime256v1 => "prime256v1" [1, 2, 840, 10045, 3, 1, 7];
    secp384r1 => "secp384r1" [1, 3, 132, 0, 34];
    secp521r1 => "secp521r1" [1, 3, 132, 0, 35];
    sect163k1 => "sect163k1" [1, 3, 132, 0, 1];
    sect233k1 => "sect233k1" [1, 3, 132, 0, 26];
    sect283k1 => "sect283k1" [1, 3, 132, 0, 16];

    // key agreement schemes
    dh_single_pass_std_dh_sha1kdf => "dhSinglePass-stdDH-sha1kdf-scheme" [1, 3, 133, 16, 840, 63, 0, 2];
    dh_single_pass_std_dh_sha224kdf => "dhSinglePass-stdDH-sha224kdf-scheme" [1, 3, 132, 1, 11, 0];
    dh_single_pass_std_dh_sha256kdf => "dhSinglePass-stdDH-sha256kdf-scheme" [1, 3, 132, 1, 11, 1];
    dh_single_pass_std_dh_sha384kdf => "dhSinglePass-stdDH-sha384kdf-scheme" [1, 3, 132, 1, 11, 2];
    dh_single_pass_std_dh_sha512kdf => "dhSinglePass-stdDH-sha512kdf-scheme" [1, 3, 132, 1, 11, 3];
    dh_single_pass_cofactor_dh_sha1kdf => "dhSinglePass-cofactorDH-sha1kdf-scheme" [1, 3, 133, 16, 840, 63, 0, 3];
    dh_single_pass_cofactor_dh_sha224kdf => "dhSinglePass-cofactorDH-sha224kdf-scheme" [1, 3, 132, 1, 14, 0];
    dh_single_pass_cofactor_dh_sha256kdf => "dhSinglePass-cofactorDH-sha256kdf-scheme" [1, 3, 132, 1, 14, 1];
    dh_single_pass_cofactor_dh_sha384kdf => "dhSinglePass-cofactorDH-sha384kdf-scheme" [1, 3, 132, 1, 14, 2];
    dh_single_pass_cofactor_dh_sha512kdf => "dhSinglePass-cofactorDH-sha512kdf-scheme" [1, 3, 132, 1, 14, 3];
    mqv_single_pass_sha1kdf => "mqvSinglePass-sha1kdf-scheme" [1, 3, 133, 16, 840, 63, 0, 16];
    mqv_single_pass_sha224kdf => "mqvSinglePass-sha224kdf-scheme" [1, 3, 132, 1, 15, 0];
    mqv_single_pass_sha256kdf => "mqvSinglePass-sha256kdf-scheme" [1, 3, 132, 1, 15, 1];
    mqv_single_pass_sha384kdf => "mqvSinglePass-sha384kdf-scheme" [1, 3, 132, 1, 15, 2];
    mqv_single_pass_sha512kdf => "mqvSinglePass-sha512kdf-scheme" [1, 3, 132, 1, 15, 3];

    // content encryption
    aes128_cbc => "aes128-CBC" [2, 16, 840, 1, 101, 3, 4, 1, 2];
    aes192_cbc => "aes192-CBC" [2, 16, 840, 1, 101, 3, 4, 1, 22];
    aes256_cbc => "aes256-CBC" [2, 16, 840, 1, 101, 3, 4, 1, 42];
    des_ede3_cbc => "des-ede3-cbc" [1, 2, 840, 113549, 3, 7];

    // key wrap
    id_aes128_wrap => "id-aes128-wrap" [2, 16, 840, 1, 101, 3, 4, 1, 5];
    id_aes192_wrap => "id-aes192-wrap" [2, 16, 840, 1, 101, 3, 4, 1, 25];
    id_aes256_wrap => "id-aes256-wrap" [2, 16, 840, 1, 101, 3, 4, 1, 45];
    id_alg_cms3des_wrap => "id-alg-CMS3DESwrap" [1, 2, 840, 113549, 1, 9, 16, 3, 6];
    id_alg_pwri_kek => "id-alg-PWRI-KEK" [1, 2, 840, 113549, 1, 9, 16, 3, 9];
    id_pbkdf2 => "id-PBKDF2" [1, 2, 840, 113549, 1, 5, 12];

    // compression
    id_alg_zlib_compress => "id-alg-zlibCompress" [1, 2, 840, 113549, 1, 9, 16, 3, 8];

    // X.509 extensions (RFC 5280)
    subject_key_identifier => "id-ce-subjectKeyIdentifier" [2, 5, 29, 14];
    key_usage => "id-ce-keyUsage" [2, 5, 29, 15];
    subject_alt_name => "id-ce-subjectAltName" [2, 5, 29, 17];
    basic_constraints => "id-ce-basicConstraints" [2, 5, 29, 19];
    authority_key_identifier => "id-ce-authorityKeyIdentifier" [2, 5, 29, 35];
    ext_key_usage => "id-ce-extKeyUsage" [2, 5, 29, 37];

    // DN attribute types (X.520)
    common_name => "id-at-commonName" [2, 5, 4, 3];
    serial_number_attr => "id-at-serialNumber" [2, 5, 4, 5];
    country_name => "id-at-countryName" [2, 5, 4, 6];
    locality_name => "id-at-localityName" [2, 5, 4, 7];
    state_or_province_name => "id-at-stateOrProvinceName" [2, 5, 4, 8];
    organization_name => "id-at-organizationName" [2, 5, 4, 10];
    organizational_unit_name => "id-at-organizationalUnitName" [2, 5, 4, 11];
    email_address => "pkcs-9-at-emailAddress" [1, 2, 840, 113549, 1, 9, 1];
}

/// Registered name of an OID, for diagnostics and error messages.
pub fn oid_to_name(oid: &Oid) -> Option<&'static str> {
    REGISTRY
        .iter()
        .find(|(_, arcs)| *arcs == oid.arcs())
        .map(|(name, _)| *name)
}

/// Look up an OID by its registered name.
pub fn name_to_oid(name: &str) -> Option<Oid> {
    REGISTRY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, arcs)| Oid::new(arcs))
}

/// Map a well-known DN attribute OID to its short name.
pub fn oid_to_dn_short_name(oid: &Oid) -> Option<&'static str> {
    match oid.arcs() {
        [2, 5, 4, 3] => Some("CN"),
        [2, 5, 4, 6] => Some("C"),
        [2, 5, 4, 10] => Some("O"),
        [2, 5, 4, 11] => Some("OU"),
        [2, 5, 4, 8] => Some("ST"),
        [2, 5, 4, 7] => Some("L"),
        [2, 5, 4, 5] => Some("serialNumber"),
        [1, 2, 840, 113549, 1, 9, 1] => Some("emailAddress"),
        _ => None,
    }
}
