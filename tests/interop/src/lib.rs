//! Integration tests for cmskit.
//! Messages produced by OpenSSL 3 (`openssl cms`) and cross-crate roundtrips.

#[cfg(test)]
mod tests {
    use cmskit_crypto::hash::digest;
    use cmskit_crypto::rsa::{OaepParams, RsaPadding};
    use cmskit_pki::cms::{
        self, CmsContent, CmsMessage, CompressedData, ContentType, DigestedData, EnvelopedData,
        RecipientInfo, Secret, SignedData,
    };
    use cmskit_pki::pkcs8::PrivateKey;
    use cmskit_pki::x509::{CertIdentifier, Certificate, IdentifierKind};
    use cmskit_types::{CipherAlgId, CmsError, HashAlgId, KeyWrapAlgId};
    use cmskit_utils::oid::known;
    use cmskit_utils::pem;

    const MSG: &[u8] = b"hello, world!\n";

    const RSA_CERT: &str = include_str!("../../data/rsa2048.crt");
    const RSA_KEY: &str = include_str!("../../data/rsa2048.pem");
    const EC_CERT: &str = include_str!("../../data/ec_p256.crt");
    const EC_KEY: &str = include_str!("../../data/ec_p256.pem");
    const EC384_CERT: &str = include_str!("../../data/ec_p384.crt");
    const EC384_KEY: &str = include_str!("../../data/ec_p384.pem");
    const OAEP_KEY: &str = include_str!("../data/rsa_oaep_key.pem");
    const KARI_KEY: &str = include_str!("../data/kari_p256_key.pem");

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn enveloped(pem_text: &str) -> EnvelopedData {
        match cms::load(pem_text.as_bytes()).unwrap() {
            CmsMessage::Enveloped(m) => m,
            other => panic!("expected enveloped message, got {other:?}"),
        }
    }

    fn key(pem_text: &str) -> PrivateKey {
        PrivateKey::from_pem(pem_text).unwrap()
    }

    fn cert(pem_text: &str) -> Certificate {
        Certificate::from_pem(pem_text).unwrap()
    }

    // -------------------------------------------------------
    // 1. EncryptedData with an out-of-band key
    // -------------------------------------------------------
    #[test]
    fn test_openssl_encrypted_data_aes256() {
        let input = include_str!("../data/encrypted_aes256.pem");
        let mut msg = enveloped(input);
        assert_eq!(msg.content_type(), ContentType::EncryptedData);
        assert_eq!(msg.version().unwrap(), 0);
        assert_eq!(msg.algorithm().unwrap(), CipherAlgId::Aes256Cbc);
        assert_eq!(msg.key_length().unwrap(), 256);
        assert!(msg.recipients().unwrap().is_empty());

        let key = hex("00112233445566778899AABBCCDDEEFF00112233445566778899AABBCCDDEEFF");
        assert_eq!(msg.decrypt_with_key(Secret::Key(&key)).unwrap(), MSG);
        // untouched messages re-encode to the input bytes
        assert_eq!(msg.to_der(), pem::strip_armor(input.as_bytes()).unwrap());
    }

    #[test]
    fn test_openssl_encrypted_data_des3() {
        let mut msg = enveloped(include_str!("../data/encrypted_des3.pem"));
        assert_eq!(msg.algorithm().unwrap(), CipherAlgId::TdesEde3Cbc);
        assert_eq!(msg.iv().unwrap().len(), 8);
        let key = hex("0123456789abcdeffedcba987654321089abcdef01234567");
        assert_eq!(msg.decrypt_with_key(Secret::Key(&key)).unwrap(), MSG);
    }

    // -------------------------------------------------------
    // 2. KEK recipients (AES and TripleDES content)
    // -------------------------------------------------------
    #[test]
    fn test_openssl_kek_recipient_aes128_wrap() {
        let mut msg = enveloped(include_str!("../data/enveloped_kek_deadbeef.pem"));
        assert_eq!(msg.content_type(), ContentType::EnvelopedData);
        assert_eq!(msg.version().unwrap(), 2);
        let kekri = msg.find_kek_recipient(&hex("deadbeef")).unwrap().unwrap();
        assert_eq!(kekri.wrap_algorithm().unwrap(), KeyWrapAlgId::Aes128Wrap);
        assert!(msg.find_kek_recipient(&hex("c0ffee")).unwrap().is_none());

        let kek = hex("00112233445566778899AABBCCDDEEFF");
        assert_eq!(msg.decrypt_with_key(Secret::Key(&kek)).unwrap(), MSG);
        assert_eq!(msg.key().map(<[u8]>::len), Some(32));
    }

    #[test]
    fn test_openssl_kek_recipient_aes192_wrap() {
        let mut msg = enveloped(include_str!("../data/enveloped_kek_aes192.pem"));
        let kekri = msg.find_kek_recipient(&hex("c0ffee")).unwrap().unwrap();
        assert_eq!(kekri.wrap_algorithm().unwrap(), KeyWrapAlgId::Aes192Wrap);
        let kek = hex("000102030405060708090a0b0c0d0e0f1011121314151617");
        assert_eq!(msg.decrypt_with_key(Secret::Key(&kek)).unwrap(), MSG);
    }

    #[test]
    fn test_openssl_kek_recipient_des3_content() {
        let mut msg = enveloped(include_str!("../data/enveloped_kek_3des.pem"));
        assert_eq!(msg.algorithm().unwrap(), CipherAlgId::TdesEde3Cbc);
        let kek = hex("0123456789abcdeffedcba987654321089abcdef01234567");
        let recipient = RecipientInfo::Kek(msg.find_kek_recipient(&hex("beef")).unwrap().unwrap());
        msg.unlock(&recipient, &Secret::Key(&kek)).unwrap();
        assert_eq!(msg.decrypt().unwrap(), MSG);
    }

    // -------------------------------------------------------
    // 3. Password recipients
    // -------------------------------------------------------
    #[test]
    fn test_openssl_password_recipient() {
        let mut msg = enveloped(include_str!("../data/enveloped_pwri_aes256.pem"));
        assert_eq!(msg.version().unwrap(), 3);
        let pwri = msg.password_recipients().unwrap();
        assert_eq!(pwri.len(), 1);
        let params = pwri[0].pbkdf2_params().unwrap();
        assert_eq!(params.salt, hex("f1cfaaec8cbbb197"));
        assert_eq!(params.iterations, 2048);
        assert_eq!(params.prf, HashAlgId::Sha1);
        assert!(matches!(
            msg.decrypt_with_password(b"hunter2").unwrap_err(),
            CmsError::BadDecryption(_)
        ));
        assert_eq!(msg.decrypt_with_password(b"swordfish").unwrap(), MSG);
    }

    #[test]
    fn test_openssl_password_recipient_passphrase() {
        let mut msg = enveloped(include_str!("../data/enveloped_pwri_staple.pem"));
        assert_eq!(
            msg.decrypt_with_password(b"correct horse battery staple")
                .unwrap(),
            MSG
        );
    }

    // -------------------------------------------------------
    // 4. RSA key transport
    // -------------------------------------------------------
    #[test]
    fn test_openssl_key_transport_pkcs1() {
        let rsa_cert = cert(RSA_CERT);
        let mut msg = enveloped(include_str!("../data/enveloped_ktri_rsa.pem"));
        let recipient = msg.find_recipient(&rsa_cert).unwrap().unwrap();
        let RecipientInfo::KeyTrans(ktri) = &recipient else {
            panic!("expected ktri, got {recipient:?}");
        };
        assert_eq!(ktri.padding().unwrap(), RsaPadding::Pkcs1v15Encrypt);
        assert!(msg.find_recipient(&cert(EC_CERT)).unwrap().is_none());
        assert_eq!(msg.decrypt_with_key(Secret::PrivateKey(&key(RSA_KEY))).unwrap(), MSG);
    }

    #[test]
    fn test_openssl_key_transport_oaep_explicit_params() {
        let mut msg = enveloped(include_str!("../data/enveloped_oaep_params.pem"));
        let recipients = msg.recipients().unwrap();
        let RecipientInfo::KeyTrans(ktri) = &recipients[0] else {
            panic!("expected ktri");
        };
        let expected = OaepParams {
            hash: HashAlgId::Sha256,
            mgf_hash: HashAlgId::Sha256,
            label: hex("deadbeef"),
        };
        assert_eq!(ktri.padding().unwrap(), RsaPadding::Oaep(expected));
        assert_eq!(msg.decrypt_with_key(Secret::PrivateKey(&key(OAEP_KEY))).unwrap(), MSG);
    }

    #[test]
    fn test_openssl_key_transport_oaep_defaults() {
        let mut msg = enveloped(include_str!("../data/enveloped_oaep_default.pem"));
        let recipients = msg.recipients().unwrap();
        let RecipientInfo::KeyTrans(ktri) = &recipients[0] else {
            panic!("expected ktri");
        };
        assert_eq!(ktri.padding().unwrap(), RsaPadding::Oaep(OaepParams::default()));
        assert_eq!(msg.decrypt_with_key(Secret::PrivateKey(&key(OAEP_KEY))).unwrap(), MSG);
    }

    #[test]
    fn test_openssl_key_transport_oaep_sha256() {
        let mut msg = enveloped(include_str!("../data/enveloped_oaep_sha256.pem"));
        assert_eq!(msg.decrypt_with_key(Secret::PrivateKey(&key(RSA_KEY))).unwrap(), MSG);
    }

    // -------------------------------------------------------
    // 5. EC key agreement
    // -------------------------------------------------------
    #[test]
    fn test_openssl_key_agreement_cofactor_p256() {
        let mut msg = enveloped(include_str!("../data/enveloped_kari_p256.pem"));
        let recipients = msg.recipients().unwrap();
        let RecipientInfo::KeyAgree(kari) = &recipients[0] else {
            panic!("expected kari");
        };
        assert_eq!(kari.key_encryption_algorithm, known::dh_single_pass_cofactor_dh_sha256kdf());
        assert_eq!(kari.wrap_algorithm().unwrap(), KeyWrapAlgId::Aes256Wrap);
        assert_eq!(msg.decrypt_with_key(Secret::PrivateKey(&key(KARI_KEY))).unwrap(), MSG);
    }

    #[test]
    fn test_openssl_key_agreement_p384() {
        let p384 = cert(EC384_CERT);
        let mut msg = enveloped(include_str!("../data/enveloped_kari_p384.pem"));
        assert_eq!(msg.find_recipients(&p384).unwrap().len(), 1);
        assert!(msg.find_recipient(&cert(EC_CERT)).unwrap().is_none());
        assert_eq!(msg.decrypt_with_key(Secret::PrivateKey(&key(EC384_KEY))).unwrap(), MSG);
    }

    #[test]
    fn test_openssl_two_recipients_share_cek() {
        let input = include_str!("../data/enveloped_two_recipients.pem");
        let mut by_rsa = enveloped(input);
        assert_eq!(by_rsa.recipients().unwrap().len(), 2);
        assert_eq!(by_rsa.key_recipients().unwrap().len(), 2);
        assert_eq!(by_rsa.algorithm().unwrap(), CipherAlgId::TdesEde3Cbc);
        assert_eq!(by_rsa.calculate_version().unwrap(), 2);
        assert!(by_rsa.has_encoded());
        assert_eq!(by_rsa.decrypt_with_key(Secret::PrivateKey(&key(RSA_KEY))).unwrap(), MSG);

        let mut by_ec = enveloped(input);
        assert_eq!(by_ec.decrypt_with_key(Secret::PrivateKey(&key(EC_KEY))).unwrap(), MSG);
        assert_eq!(by_rsa.key(), by_ec.key());
    }

    #[test]
    fn test_add_recipient_to_loaded_message() {
        let input = include_str!("../data/enveloped_kek_deadbeef.pem");
        let kek = hex("00112233445566778899AABBCCDDEEFF");
        let mut msg = enveloped(input);
        assert!(matches!(
            msg.create_recipient_from_password(b"late", CipherAlgId::Aes128Cbc)
                .unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
        msg.decrypt_with_key(Secret::Key(&kek)).unwrap();
        msg.create_recipient_from_password(b"late", CipherAlgId::Aes128Cbc)
            .unwrap();
        assert_eq!(msg.version().unwrap(), 3);

        let der = msg.to_der();
        let mut by_password = EnvelopedData::load(&der).unwrap();
        assert_eq!(by_password.decrypt_with_password(b"late").unwrap(), MSG);
        let mut by_kek = EnvelopedData::load(&der).unwrap();
        assert_eq!(by_kek.decrypt_with_key(Secret::Key(&kek)).unwrap(), MSG);
    }

    // -------------------------------------------------------
    // 6. SignedData
    // -------------------------------------------------------
    #[test]
    fn test_openssl_signed_rsa_attached() {
        let mut sd = SignedData::load(include_bytes!("../data/signed_rsa_attached.pem")).unwrap();
        assert_eq!(sd.version().unwrap(), 1);
        assert_eq!(sd.content().unwrap().unwrap(), MSG);
        assert_eq!(sd.certificates().unwrap()[0].raw, cert(RSA_CERT).raw);
        assert_eq!(sd.signer_count().unwrap(), 1);
        assert!(sd.validate_signature(false).unwrap());
        assert!(sd.validate_signature(true).unwrap());
    }

    #[test]
    fn test_openssl_signed_detached() {
        let mut sd = SignedData::load(include_bytes!("../data/signed_ec_detached.pem")).unwrap();
        assert!(sd.is_detached().unwrap());
        assert!(matches!(
            sd.validate_signature(false).unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
        sd.attach(b"hello, world?\n").unwrap();
        assert!(!sd.validate_signature(false).unwrap());
        sd.attach(MSG).unwrap();
        assert!(sd.validate_signature(false).unwrap());
    }

    #[test]
    fn test_openssl_signed_subject_key_identifier() {
        let mut sd = SignedData::load(include_bytes!("../data/signed_ec384_keyid.pem")).unwrap();
        assert_eq!(sd.version().unwrap(), 3);
        let id = sd.signer(0).unwrap().identifier().unwrap();
        assert!(matches!(id, CertIdentifier::SubjectKeyId(_)));
        assert!(sd.find_signer(&cert(EC384_CERT)).unwrap().is_some());
        assert!(sd.validate_signature(false).unwrap());
    }

    #[test]
    fn test_openssl_signed_two_signers() {
        let mut sd = SignedData::load(include_bytes!("../data/signed_two_signers.pem")).unwrap();
        assert_eq!(sd.signer_count().unwrap(), 2);
        assert_eq!(sd.certificates().unwrap().len(), 2);
        assert!(sd.validate_signature(false).unwrap());
    }

    #[test]
    fn test_signed_p192_is_not_validated() {
        let mut sd = SignedData::load(include_bytes!("../data/signed_p192_detached.pem")).unwrap();
        assert_eq!(sd.signer_count().unwrap(), 2);
        assert!(sd.certificates().unwrap().is_empty());
        sd.attach(MSG).unwrap();
        assert!(!sd.validate_signature(false).unwrap());
    }

    #[test]
    fn test_signed_smime_capabilities() {
        let mut sd = SignedData::load(include_bytes!("../data/signed_smime_caps.pem")).unwrap();
        let caps = sd.signer(0).unwrap().smime_capabilities().unwrap().unwrap();
        assert_eq!(caps.len(), 8);
        assert_eq!(caps[0].oid, known::aes256_cbc());
        assert_eq!(caps[0].parameters, None);
        assert_eq!(caps[3].oid, known::des_ede3_cbc());
        assert_eq!(caps[4].parameters.as_deref(), Some(&[0x02, 0x02, 0x00, 0x80][..]));
    }

    // -------------------------------------------------------
    // 7. DigestedData and CompressedData
    // -------------------------------------------------------
    #[test]
    fn test_openssl_digested_data() {
        for (input, hash) in [
            (include_str!("../data/digested_sha256.pem"), HashAlgId::Sha256),
            (include_str!("../data/digested_sha512.pem"), HashAlgId::Sha512),
        ] {
            let mut dd = DigestedData::load(input.as_bytes()).unwrap();
            assert_eq!(dd.algorithm().unwrap(), hash);
            assert_eq!(dd.content().unwrap().unwrap(), MSG);
            assert_eq!(dd.digest().unwrap(), digest(hash, MSG));
            assert!(dd.validate().unwrap());
        }
    }

    #[test]
    fn test_compressed_zlib_bare_base64() {
        let mut cd =
            CompressedData::load(include_bytes!("../data/compressed_zlib.b64")).unwrap();
        assert_eq!(cd.algorithm().unwrap(), known::id_alg_zlib_compress());
        let content = cd.content().unwrap();
        assert_eq!(content.len(), 1175);
        assert!(content.starts_with(b"MIME-Version: 1.0\r\n"));
        assert_eq!(
            digest(HashAlgId::Sha256, &content),
            hex("5a0486a6112f2aa44e3905d33d7f8f32bba7a697c770d52fd838ae85bab8d198")
        );
    }

    // -------------------------------------------------------
    // 8. Nested messages
    // -------------------------------------------------------
    #[test]
    fn test_sign_then_envelope() {
        let ec_cert = cert(EC_CERT);
        let ec_key = key(EC_KEY);
        let mut sd = SignedData::new(MSG).unwrap();
        sd.sign_with_certificate(&ec_key, &ec_cert).unwrap();
        let signed = sd.to_der();

        let mut env = EnvelopedData::new(&signed).unwrap();
        env.create_recipient_from_certificate(&cert(RSA_CERT), IdentifierKind::SubjectKeyIdentifier)
            .unwrap();
        env.create_recipient_from_certificate(&ec_cert, IdentifierKind::IssuerAndSerialNumber)
            .unwrap();
        let pem_text = env.to_pem();

        let mut opened = EnvelopedData::load(pem_text.as_bytes()).unwrap();
        let inner = opened.decrypt_with_key(Secret::PrivateKey(&key(RSA_KEY))).unwrap();
        match cms::load(&inner).unwrap() {
            CmsMessage::Signed(mut m) => {
                assert_eq!(m.content().unwrap().unwrap(), MSG);
                assert!(m.validate_signature(false).unwrap());
            }
            other => panic!("expected signed message, got {other:?}"),
        }
    }

    #[test]
    fn test_compress_then_digest() {
        let cd = CompressedData::new(MSG).unwrap();
        let mut dd = DigestedData::new(&cd.to_der(), HashAlgId::Sha384).unwrap();
        assert!(dd.validate().unwrap());
        let inner = dd.content().unwrap().unwrap();
        match cms::load(&inner).unwrap() {
            CmsMessage::Compressed(mut m) => assert_eq!(m.content().unwrap(), MSG),
            other => panic!("expected compressed message, got {other:?}"),
        }
    }
}
