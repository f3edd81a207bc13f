//! EnvelopedData and EncryptedData (RFC 5652 sections 6 and 8).
//!
//! ```text
//! EnvelopedData ::= SEQUENCE {
//!     version              CMSVersion,
//!     originatorInfo       [0] IMPLICIT OriginatorInfo OPTIONAL,
//!     recipientInfos       RecipientInfos,
//!     encryptedContentInfo EncryptedContentInfo,
//!     unprotectedAttrs     [1] IMPLICIT UnprotectedAttributes OPTIONAL }
//!
//! EncryptedData ::= SEQUENCE {
//!     version              CMSVersion,
//!     encryptedContentInfo EncryptedContentInfo,
//!     unprotectedAttrs     [1] IMPLICIT UnprotectedAttributes OPTIONAL }
//! ```
//!
//! Both are handled by [`EnvelopedData`]. A message without a
//! `recipientInfos` set is EncryptedData, whose key travels out of band; the
//! first recipient placed turns it into EnvelopedData. All recipients wrap the
//! same content-encryption key.

use std::fmt;

use cmskit_crypto::des;
use cmskit_crypto::modes::cbc;
use cmskit_crypto::random::random_bytes;
use cmskit_types::{CipherAlgId, CmsError, KeyWrapAlgId, PkeyAlgId};
use cmskit_utils::asn1::{Decoder, Encoder, Tag};
use cmskit_utils::oid::{known, Oid};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::attributes::Attribute;
use super::config::CmsConfig;
use super::recipient::{
    KekRecipient, KeyAgreeRecipient, KeyTransRecipient, PasswordRecipient, RecipientInfo, Secret,
};
use super::tree::{NodeId, Tree};
use super::{
    body_node, content_info_tree, open_content_info, read_algorithm, set_content_type, set_version,
    CmsContent, ContentType,
};
use crate::encoding::{enc_alg_id, enc_octet};
use crate::oid_mapping::{cipher_to_oid, oid_to_cipher};
use crate::pkcs8::PrivateKey;
use crate::x509::{Certificate, IdentifierKind, KeyUsage};

const VERSION: usize = 0;

/// An EnvelopedData message, or EncryptedData while it has no recipients.
pub struct EnvelopedData {
    tree: Tree,
    config: CmsConfig,
    content_type: ContentType,
    cek: Option<Zeroizing<Vec<u8>>>,
}

impl fmt::Debug for EnvelopedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopedData")
            .field("config", &self.config)
            .field("content_type", &self.content_type)
            .field("encoded", &self.has_encoded())
            .field("has_key", &self.cek.is_some())
            .finish()
    }
}

impl CmsContent for EnvelopedData {
    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn config(&self) -> &CmsConfig {
        &self.config
    }

    fn content_type(&self) -> ContentType {
        self.content_type
    }

    fn compile(&mut self) -> Result<(), CmsError> {
        self.tree.realize()
    }
}

impl EnvelopedData {
    /// Encrypt `data` under a fresh key for the default cipher.
    pub fn new(data: &[u8]) -> Result<Self, CmsError> {
        Self::with_config(data, CmsConfig::default())
    }

    /// Encrypt `data` under a fresh key for `config.content_cipher`.
    pub fn with_config(data: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let mut key = Zeroizing::new(random_bytes(config.content_cipher.key_len())?);
        if config.content_cipher == CipherAlgId::TdesEde3Cbc {
            des::set_odd_parity(&mut key);
        }
        Self::with_key(data, &key, config)
    }

    /// Encrypt `data` under a caller-supplied content-encryption key.
    pub fn with_key(data: &[u8], key: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let cipher = config.content_cipher;
        check_key_len(cipher, key)?;
        let iv = random_bytes(cipher.block_size())?;
        let ciphertext = cbc::encrypt_content(cipher, key, &iv, data)?;

        let mut eci = Encoder::new();
        eci.write_oid(&known::id_data().to_der_value())
            .write_raw(&enc_alg_id(&cipher_to_oid(cipher), Some(&enc_octet(&iv))))
            .write_context_specific(0, false, &ciphertext);
        let mut body = Encoder::new();
        body.write_uint(0).write_sequence(&eci.finish());
        let mut seq = Encoder::new();
        seq.write_sequence(&body.finish());

        let tree = content_info_tree(ContentType::EncryptedData, &seq.finish())?;
        debug!(?cipher, len = data.len(), "built EncryptedData");
        Ok(Self {
            tree,
            config,
            content_type: ContentType::EncryptedData,
            cek: Some(Zeroizing::new(key.to_vec())),
        })
    }

    /// Decode a PEM or DER EnvelopedData or EncryptedData message.
    pub fn load(input: &[u8]) -> Result<Self, CmsError> {
        Self::load_with(input, CmsConfig::default())
    }

    pub fn load_with(input: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let (tree, content_type) = open_content_info(input)?;
        match content_type {
            ContentType::EnvelopedData | ContentType::EncryptedData => {
                Self::from_tree(tree, config)
            }
            other => Err(CmsError::UnsupportedContentType(format!(
                "expected envelopedData or encryptedData, found {other:?}"
            ))),
        }
    }

    pub(crate) fn from_tree(mut tree: Tree, config: CmsConfig) -> Result<Self, CmsError> {
        let root = tree.root();
        let oid_node = tree.expect_child(root, 0, "contentType")?;
        let oid = tree.oid(oid_node)?;
        let content_type = ContentType::from_oid(&oid)
            .ok_or_else(|| CmsError::UnsupportedContentType(oid.to_string()))?;

        let body = body_node(&mut tree)?;
        if !tree.tag(body).is_universal(0x10) {
            return Err(CmsError::structure("EnvelopedData is not a SEQUENCE"));
        }
        let kids = tree.children(body)?;
        let tags: Vec<Tag> = kids.iter().map(|k| tree.tag(*k)).collect();
        let mut i = 0;
        if !tags.first().is_some_and(|t| t.is_universal(0x02)) {
            return Err(CmsError::structure("malformed version"));
        }
        i += 1;
        if content_type == ContentType::EnvelopedData {
            if tags.get(i).is_some_and(|t| t.is_context(0) && t.constructed) {
                i += 1;
            }
            if !tags.get(i).is_some_and(|t| t.is_universal(0x11)) {
                return Err(CmsError::structure("malformed recipientInfos"));
            }
            if tree.children(kids[i])?.is_empty() {
                return Err(CmsError::structure("recipientInfos is empty"));
            }
            i += 1;
        }
        if !tags.get(i).is_some_and(|t| t.is_universal(0x10)) {
            return Err(CmsError::structure("malformed encryptedContentInfo"));
        }
        let eci = kids[i];
        i += 1;
        if tags.get(i).is_some_and(|t| t.is_context(1) && t.constructed) {
            i += 1;
        }
        if i != kids.len() {
            return Err(CmsError::structure(format!(
                "unexpected field {i} in {content_type:?}"
            )));
        }

        let eci_kids = tree.children(eci)?;
        let eci_shape = eci_kids.len() >= 2
            && eci_kids.len() <= 3
            && tree.tag(eci_kids[0]).is_universal(0x06)
            && tree.tag(eci_kids[1]).is_universal(0x10)
            && eci_kids.get(2).map_or(true, |k| tree.tag(*k).is_context(0));
        if !eci_shape {
            return Err(CmsError::structure("malformed encryptedContentInfo"));
        }

        Ok(Self {
            tree,
            config,
            content_type,
            cek: None,
        })
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn body(&mut self) -> Result<NodeId, CmsError> {
        body_node(&mut self.tree)
    }

    fn find_field(&mut self, pred: impl Fn(&Tag) -> bool) -> Result<Option<NodeId>, CmsError> {
        let body = self.body()?;
        let kids = self.tree.children(body)?;
        Ok(kids.into_iter().skip(VERSION + 1).find(|k| pred(&self.tree.tag(*k))))
    }

    fn originator_node(&mut self) -> Result<Option<NodeId>, CmsError> {
        self.find_field(|t| t.is_context(0))
    }

    fn recipient_set(&mut self) -> Result<Option<NodeId>, CmsError> {
        self.find_field(|t| t.is_universal(0x11))
    }

    fn encrypted_content_info(&mut self) -> Result<NodeId, CmsError> {
        self.find_field(|t| t.is_universal(0x10))?
            .ok_or_else(|| CmsError::structure("missing encryptedContentInfo"))
    }

    fn unprotected_node(&mut self) -> Result<Option<NodeId>, CmsError> {
        self.find_field(|t| t.is_context(1))
    }

    /// `[n]` set inside originatorInfo.
    fn originator_set(&mut self, number: u32) -> Result<Option<NodeId>, CmsError> {
        let Some(originator) = self.originator_node()? else {
            return Ok(None);
        };
        let kids = self.tree.children(originator)?;
        Ok(kids.into_iter().find(|k| self.tree.tag(*k).is_context(number)))
    }

    fn ensure_originator_set(&mut self, number: u32) -> Result<NodeId, CmsError> {
        if let Some(node) = self.originator_set(number)? {
            return Ok(node);
        }
        if self.recipient_set()?.is_none() {
            return Err(CmsError::InsufficientSetup(
                "originator information needs at least one recipient".into(),
            ));
        }
        let originator = match self.originator_node()? {
            Some(node) => node,
            None => {
                let body = self.body()?;
                let node = self.tree.new_constructed(Tag::context(0, true));
                self.tree.insert(body, VERSION + 1, node)?;
                node
            }
        };
        // certs precede crls
        let index = if number == 0 {
            0
        } else {
            self.tree.children(originator)?.len()
        };
        let node = self.tree.new_constructed(Tag::context(number, true));
        self.tree.insert(originator, index, node)?;
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    pub fn version(&mut self) -> Result<u32, CmsError> {
        let body = self.body()?;
        let node = self.tree.expect_child(body, VERSION, "version")?;
        self.tree.uint(node)
    }

    pub fn encapsulated_content_type(&mut self) -> Result<Oid, CmsError> {
        let eci = self.encrypted_content_info()?;
        let node = self.tree.expect_child(eci, 0, "contentType")?;
        self.tree.oid(node)
    }

    /// Content-encryption cipher.
    pub fn algorithm(&mut self) -> Result<CipherAlgId, CmsError> {
        let (oid, _) = self.content_encryption_algorithm()?;
        oid_to_cipher(&oid)
            .ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("content cipher {oid}")))
    }

    fn content_encryption_algorithm(&mut self) -> Result<(Oid, Option<Vec<u8>>), CmsError> {
        let eci = self.encrypted_content_info()?;
        let node = self.tree.expect_child(eci, 1, "contentEncryptionAlgorithm")?;
        read_algorithm(&mut self.tree, node)
    }

    /// CBC initialization vector from the algorithm parameters.
    pub fn iv(&mut self) -> Result<Vec<u8>, CmsError> {
        let (oid, params) = self.content_encryption_algorithm()?;
        let params = params
            .ok_or_else(|| CmsError::structure(format!("{oid} has no IV parameter")))?;
        let mut dec = Decoder::new(&params);
        let iv = dec.read_octet_string()?.to_vec();
        if !dec.is_empty() {
            return Err(CmsError::structure("trailing data after IV"));
        }
        Ok(iv)
    }

    /// The ciphertext, or `None` when it is carried elsewhere.
    pub fn encrypted_content(&mut self) -> Result<Option<Vec<u8>>, CmsError> {
        let eci = self.encrypted_content_info()?;
        match self.tree.child(eci, 2)? {
            Some(node) => Ok(Some(self.tree.octets(node)?)),
            None => Ok(None),
        }
    }

    /// The content-encryption key, once known.
    pub fn key(&self) -> Option<&[u8]> {
        self.cek.as_deref().map(|k| k.as_slice())
    }

    /// Key length of the content cipher in bits.
    pub fn key_length(&mut self) -> Result<usize, CmsError> {
        Ok(self.key_length_in_bytes()? * 8)
    }

    pub fn key_length_in_bytes(&mut self) -> Result<usize, CmsError> {
        Ok(self.algorithm()?.key_len())
    }

    /// Supply the content-encryption key of an EncryptedData message.
    pub fn set_key(&mut self, key: &[u8]) -> Result<(), CmsError> {
        let cipher = self.algorithm()?;
        check_key_len(cipher, key)?;
        self.cek = Some(Zeroizing::new(key.to_vec()));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Recipients
    // -----------------------------------------------------------------------

    pub fn recipients(&mut self) -> Result<Vec<RecipientInfo>, CmsError> {
        let Some(set) = self.recipient_set()? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for node in self.tree.children(set)? {
            out.push(RecipientInfo::from_der(&self.tree.encode(node))?);
        }
        Ok(out)
    }

    pub fn password_recipients(&mut self) -> Result<Vec<PasswordRecipient>, CmsError> {
        Ok(self
            .recipients()?
            .into_iter()
            .filter_map(|r| match r {
                RecipientInfo::Password(p) => Some(p),
                _ => None,
            })
            .collect())
    }

    /// Key transport, key agreement and KEK recipients.
    pub fn key_recipients(&mut self) -> Result<Vec<RecipientInfo>, CmsError> {
        Ok(self
            .recipients()?
            .into_iter()
            .filter(|r| {
                matches!(
                    r,
                    RecipientInfo::KeyTrans(_) | RecipientInfo::KeyAgree(_) | RecipientInfo::Kek(_)
                )
            })
            .collect())
    }

    /// Recipients addressed to `cert` with a key usage that fits their kind.
    /// Key agreement recipients come back narrowed to the encrypted key
    /// for `cert`.
    pub fn find_recipients(&mut self, cert: &Certificate) -> Result<Vec<RecipientInfo>, CmsError> {
        Ok(self
            .recipients()?
            .into_iter()
            .filter_map(|r| match r {
                RecipientInfo::KeyAgree(kari) => kari.select(cert).map(RecipientInfo::KeyAgree),
                other if other.matches_certificate(cert) => Some(other),
                _ => None,
            })
            .collect())
    }

    pub fn find_recipient(&mut self, cert: &Certificate) -> Result<Option<RecipientInfo>, CmsError> {
        Ok(self.find_recipients(cert)?.into_iter().next())
    }

    /// KEK recipients whose key identifier equals `key_identifier`.
    pub fn find_kek_recipients(
        &mut self,
        key_identifier: &[u8],
    ) -> Result<Vec<KekRecipient>, CmsError> {
        Ok(self
            .recipients()?
            .into_iter()
            .filter_map(|r| match r {
                RecipientInfo::Kek(k) if k.key_identifier == key_identifier => Some(k),
                _ => None,
            })
            .collect())
    }

    pub fn find_kek_recipient(
        &mut self,
        key_identifier: &[u8],
    ) -> Result<Option<KekRecipient>, CmsError> {
        Ok(self.find_kek_recipients(key_identifier)?.into_iter().next())
    }

    fn require_cek(&self) -> Result<Zeroizing<Vec<u8>>, CmsError> {
        self.cek.clone().ok_or_else(|| {
            CmsError::InsufficientSetup("A content encryption key is unavailable".into())
        })
    }

    /// Add a key transport (RSA) or key agreement (EC) recipient for `cert`.
    pub fn create_recipient_from_certificate(
        &mut self,
        cert: &Certificate,
        kind: IdentifierKind,
    ) -> Result<RecipientInfo, CmsError> {
        let cek = self.require_cek()?;
        let recipient = match cert.public_key.key_type() {
            Some(PkeyAlgId::Rsa) => {
                require_usage(cert, KeyUsage::KEY_ENCIPHERMENT, "keyEncipherment")?;
                RecipientInfo::KeyTrans(KeyTransRecipient::create(
                    cert,
                    kind,
                    &cek,
                    self.config.oaep.as_ref(),
                )?)
            }
            Some(PkeyAlgId::Ecdsa) => {
                require_usage(cert, KeyUsage::KEY_AGREEMENT, "keyAgreement")?;
                RecipientInfo::KeyAgree(KeyAgreeRecipient::create(
                    cert,
                    kind,
                    &cek,
                    self.config.key_agreement_wrap,
                )?)
            }
            None => {
                return Err(CmsError::UnsupportedAlgorithm(
                    "Public key must be RSA or EC".into(),
                ))
            }
        };
        self.place_recipient(&recipient)?;
        Ok(recipient)
    }

    /// Add a password recipient whose key-encryption key is derived with
    /// PBKDF2 and used with `cipher`.
    pub fn create_recipient_from_password(
        &mut self,
        password: &[u8],
        cipher: CipherAlgId,
    ) -> Result<RecipientInfo, CmsError> {
        let cek = self.require_cek()?;
        let recipient = RecipientInfo::Password(PasswordRecipient::create(
            password,
            cipher,
            &cek,
            self.config.pbkdf2_iterations,
            self.config.pbkdf2_prf,
        )?);
        self.place_recipient(&recipient)?;
        Ok(recipient)
    }

    /// Add a KEK recipient; the AES key wrap variant follows the length of `kek`.
    pub fn create_recipient_from_key_with_identifier(
        &mut self,
        kek: &[u8],
        key_identifier: &[u8],
        date: Option<i64>,
    ) -> Result<RecipientInfo, CmsError> {
        let cek = self.require_cek()?;
        let recipient =
            RecipientInfo::Kek(KekRecipient::create(kek, key_identifier, date, &cek)?);
        self.place_recipient(&recipient)?;
        Ok(recipient)
    }

    /// Add a KEK recipient with an explicit key wrap, e.g. TripleDES.
    pub fn create_recipient_from_key_with_wrap(
        &mut self,
        wrap: KeyWrapAlgId,
        kek: &[u8],
        key_identifier: &[u8],
        date: Option<i64>,
    ) -> Result<RecipientInfo, CmsError> {
        let cek = self.require_cek()?;
        let recipient = RecipientInfo::Kek(KekRecipient::create_with(
            wrap,
            kek,
            key_identifier,
            date,
            &cek,
        )?);
        self.place_recipient(&recipient)?;
        Ok(recipient)
    }

    /// Append `recipient` to `recipientInfos`.
    ///
    /// The first recipient creates the set and switches the content type
    /// from encryptedData to envelopedData.
    pub fn place_recipient(&mut self, recipient: &RecipientInfo) -> Result<(), CmsError> {
        let set = match self.recipient_set()? {
            Some(set) => set,
            None => {
                let body = self.body()?;
                let set = self.tree.new_constructed(Tag::SET);
                self.tree.insert(body, VERSION + 1, set)?;
                set_content_type(&mut self.tree, ContentType::EnvelopedData)?;
                self.content_type = ContentType::EnvelopedData;
                debug!("first recipient placed, now envelopedData");
                set
            }
        };
        let node = self.tree.graft(&recipient.to_der())?;
        self.tree.push(set, node)?;
        self.calculate_version()?;
        Ok(())
    }

    /// Derive the version from the message shape (RFC 5652 section 6.1) and
    /// store it.
    pub fn calculate_version(&mut self) -> Result<u32, CmsError> {
        let has_unprotected = self.unprotected_node()?.is_some();
        let version = if self.content_type == ContentType::EncryptedData {
            if has_unprotected {
                2
            } else {
                0
            }
        } else {
            let mut version = 0;
            if let Some(certs) = self.originator_set(0)? {
                for node in self.tree.children(certs)? {
                    let tag = self.tree.tag(node);
                    if tag.is_context(3) {
                        version = version.max(4);
                    } else if tag.is_context(2) {
                        version = version.max(3);
                    }
                }
            }
            if let Some(crls) = self.originator_set(1)? {
                for node in self.tree.children(crls)? {
                    if self.tree.tag(node).is_context(1) {
                        version = version.max(4);
                    }
                }
            }
            if self.originator_node()?.is_some() || has_unprotected {
                version = version.max(2);
            }
            for recipient in self.recipients()? {
                version = match recipient {
                    RecipientInfo::Password(_) | RecipientInfo::Other(_) => version.max(3),
                    r if r.version() != Some(0) => version.max(2),
                    _ => version,
                };
            }
            version
        };

        let body = self.body()?;
        let node = self.tree.expect_child(body, VERSION, "version")?;
        if self.tree.uint(node)? != version {
            debug!(version, content_type = ?self.content_type, "version changed");
        }
        set_version(&mut self.tree, node, version)?;
        Ok(version)
    }

    // -----------------------------------------------------------------------
    // Decryption
    // -----------------------------------------------------------------------

    /// Decrypt with the content-encryption key already known to the message.
    pub fn decrypt(&mut self) -> Result<Vec<u8>, CmsError> {
        let cek = self.require_cek()?;
        let cipher = self.algorithm()?;
        let iv = self.iv()?;
        let ciphertext = self.encrypted_content()?.ok_or_else(|| {
            CmsError::InsufficientSetup("the encrypted content is not attached".into())
        })?;
        cbc::decrypt_content(cipher, &cek, &iv, &ciphertext)
            .map_err(|e| CmsError::BadDecryption(format!("content decryption failed: {e}")))
    }

    /// Recover the content-encryption key through `recipient`. Later calls to
    /// [`decrypt`](Self::decrypt) use it.
    ///
    /// Password recipients whose PBKDF2 iteration count exceeds
    /// `config.pbkdf2_max_iterations` are refused before any derivation runs.
    pub fn unlock(&mut self, recipient: &RecipientInfo, secret: &Secret<'_>) -> Result<(), CmsError> {
        if let (RecipientInfo::Password(pwri), Secret::Password(_)) = (recipient, secret) {
            let iterations = pwri.pbkdf2_params()?.iterations;
            if iterations > self.config.pbkdf2_max_iterations {
                warn!(
                    iterations,
                    max = self.config.pbkdf2_max_iterations,
                    "PBKDF2 iteration count over the limit"
                );
                return Err(CmsError::UnsupportedAlgorithm(format!(
                    "PBKDF2 iteration count {iterations} exceeds {}",
                    self.config.pbkdf2_max_iterations
                )));
            }
        }
        let cek = recipient.unwrap_key(secret)?;
        check_key_len(self.algorithm()?, &cek)?;
        self.cek = Some(cek);
        Ok(())
    }

    /// Decrypt with a private key or key-encryption key, trying every
    /// recipient that can use it. For EncryptedData the key is the
    /// content-encryption key itself.
    pub fn decrypt_with_key(&mut self, secret: Secret<'_>) -> Result<Vec<u8>, CmsError> {
        self.derive_from_key(&secret)?;
        self.decrypt()
    }

    /// Decrypt through the recipients addressed to `cert`, using `key`.
    pub fn decrypt_with_certificate(
        &mut self,
        cert: &Certificate,
        key: &PrivateKey,
    ) -> Result<Vec<u8>, CmsError> {
        let candidates = self.find_recipients(cert)?;
        self.fan_out(
            &candidates,
            &Secret::PrivateKey(key),
            "Unable to perform decryption with certificate",
        )?;
        self.decrypt()
    }

    pub fn decrypt_with_password(&mut self, password: &[u8]) -> Result<Vec<u8>, CmsError> {
        self.derive_from_password(password)?;
        self.decrypt()
    }

    /// Find the content-encryption key with `secret`, leaving it in place for
    /// [`decrypt`](Self::decrypt).
    pub fn derive_from_key(&mut self, secret: &Secret<'_>) -> Result<(), CmsError> {
        if self.recipient_set()?.is_none() {
            let Secret::Key(key) = secret else {
                return Err(CmsError::InsufficientSetup(
                    "EncryptedData needs the content-encryption key".into(),
                ));
            };
            let previous = self.cek.take();
            self.set_key(key)?;
            if let Err(e) = self.decrypt() {
                warn!(error = %e, "key does not decrypt the content");
                self.cek = previous;
                return Err(CmsError::BadDecryption(
                    "Unable to perform decryption with key".into(),
                ));
            }
            return Ok(());
        }
        let candidates: Vec<RecipientInfo> = self
            .recipients()?
            .into_iter()
            .filter(|r| accepts(r, secret))
            .collect();
        self.fan_out(&candidates, secret, "Unable to perform decryption with key")
    }

    pub fn derive_from_password(&mut self, password: &[u8]) -> Result<(), CmsError> {
        let candidates: Vec<RecipientInfo> = self
            .password_recipients()?
            .into_iter()
            .map(RecipientInfo::Password)
            .collect();
        self.fan_out(
            &candidates,
            &Secret::Password(password),
            "Unable to perform decryption with password",
        )
    }

    /// Try each recipient in order until one yields a key that decrypts the
    /// content. Not constant time.
    fn fan_out(
        &mut self,
        candidates: &[RecipientInfo],
        secret: &Secret<'_>,
        failure: &str,
    ) -> Result<(), CmsError> {
        let previous = self.cek.take();
        for (index, recipient) in candidates.iter().enumerate() {
            if let Err(e) = self.unlock(recipient, secret) {
                warn!(index, error = %e, "recipient rejected the secret");
                continue;
            }
            match self.decrypt() {
                Ok(_) => {
                    debug!(index, "content-encryption key recovered");
                    return Ok(());
                }
                Err(e) => {
                    warn!(index, error = %e, "recovered key does not decrypt the content");
                    self.cek = None;
                }
            }
        }
        self.cek = previous;
        Err(CmsError::BadDecryption(failure.into()))
    }

    // -----------------------------------------------------------------------
    // Originator information and attributes
    // -----------------------------------------------------------------------

    /// Plain X.509 certificates of originatorInfo.
    pub fn certificates(&mut self) -> Result<Vec<Certificate>, CmsError> {
        let Some(set) = self.originator_set(0)? else {
            return Ok(Vec::new());
        };
        let mut certs = Vec::new();
        for node in self.tree.children(set)? {
            if self.tree.tag(node).is_universal(0x10) {
                certs.push(Certificate::from_der(&self.tree.encode(node))?);
            }
        }
        Ok(certs)
    }

    /// Add `cert` to originatorInfo unless already present. Returns whether it
    /// was added.
    pub fn add_certificate(&mut self, cert: &Certificate) -> Result<bool, CmsError> {
        if self.certificates()?.iter().any(|c| c.raw == cert.raw) {
            return Ok(false);
        }
        let set = self.ensure_originator_set(0)?;
        let node = self.tree.graft(&cert.raw)?;
        self.tree.push(set, node)?;
        self.calculate_version()?;
        Ok(true)
    }

    /// Add one `RevocationInfoChoice` to originatorInfo.
    pub fn add_crl(&mut self, der: &[u8]) -> Result<(), CmsError> {
        let set = self.ensure_originator_set(1)?;
        let node = self.tree.graft(der)?;
        self.tree.push(set, node)?;
        self.calculate_version()?;
        Ok(())
    }

    pub fn crls(&mut self) -> Result<Vec<Vec<u8>>, CmsError> {
        let Some(set) = self.originator_set(1)? else {
            return Ok(Vec::new());
        };
        let kids = self.tree.children(set)?;
        Ok(kids.into_iter().map(|k| self.tree.encode(k)).collect())
    }

    pub fn unprotected_attributes(&mut self) -> Result<Vec<Attribute>, CmsError> {
        let Some(attrs) = self.unprotected_node()? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for node in self.tree.children(attrs)? {
            out.push(Attribute::from_der(&self.tree.encode(node))?);
        }
        Ok(out)
    }

    pub fn add_unprotected_attribute(&mut self, attr: &Attribute) -> Result<(), CmsError> {
        let attrs = match self.unprotected_node()? {
            Some(node) => node,
            None => {
                let body = self.body()?;
                let node = self.tree.new_constructed(Tag::context(1, true));
                self.tree.push(body, node)?;
                node
            }
        };
        let node = self.tree.graft(&attr.to_der())?;
        self.tree.push(attrs, node)?;
        self.calculate_version()?;
        Ok(())
    }
}

fn check_key_len(cipher: CipherAlgId, key: &[u8]) -> Result<(), CmsError> {
    if key.len() != cipher.key_len() {
        return Err(CmsError::InsufficientSetup(format!(
            "{cipher:?} needs a {}-byte key, got {}",
            cipher.key_len(),
            key.len()
        )));
    }
    Ok(())
}

fn require_usage(cert: &Certificate, usage: u16, name: &str) -> Result<(), CmsError> {
    if cert.permits_any_usage(&[usage]) {
        Ok(())
    } else {
        Err(CmsError::InsufficientSetup(format!(
            "certificate key usage does not allow {name}"
        )))
    }
}

/// Whether `recipient` can make use of `secret` at all.
fn accepts(recipient: &RecipientInfo, secret: &Secret<'_>) -> bool {
    match (recipient, secret) {
        (RecipientInfo::Kek(_), Secret::Key(_)) => true,
        (RecipientInfo::Password(_), Secret::Key(_) | Secret::Password(_)) => true,
        (RecipientInfo::KeyTrans(_), Secret::PrivateKey(k)) => k.key_type() == PkeyAlgId::Rsa,
        (RecipientInfo::KeyAgree(_), Secret::PrivateKey(k)) => k.key_type() == PkeyAlgId::Ecdsa,
        _ => false,
    }
}
