//! SignedData (RFC 5652 section 5).
//!
//! ```text
//! SignedData ::= SEQUENCE {
//!     version          CMSVersion,
//!     digestAlgorithms DigestAlgorithmIdentifiers,
//!     encapContentInfo EncapsulatedContentInfo,
//!     certificates     [0] IMPLICIT CertificateSet OPTIONAL,
//!     crls             [1] IMPLICIT RevocationInfoChoices OPTIONAL,
//!     signerInfos      SignerInfos }
//! ```
//!
//! The message is edited in place on its [`Tree`]; per-signer operations go
//! through [`Signer`], a cursor borrowed from the message.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::time::{SystemTime, UNIX_EPOCH};

use cmskit_crypto::hash::{digest, digest_reader};
use cmskit_types::{CmsError, HashAlgId};
use cmskit_utils::asn1::{Encoder, Tag};
use cmskit_utils::oid::{known, Oid};
use tracing::debug;

use super::attributes::{
    content_type_attribute, message_digest_attribute, signing_time_attribute, Attribute,
    SigningCertificate,
};
use super::config::CmsConfig;
use super::signer::{signer_info_der, Signer, SignerInfo};
use super::tree::{NodeId, Tree};
use super::{body_node, content_info_tree, open_content_info, set_version, CmsContent, ContentType};
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_octet};
use crate::oid_mapping::hash_to_oid;
use crate::pkcs8::PrivateKey;
use crate::x509::{CertIdentifier, Certificate, CertificateBuilder, DistinguishedName, IdentifierKind};

const VERSION: usize = 0;
const DIGEST_ALGORITHMS: usize = 1;
const ENCAP_CONTENT_INFO: usize = 2;

/// Validity window of certificates made up for bare private keys.
const GENERATED_CERT_LIFETIME: i64 = 365 * 24 * 60 * 60;

trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A SignedData message.
pub struct SignedData {
    pub(crate) tree: Tree,
    pub(crate) config: CmsConfig,
    /// Detached content to hash when no eContent is present.
    reader: Option<Box<dyn ReadSeek>>,
}

impl fmt::Debug for SignedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedData")
            .field("config", &self.config)
            .field("encoded", &self.has_encoded())
            .field("reader", &self.reader.is_some())
            .finish()
    }
}

impl CmsContent for SignedData {
    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn config(&self) -> &CmsConfig {
        &self.config
    }

    fn content_type(&self) -> ContentType {
        ContentType::SignedData
    }

    fn compile(&mut self) -> Result<(), CmsError> {
        self.tree.realize()
    }
}

impl SignedData {
    /// A signer-less message encapsulating `content` as id-data.
    pub fn new(content: &[u8]) -> Result<Self, CmsError> {
        Self::with_config(content, CmsConfig::default())
    }

    pub fn with_config(content: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        Self::skeleton(Some(content), config)
    }

    /// A detached message whose content is read from `reader` when hashing.
    pub fn from_reader<R: Read + Seek + 'static>(
        reader: R,
        config: CmsConfig,
    ) -> Result<Self, CmsError> {
        let mut data = Self::skeleton(None, config)?;
        data.reader = Some(Box::new(reader));
        Ok(data)
    }

    fn skeleton(content: Option<&[u8]>, config: CmsConfig) -> Result<Self, CmsError> {
        let mut encap = known::id_data().to_der();
        if let Some(content) = content {
            encap.extend_from_slice(&enc_explicit_ctx(0, &enc_octet(content)));
        }
        let mut body = Encoder::new();
        body.write_uint(1)
            .write_set(&[])
            .write_sequence(&encap)
            .write_set(&[]);
        let mut seq = Encoder::new();
        seq.write_sequence(&body.finish());
        let tree = content_info_tree(ContentType::SignedData, &seq.finish())?;
        Ok(Self {
            tree,
            config,
            reader: None,
        })
    }

    /// Decode a PEM or DER SignedData message.
    pub fn load(input: &[u8]) -> Result<Self, CmsError> {
        Self::load_with(input, CmsConfig::default())
    }

    pub fn load_with(input: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let (tree, content_type) = open_content_info(input)?;
        if content_type != ContentType::SignedData {
            return Err(CmsError::UnsupportedContentType(format!(
                "expected signedData, found {content_type:?}"
            )));
        }
        Self::from_tree(tree, config)
    }

    pub(crate) fn from_tree(mut tree: Tree, config: CmsConfig) -> Result<Self, CmsError> {
        let body = body_node(&mut tree)?;
        if !tree.tag(body).is_universal(0x10) {
            return Err(CmsError::structure("SignedData is not a SEQUENCE"));
        }
        let kids = tree.children(body)?;
        if kids.len() < 4 {
            return Err(CmsError::structure("SignedData is missing fields"));
        }
        let shape = [
            (kids[VERSION], 0x02, "version"),
            (kids[DIGEST_ALGORITHMS], 0x11, "digestAlgorithms"),
            (kids[ENCAP_CONTENT_INFO], 0x10, "encapContentInfo"),
            (kids[kids.len() - 1], 0x11, "signerInfos"),
        ];
        for (node, number, what) in shape {
            if !tree.tag(node).is_universal(number) {
                return Err(CmsError::structure(format!("malformed {what}")));
            }
        }
        Ok(Self {
            tree,
            config,
            reader: None,
        })
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn body(&mut self) -> Result<NodeId, CmsError> {
        body_node(&mut self.tree)
    }

    fn field(&mut self, index: usize, what: &str) -> Result<NodeId, CmsError> {
        let body = self.body()?;
        self.tree.expect_child(body, index, what)
    }

    fn encap_node(&mut self) -> Result<NodeId, CmsError> {
        self.field(ENCAP_CONTENT_INFO, "encapContentInfo")
    }

    fn optional_set(&mut self, number: u32) -> Result<Option<NodeId>, CmsError> {
        let body = self.body()?;
        let kids = self.tree.children(body)?;
        // only fields between encapContentInfo and signerInfos
        Ok(kids
            .iter()
            .take(kids.len().saturating_sub(1))
            .skip(ENCAP_CONTENT_INFO + 1)
            .copied()
            .find(|k| self.tree.tag(*k).is_context(number)))
    }

    fn certificates_node(&mut self) -> Result<Option<NodeId>, CmsError> {
        self.optional_set(0)
    }

    fn crls_node(&mut self) -> Result<Option<NodeId>, CmsError> {
        self.optional_set(1)
    }

    pub(crate) fn signer_infos_node(&mut self) -> Result<NodeId, CmsError> {
        let body = self.body()?;
        let kids = self.tree.children(body)?;
        kids.last()
            .copied()
            .ok_or_else(|| CmsError::structure("missing signerInfos"))
    }

    pub(crate) fn signer_node(&mut self, index: usize) -> Result<NodeId, CmsError> {
        let infos = self.signer_infos_node()?;
        self.tree
            .child(infos, index)?
            .ok_or_else(|| CmsError::structure(format!("no signer at index {index}")))
    }

    /// Optional `[n] IMPLICIT` set, created empty after the preceding field
    /// when missing.
    fn ensure_optional_set(&mut self, number: u32) -> Result<NodeId, CmsError> {
        if let Some(node) = self.optional_set(number)? {
            return Ok(node);
        }
        let body = self.body()?;
        let mut index = ENCAP_CONTENT_INFO + 1;
        if number == 1 && self.certificates_node()?.is_some() {
            index += 1;
        }
        let node = self.tree.new_constructed(Tag::context(number, true));
        self.tree.insert(body, index, node)?;
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Content
    // -----------------------------------------------------------------------

    pub fn version(&mut self) -> Result<u32, CmsError> {
        let node = self.field(VERSION, "version")?;
        self.tree.uint(node)
    }

    pub fn encapsulated_content_type(&mut self) -> Result<Oid, CmsError> {
        let encap = self.encap_node()?;
        let oid = self.tree.expect_child(encap, 0, "eContentType")?;
        self.tree.oid(oid)
    }

    /// The encapsulated content, `None` when detached.
    pub fn content(&mut self) -> Result<Option<Vec<u8>>, CmsError> {
        let encap = self.encap_node()?;
        let Some(explicit) = self.tree.child(encap, 1)? else {
            return Ok(None);
        };
        let octets = self.tree.expect_child(explicit, 0, "eContent")?;
        Ok(Some(self.tree.octets(octets)?))
    }

    pub fn is_detached(&mut self) -> Result<bool, CmsError> {
        let encap = self.encap_node()?;
        Ok(self.tree.child(encap, 1)?.is_none())
    }

    /// Embed `data` as the encapsulated content, replacing any reader.
    pub fn attach(&mut self, data: &[u8]) -> Result<(), CmsError> {
        let encap = self.encap_node()?;
        let fresh = self.tree.graft(&enc_explicit_ctx(0, &enc_octet(data)))?;
        match self.tree.child(encap, 1)? {
            Some(old) => self.tree.replace(old, fresh)?,
            None => self.tree.push(encap, fresh)?,
        }
        self.reader = None;
        Ok(())
    }

    /// Keep the message detached and hash `reader` instead.
    pub fn attach_reader<R: Read + Seek + 'static>(&mut self, reader: R) -> Result<(), CmsError> {
        self.remove_econtent()?;
        self.reader = Some(Box::new(reader));
        Ok(())
    }

    /// Drop the encapsulated content and any attached reader.
    pub fn detach(&mut self) -> Result<(), CmsError> {
        self.remove_econtent()?;
        self.reader = None;
        Ok(())
    }

    fn remove_econtent(&mut self) -> Result<(), CmsError> {
        let encap = self.encap_node()?;
        if self.tree.child(encap, 1)?.is_some() {
            self.tree.remove(encap, 1)?;
        }
        Ok(())
    }

    /// Digest of the content: eContent first, then the attached reader.
    pub fn content_digest(&mut self, hash: HashAlgId) -> Result<Vec<u8>, CmsError> {
        if let Some(content) = self.content()? {
            return Ok(digest(hash, &content));
        }
        match self.reader.as_mut() {
            Some(reader) => {
                reader
                    .seek(SeekFrom::Start(0))
                    .map_err(|e| CmsError::InsufficientSetup(e.to_string()))?;
                digest_reader(hash, reader.as_mut())
                    .map_err(|e| CmsError::InsufficientSetup(e.to_string()))
            }
            None => Err(CmsError::InsufficientSetup("there is nothing to hash".into())),
        }
    }

    /// The content bytes, read from the reader when detached.
    pub(crate) fn content_bytes(&mut self) -> Result<Vec<u8>, CmsError> {
        if let Some(content) = self.content()? {
            return Ok(content);
        }
        match self.reader.as_mut() {
            Some(reader) => {
                let mut buf = Vec::new();
                reader
                    .seek(SeekFrom::Start(0))
                    .and_then(|_| reader.read_to_end(&mut buf))
                    .map_err(|e| CmsError::InsufficientSetup(e.to_string()))?;
                Ok(buf)
            }
            None => Err(CmsError::InsufficientSetup("there is nothing to sign".into())),
        }
    }

    // -----------------------------------------------------------------------
    // Certificates and CRLs
    // -----------------------------------------------------------------------

    /// Plain X.509 certificates of the `certificates` set.
    pub fn certificates(&mut self) -> Result<Vec<Certificate>, CmsError> {
        let Some(set) = self.certificates_node()? else {
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

    /// Add `cert` unless an identical certificate is present. Returns whether
    /// it was added.
    pub fn add_certificate(&mut self, cert: &Certificate) -> Result<bool, CmsError> {
        if self.certificates()?.iter().any(|c| c.raw == cert.raw) {
            return Ok(false);
        }
        let set = self.ensure_optional_set(0)?;
        let node = self.tree.graft(&cert.raw)?;
        self.tree.push(set, node)?;
        self.update_version()?;
        Ok(true)
    }

    /// Replace the certificate encoded as `old` with `new`.
    pub(crate) fn replace_certificate(
        &mut self,
        old: &Certificate,
        new: &Certificate,
    ) -> Result<(), CmsError> {
        let Some(set) = self.certificates_node()? else {
            return Err(CmsError::structure("no certificates to replace"));
        };
        for node in self.tree.children(set)? {
            if self.tree.encode(node) == old.raw {
                let fresh = self.tree.graft(&new.raw)?;
                return self.tree.replace(node, fresh);
            }
        }
        Err(CmsError::structure("certificate not found"))
    }

    /// Add one `RevocationInfoChoice` (a DER CRL or `[1] other`).
    pub fn add_crl(&mut self, der: &[u8]) -> Result<(), CmsError> {
        let set = self.ensure_optional_set(1)?;
        let node = self.tree.graft(der)?;
        self.tree.push(set, node)?;
        self.update_version()
    }

    /// Encoded revocation entries.
    pub fn crls(&mut self) -> Result<Vec<Vec<u8>>, CmsError> {
        let Some(set) = self.crls_node()? else {
            return Ok(Vec::new());
        };
        let kids = self.tree.children(set)?;
        Ok(kids.into_iter().map(|k| self.tree.encode(k)).collect())
    }

    // -----------------------------------------------------------------------
    // Signers
    // -----------------------------------------------------------------------

    pub fn signer_count(&mut self) -> Result<usize, CmsError> {
        let infos = self.signer_infos_node()?;
        Ok(self.tree.children(infos)?.len())
    }

    /// Cursor over the signer at `index`.
    pub fn signer(&mut self, index: usize) -> Result<Signer<'_>, CmsError> {
        self.signer_node(index)?;
        Ok(Signer::new(self, index))
    }

    /// Snapshots of every signer with its resolved certificate.
    pub fn signers(&mut self) -> Result<Vec<SignerInfo>, CmsError> {
        let mut out = Vec::new();
        for index in 0..self.signer_count()? {
            let node = self.signer_node(index)?;
            let mut info = SignerInfo::from_der(&self.tree.encode(node))?;
            info.certificate = self.signer(index)?.certificate()?;
            out.push(info);
        }
        Ok(out)
    }

    /// First signer that `cert` may have produced.
    pub fn find_signer(&mut self, cert: &Certificate) -> Result<Option<Signer<'_>>, CmsError> {
        let mut found = None;
        for index in 0..self.signer_count()? {
            if self.signer(index)?.matches_certificate(cert)? {
                found = Some(index);
                break;
            }
        }
        match found {
            Some(index) => Ok(Some(self.signer(index)?)),
            None => Ok(None),
        }
    }

    /// Add a signer with contentType, messageDigest and signingTime signed
    /// attributes, identified per the configured identifier kind.
    pub fn add_signer(&mut self, cert: &Certificate) -> Result<Signer<'_>, CmsError> {
        let kind = self.config.signer_identifier;
        let attrs = self.base_attributes()?;
        self.append_signer(cert, kind, Some(attrs))
    }

    /// Like [`add_signer`](Self::add_signer) plus an ESS
    /// signingCertificateV2 attribute binding `cert`.
    pub fn add_ess_signer(&mut self, cert: &Certificate) -> Result<Signer<'_>, CmsError> {
        let kind = self.config.signer_identifier;
        let mut attrs = self.base_attributes()?;
        attrs.push(SigningCertificate::for_certificate(cert).to_attribute());
        self.append_signer(cert, kind, Some(attrs))
    }

    /// A signer without signed attributes; the signature covers the content.
    ///
    /// RFC 5652 section 5.3 requires signed attributes for any eContentType
    /// other than id-data, so other content types are refused.
    pub fn add_naked_signer(
        &mut self,
        cert: &Certificate,
        kind: IdentifierKind,
    ) -> Result<Signer<'_>, CmsError> {
        let content_type = self.encapsulated_content_type()?;
        if content_type != known::id_data() {
            return Err(CmsError::InsufficientSetup(format!(
                "a signer without signed attributes needs id-data content, found {content_type}"
            )));
        }
        self.append_signer(cert, kind, None)
    }

    fn base_attributes(&mut self) -> Result<Vec<Attribute>, CmsError> {
        let content_type = self.encapsulated_content_type()?;
        let md = match self.content_digest(self.config.digest) {
            Ok(md) => md,
            // filled in when signing
            Err(CmsError::InsufficientSetup(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(vec![
            content_type_attribute(&content_type),
            message_digest_attribute(&md),
            signing_time_attribute(unix_now()),
        ])
    }

    fn append_signer(
        &mut self,
        cert: &Certificate,
        kind: IdentifierKind,
        attrs: Option<Vec<Attribute>>,
    ) -> Result<Signer<'_>, CmsError> {
        let id = CertIdentifier::from_certificate(cert, kind)?;
        let der = signer_info_der(&id, self.config.digest, attrs.as_deref());
        self.add_certificate(cert)?;
        let index = self.push_signer_info(&der)?;
        debug!(index, ?kind, digest = self.config.digest.name(), "added signer");
        Ok(Signer::new(self, index))
    }

    fn push_signer_info(&mut self, der: &[u8]) -> Result<usize, CmsError> {
        let infos = self.signer_infos_node()?;
        let node = self.tree.graft(der)?;
        self.tree.push(infos, node)?;
        self.recalculate_hash_algorithms()?;
        self.update_version()?;
        Ok(self.tree.children(infos)?.len() - 1)
    }

    /// Append a signer taken from another message, with its certificate.
    pub fn add_signature(&mut self, signer: &SignerInfo) -> Result<Signer<'_>, CmsError> {
        if let Some(cert) = &signer.certificate {
            self.add_certificate(cert)?;
        }
        let index = self.push_signer_info(signer.raw())?;
        Ok(Signer::new(self, index))
    }

    /// Rebuild `digestAlgorithms` from the distinct signer digests.
    pub fn recalculate_hash_algorithms(&mut self) -> Result<(), CmsError> {
        let infos = self.signer_infos_node()?;
        let mut wanted: Vec<Oid> = Vec::new();
        for signer in self.tree.children(infos)? {
            let alg = self.tree.expect_child(signer, 2, "digestAlgorithm")?;
            let oid_node = self.tree.expect_child(alg, 0, "digest algorithm")?;
            let oid = self.tree.oid(oid_node)?;
            if !wanted.contains(&oid) {
                wanted.push(oid);
            }
        }

        let set = self.field(DIGEST_ALGORITHMS, "digestAlgorithms")?;
        let mut current = Vec::new();
        for alg in self.tree.children(set)? {
            let oid_node = self.tree.expect_child(alg, 0, "digest algorithm")?;
            current.push(self.tree.oid(oid_node)?);
        }
        if current.len() == wanted.len() && wanted.iter().all(|o| current.contains(o)) {
            return Ok(());
        }

        let members: Vec<Vec<u8>> = wanted.iter().map(|o| enc_alg_id(o, None)).collect();
        let mut enc = Encoder::new();
        enc.write_set_of(&members);
        let fresh = self.tree.graft(&enc.finish())?;
        self.tree.replace(set, fresh)
    }

    /// Recompute the version from the message shape (RFC 5652 section 5.1).
    pub(crate) fn update_version(&mut self) -> Result<(), CmsError> {
        let mut version = 1;
        if let Some(certs) = self.certificates_node()? {
            for node in self.tree.children(certs)? {
                let tag = self.tree.tag(node);
                let v = if tag.is_context(3) {
                    5
                } else if tag.is_context(2) {
                    4
                } else if tag.is_context(1) {
                    3
                } else {
                    1
                };
                version = version.max(v);
            }
        }
        if let Some(crls) = self.crls_node()? {
            for node in self.tree.children(crls)? {
                if self.tree.tag(node).is_context(1) {
                    version = version.max(5);
                }
            }
        }
        let infos = self.signer_infos_node()?;
        for signer in self.tree.children(infos)? {
            let sid = self.tree.expect_child(signer, 1, "sid")?;
            if self.tree.tag(sid).is_context(0) {
                version = version.max(3);
            }
        }
        if self.encapsulated_content_type()? != known::id_data() {
            version = version.max(3);
        }

        let node = self.field(VERSION, "version")?;
        if self.tree.uint(node)? != version {
            debug!(version, "SignedData version changed");
        }
        set_version(&mut self.tree, node, version)
    }

    // -----------------------------------------------------------------------
    // Signing and validation
    // -----------------------------------------------------------------------

    /// Validate every signer. A message without signers does not validate.
    pub fn validate_signature(&mut self, check_ca: bool) -> Result<bool, CmsError> {
        let count = self.signer_count()?;
        if count == 0 {
            return Ok(false);
        }
        for index in 0..count {
            if !self.signer(index)?.validate_signature(check_ca)? {
                debug!(index, "signer failed validation");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Sign with `key`, using the signer whose certificate carries its
    /// public key. Without any signer a self-signed certificate is made up
    /// for the key and an ESS signer is added.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<(), CmsError> {
        let mut target = None;
        for index in 0..self.signer_count()? {
            let cert = self.signer(index)?.certificate_for_key(key)?;
            if cert.is_some() {
                target = Some(index);
                break;
            }
        }
        let index = match target {
            Some(index) => index,
            None if self.signer_count()? == 0 => {
                let cert = self_signed_for(key)?;
                self.add_ess_signer(&cert)?.index()
            }
            None => {
                return Err(CmsError::InsufficientSetup(
                    "no signer certificate matches the private key".into(),
                ))
            }
        };
        self.signer(index)?.sign(key)
    }

    /// Sign with `key` as the signer for `cert`, adding an ESS signer when
    /// none exists yet.
    pub fn sign_with_certificate(
        &mut self,
        key: &PrivateKey,
        cert: &Certificate,
    ) -> Result<(), CmsError> {
        if !key.matches_public_key(&cert.public_key) {
            return Err(CmsError::InsufficientSetup(
                "certificate does not carry the private key's public half".into(),
            ));
        }
        let existing = self.find_signer(cert)?.map(|s| s.index());
        let index = match existing {
            Some(index) => index,
            None => self.add_ess_signer(cert)?.index(),
        };
        self.signer(index)?.sign(key)
    }

    /// Add an ESS signer for `cert`.
    pub fn copy_signing_x509_attributes(
        &mut self,
        cert: &Certificate,
    ) -> Result<Signer<'_>, CmsError> {
        self.add_ess_signer(cert)
    }
}

/// Self-signed certificate with digitalSignature usage for a bare key.
pub(crate) fn self_signed_for(key: &PrivateKey) -> Result<Certificate, CmsError> {
    let now = unix_now();
    let cert = CertificateBuilder::self_signed(
        DistinguishedName::new(&[("CN", "cmskit signer")]),
        key,
        now,
        now + GENERATED_CERT_LIFETIME,
    )?;
    Ok(cert)
}

/// Digest OID for `hash` as an AlgorithmIdentifier without parameters.
pub(crate) fn digest_algorithm_der(hash: HashAlgId) -> Vec<u8> {
    enc_alg_id(&hash_to_oid(hash), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::load;
    use cmskit_types::EccCurveId;
    use std::io::Cursor;

    const EC_CERT: &str = include_str!("../../../../tests/data/ec_p256.crt");
    const EC_KEY: &str = include_str!("../../../../tests/data/ec_p256.pem");
    const EC384_CERT: &str = include_str!("../../../../tests/data/ec_p384.crt");
    const EC384_KEY: &str = include_str!("../../../../tests/data/ec_p384.pem");
    const RSA_CERT: &str = include_str!("../../../../tests/data/rsa2048.crt");
    const RSA_KEY: &str = include_str!("../../../../tests/data/rsa2048.pem");

    fn ec() -> (Certificate, PrivateKey) {
        (
            Certificate::from_pem(EC_CERT).unwrap(),
            PrivateKey::from_pem(EC_KEY).unwrap(),
        )
    }

    #[test]
    fn test_skeleton_shape() {
        let mut sd = SignedData::new(b"hello, world!").unwrap();
        assert_eq!(sd.version().unwrap(), 1);
        assert_eq!(sd.encapsulated_content_type().unwrap(), known::id_data());
        assert_eq!(sd.content().unwrap().unwrap(), b"hello, world!");
        assert_eq!(sd.signer_count().unwrap(), 0);
        assert!(sd.certificates().unwrap().is_empty());
        assert!(!sd.validate_signature(false).unwrap());

        let mut again = SignedData::load(sd.to_pem().as_bytes()).unwrap();
        assert_eq!(again.to_der(), sd.to_der());
        assert!(again.has_encoded());
    }

    #[test]
    fn test_sign_with_generated_certificate() {
        // scenario: self-signed EC ESS signer, flipped signature byte fails
        let key = PrivateKey::generate_ec(EccCurveId::NistP256);
        let mut sd = SignedData::new(b"hello, world!").unwrap();
        sd.sign(&key).unwrap();
        assert_eq!(sd.signer_count().unwrap(), 1);
        assert_eq!(sd.certificates().unwrap().len(), 1);
        assert!(sd.validate_signature(false).unwrap());
        assert!(sd.validate_signature(true).unwrap());

        let mut loaded = SignedData::load(&sd.to_der()).unwrap();
        assert!(loaded.validate_signature(false).unwrap());

        let mut signature = loaded.signer(0).unwrap().signature().unwrap();
        let last = signature.len() - 1;
        signature[last] ^= 0x01;
        loaded.signer(0).unwrap().set_signature(&signature).unwrap();
        assert!(!loaded.validate_signature(false).unwrap());
    }

    #[test]
    fn test_sign_with_certificate_rsa() {
        let cert = Certificate::from_pem(RSA_CERT).unwrap();
        let key = PrivateKey::from_pem(RSA_KEY).unwrap();
        let mut sd = SignedData::new(b"rsa content").unwrap();
        sd.sign_with_certificate(&key, &cert).unwrap();
        assert!(sd.validate_signature(false).unwrap());

        let info = &sd.signers().unwrap()[0];
        assert_eq!(info.version, 1);
        assert_eq!(info.signature_algorithm, known::sha256_with_rsa_encryption());
        assert_eq!(info.certificate.as_ref().unwrap().raw, cert.raw);

        let (_, ec_key) = ec();
        assert!(sd.sign_with_certificate(&ec_key, &cert).is_err());
    }

    fn issue(
        ca_key: &PrivateKey,
        ca: &Certificate,
        subject: &str,
        key: &PrivateKey,
    ) -> Certificate {
        CertificateBuilder::new()
            .serial_number(&[0x22])
            .issuer(ca.subject.clone())
            .subject(DistinguishedName::new(&[("CN", subject)]))
            .validity(1_700_000_000, 1_900_000_000)
            .subject_public_key(key.public_key_info().unwrap())
            .build(ca_key)
            .unwrap()
    }

    #[test]
    fn test_check_ca_requires_usable_issuer() {
        let ca_key = PrivateKey::generate_ec(EccCurveId::NistP256);
        let ca_name = DistinguishedName::new(&[("CN", "cmskit test ca")]);
        let ca = CertificateBuilder::self_signed(ca_name.clone(), &ca_key, 1_700_000_000, 1_900_000_000)
            .unwrap();
        let leaf_key = PrivateKey::generate_ec(EccCurveId::NistP256);
        let leaf = issue(&ca_key, &ca, "leaf", &leaf_key);

        let mut sd = SignedData::new(b"chained").unwrap();
        sd.sign_with_certificate(&leaf_key, &leaf).unwrap();
        assert!(sd.validate_signature(false).unwrap());
        // the issuer is not in the message yet
        assert!(!sd.validate_signature(true).unwrap());
        assert!(sd.add_certificate(&ca).unwrap());
        assert!(sd.validate_signature(true).unwrap());

        // same CA name, but a public key that is not a curve point
        let mut broken_spki = ca_key.public_key_info().unwrap();
        broken_spki.public_key = vec![0x04, 0x01, 0x02, 0x03];
        let broken_ca = CertificateBuilder::new()
            .serial_number(&[0x21])
            .issuer(ca_name.clone())
            .subject(ca_name)
            .validity(1_700_000_000, 1_900_000_000)
            .subject_public_key(broken_spki)
            .add_basic_constraints(true, None)
            .build(&ca_key)
            .unwrap();
        assert!(leaf.verify_signature(&broken_ca).is_err());

        let mut sd = SignedData::new(b"chained").unwrap();
        sd.sign_with_certificate(&leaf_key, &leaf).unwrap();
        sd.add_certificate(&broken_ca).unwrap();
        assert!(sd.validate_signature(false).unwrap());
        assert!(!sd.validate_signature(true).unwrap());
    }

    #[test]
    fn test_multi_signer_independence() {
        let (cert, key) = ec();
        let cert384 = Certificate::from_pem(EC384_CERT).unwrap();
        let key384 = PrivateKey::from_pem(EC384_KEY).unwrap();

        let mut sd = SignedData::new(b"two signers").unwrap();
        sd.sign_with_certificate(&key, &cert).unwrap();
        sd.sign_with_certificate(&key384, &cert384).unwrap();
        assert_eq!(sd.signer_count().unwrap(), 2);
        assert!(sd.validate_signature(false).unwrap());
        assert!(sd.signer(0).unwrap().validate_signature(false).unwrap());

        // both digests are listed
        let infos = sd.signers().unwrap();
        assert_eq!(infos[0].digest_algorithm, known::sha256());
        assert_eq!(infos[1].digest_algorithm, known::sha384());
        let mut loaded = SignedData::load(&sd.to_der()).unwrap();
        let set = loaded.field(DIGEST_ALGORITHMS, "digestAlgorithms").unwrap();
        assert_eq!(loaded.tree.children(set).unwrap().len(), 2);

        // breaking one signer fails the message but not the other signer
        let mut sig = loaded.signer(1).unwrap().signature().unwrap();
        sig[10] ^= 0xff;
        loaded.signer(1).unwrap().set_signature(&sig).unwrap();
        assert!(!loaded.validate_signature(false).unwrap());
        assert!(loaded.signer(0).unwrap().validate_signature(false).unwrap());
    }

    #[test]
    fn test_detached_attached_equivalence() {
        let (cert, key) = ec();
        let mut sd = SignedData::new(b"detach me").unwrap();
        sd.sign_with_certificate(&key, &cert).unwrap();
        sd.detach().unwrap();
        assert!(sd.is_detached().unwrap());

        let mut loaded = SignedData::load(&sd.to_der()).unwrap();
        assert!(matches!(
            loaded.validate_signature(false).unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
        loaded.attach(b"detach me").unwrap();
        assert!(loaded.validate_signature(false).unwrap());
        loaded.attach(b"detach you").unwrap();
        assert!(!loaded.validate_signature(false).unwrap());

        loaded.attach_reader(Cursor::new(b"detach me".to_vec())).unwrap();
        assert!(loaded.is_detached().unwrap());
        assert!(loaded.validate_signature(false).unwrap());
    }

    #[test]
    fn test_sign_from_reader() {
        let (cert, key) = ec();
        let mut sd =
            SignedData::from_reader(Cursor::new(b"streamed".to_vec()), CmsConfig::default())
                .unwrap();
        sd.sign_with_certificate(&key, &cert).unwrap();
        assert!(sd.is_detached().unwrap());
        assert!(sd.validate_signature(false).unwrap());

        let mut loaded = SignedData::load(&sd.to_der()).unwrap();
        loaded.attach(b"streamed").unwrap();
        assert!(loaded.validate_signature(false).unwrap());
    }

    #[test]
    fn test_naked_signer_signs_content() {
        let (cert, key) = ec();
        let mut sd = SignedData::new(b"naked").unwrap();
        sd.add_naked_signer(&cert, IdentifierKind::SubjectKeyIdentifier)
            .unwrap();
        sd.sign(&key).unwrap();
        assert_eq!(sd.version().unwrap(), 3);
        let info = &sd.signers().unwrap()[0];
        assert_eq!(info.version, 3);
        assert!(info.signed_attributes.is_none());
        assert!(sd.validate_signature(false).unwrap());
    }

    #[test]
    fn test_naked_signer_needs_id_data() {
        let (cert, _) = ec();
        let mut sd = SignedData::new(b"not a plain payload").unwrap();
        let encap = sd.encap_node().unwrap();
        let oid = sd.tree.expect_child(encap, 0, "eContentType").unwrap();
        sd.tree
            .set_content(oid, known::id_ct_tst_info().to_der_value())
            .unwrap();

        let mut loaded = SignedData::load(&sd.to_der()).unwrap();
        assert_eq!(loaded.encapsulated_content_type().unwrap(), known::id_ct_tst_info());
        assert!(matches!(
            loaded
                .add_naked_signer(&cert, IdentifierKind::IssuerAndSerialNumber)
                .unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
        assert_eq!(loaded.signer_count().unwrap(), 0);
        assert!(loaded.certificates().unwrap().is_empty());

        // signed attributes make the same content type acceptable
        loaded.add_signer(&cert).unwrap();
        assert_eq!(loaded.signer_count().unwrap(), 1);
    }

    #[test]
    fn test_certificates_deduplicated_and_crls() {
        let (cert, _) = ec();
        let mut sd = SignedData::new(b"x").unwrap();
        assert!(sd.add_certificate(&cert).unwrap());
        assert!(!sd.add_certificate(&cert).unwrap());
        assert_eq!(sd.certificates().unwrap().len(), 1);
        assert_eq!(sd.version().unwrap(), 1);

        // [1] other revocation info bumps the version to 5
        sd.add_crl(&hex::decode("a1080603550403 0401 00".replace(' ', "")).unwrap())
            .unwrap();
        assert_eq!(sd.crls().unwrap().len(), 1);
        assert_eq!(sd.version().unwrap(), 5);

        let mut loaded = SignedData::load(&sd.to_der()).unwrap();
        assert_eq!(loaded.certificates().unwrap()[0].raw, cert.raw);
        assert_eq!(loaded.crls().unwrap().len(), 1);
    }

    #[test]
    fn test_add_signature_from_other_message() {
        let (cert, key) = ec();
        let cert384 = Certificate::from_pem(EC384_CERT).unwrap();
        let key384 = PrivateKey::from_pem(EC384_KEY).unwrap();

        let mut first = SignedData::new(b"shared").unwrap();
        first.sign_with_certificate(&key, &cert).unwrap();
        let mut second = SignedData::new(b"shared").unwrap();
        second.sign_with_certificate(&key384, &cert384).unwrap();

        let theirs = second.signers().unwrap().remove(0);
        first.add_signature(&theirs).unwrap();
        assert_eq!(first.signer_count().unwrap(), 2);
        assert_eq!(first.certificates().unwrap().len(), 2);
        assert!(first.validate_signature(false).unwrap());
    }

    #[test]
    fn test_nothing_to_hash() {
        let mut sd = SignedData::new(b"").unwrap();
        sd.detach().unwrap();
        assert!(matches!(
            sd.content_digest(HashAlgId::Sha256).unwrap_err(),
            CmsError::InsufficientSetup(_)
        ));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let (cert, key) = ec();
        let mut sd = SignedData::new(b"compile").unwrap();
        sd.sign_with_certificate(&key, &cert).unwrap();
        assert!(!sd.has_encoded());
        sd.compile().unwrap();
        let first = sd.to_der();
        sd.compile().unwrap();
        assert_eq!(sd.to_der(), first);
        assert!(sd.has_encoded());

        match load(&first).unwrap() {
            crate::cms::CmsMessage::Signed(mut m) => assert!(m.validate_signature(false).unwrap()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_load_rejects_other_types() {
        let digested = crate::cms::DigestedData::new(b"x", HashAlgId::Sha256).unwrap();
        assert!(matches!(
            SignedData::load(&digested.to_der()).unwrap_err(),
            CmsError::UnsupportedContentType(_)
        ));
    }
}
