//! SignerInfo access and signing.
//!
//! ```text
//! SignerInfo ::= SEQUENCE {
//!     version            CMSVersion,
//!     sid                SignerIdentifier,
//!     digestAlgorithm    DigestAlgorithmIdentifier,
//!     signedAttrs        [0] IMPLICIT SignedAttributes OPTIONAL,
//!     signatureAlgorithm SignatureAlgorithmIdentifier,
//!     signature          SignatureValue,
//!     unsignedAttrs      [1] IMPLICIT UnsignedAttributes OPTIONAL }
//! ```

use cmskit_crypto::hash::digest;
use cmskit_types::{CmsError, HashAlgId};
use cmskit_utils::asn1::{tags, Decoder, Encoder, Tag};
use cmskit_utils::oid::{known, Oid};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::attributes::{
    message_digest_attribute, parse_message_digest, Attribute, EssCertId, SigningCertificate,
    SmimeCapability,
};
use super::set_version;
use super::signed::{digest_algorithm_der, SignedData};
use super::tree::{NodeId, Tree};
use crate::encoding::{enc_alg_id, enc_seq};
use crate::oid_mapping::{hash_to_oid, oid_to_hash, signature_oid_parts};
use crate::pkcs8::PrivateKey;
use crate::x509::{verify_digest_signature, CertIdentifier, Certificate, IdentifierKind, KeyUsage};

const SIGNING_USAGES: [u16; 2] = [KeyUsage::DIGITAL_SIGNATURE, KeyUsage::NON_REPUDIATION];

/// DER of a fresh SignerInfo with a placeholder signature algorithm and an
/// empty signature.
pub(crate) fn signer_info_der(
    id: &CertIdentifier,
    hash: HashAlgId,
    signed_attrs: Option<&[Attribute]>,
) -> Vec<u8> {
    let version = match id.kind() {
        IdentifierKind::IssuerAndSerialNumber => 1,
        IdentifierKind::SubjectKeyIdentifier => 3,
    };
    let mut body = Encoder::new();
    body.write_uint(version)
        .write_raw(&id.to_der())
        .write_raw(&digest_algorithm_der(hash));
    if let Some(attrs) = signed_attrs {
        let mut members: Vec<Vec<u8>> = attrs.iter().map(Attribute::to_der).collect();
        members.sort();
        body.write_context_specific(0, true, &members.concat());
    }
    // 0.0 until a key is known
    body.write_raw(&enc_alg_id(&Oid::new(&[0, 0]), None))
        .write_octet_string(&[]);
    enc_seq(&body.finish())
}

fn decode_attributes(set: &[u8]) -> Result<Vec<Attribute>, CmsError> {
    let mut dec = Decoder::new(set);
    let mut attrs = Vec::new();
    while !dec.is_empty() {
        attrs.push(Attribute::from_der(dec.read_tlv()?.raw)?);
    }
    Ok(attrs)
}

/// Owned snapshot of one SignerInfo.
#[derive(Debug, Clone)]
pub struct SignerInfo {
    pub version: u32,
    pub identifier: CertIdentifier,
    pub digest_algorithm: Oid,
    pub signed_attributes: Option<Vec<Attribute>>,
    pub signature_algorithm: Oid,
    pub signature: Vec<u8>,
    pub unsigned_attributes: Option<Vec<Attribute>>,
    /// Certificate found for this signer in its message, if any.
    pub certificate: Option<Certificate>,
    raw: Vec<u8>,
}

impl SignerInfo {
    pub fn from_der(der: &[u8]) -> Result<Self, CmsError> {
        let mut outer = Decoder::new(der);
        let mut seq = outer.read_sequence()?;
        let version = seq.read_u32()?;
        let identifier = CertIdentifier::decode(&mut seq)?;
        let mut alg = seq.read_sequence()?;
        let digest_algorithm = Oid::from_der_value(alg.read_oid()?)?;

        let signed_attributes = match seq.try_read_context_specific(0, true)? {
            Some(tlv) => Some(decode_attributes(tlv.value)?),
            None => None,
        };
        let mut alg = seq.read_sequence()?;
        let signature_algorithm = Oid::from_der_value(alg.read_oid()?)?;
        let signature = seq.read_octets()?;
        let unsigned_attributes = match seq.try_read_context_specific(1, true)? {
            Some(tlv) => Some(decode_attributes(tlv.value)?),
            None => None,
        };
        Ok(Self {
            version,
            identifier,
            digest_algorithm,
            signed_attributes,
            signature_algorithm,
            signature,
            unsigned_attributes,
            certificate: None,
            raw: der.to_vec(),
        })
    }

    /// The SignerInfo encoding this snapshot was taken from.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn digest(&self) -> Option<HashAlgId> {
        oid_to_hash(&self.digest_algorithm)
    }
}

/// Positions of the optional SignerInfo fields.
struct Layout {
    node: NodeId,
    fields: Vec<NodeId>,
    signed_attrs: Option<NodeId>,
    signature_algorithm: NodeId,
    signature: NodeId,
    unsigned_attrs: Option<NodeId>,
}

/// Cursor over one signer of a [`SignedData`].
#[derive(Debug)]
pub struct Signer<'a> {
    data: &'a mut SignedData,
    index: usize,
}

impl<'a> Signer<'a> {
    pub(crate) fn new(data: &'a mut SignedData, index: usize) -> Self {
        Self { data, index }
    }

    /// Position in `signerInfos`.
    pub fn index(&self) -> usize {
        self.index
    }

    fn tree(&mut self) -> &mut Tree {
        &mut self.data.tree
    }

    fn layout(&mut self) -> Result<Layout, CmsError> {
        let node = self.data.signer_node(self.index)?;
        let tree = self.tree();
        let fields = tree.children(node)?;
        if fields.len() < 5 {
            return Err(CmsError::structure("SignerInfo is missing fields"));
        }
        let (signed_attrs, next) = if tree.tag(fields[3]).is_context(0) {
            (Some(fields[3]), 4)
        } else {
            (None, 3)
        };
        let signature_algorithm = *fields
            .get(next)
            .ok_or_else(|| CmsError::structure("missing signatureAlgorithm"))?;
        let signature = *fields
            .get(next + 1)
            .ok_or_else(|| CmsError::structure("missing signature"))?;
        let unsigned_attrs = fields
            .get(next + 2)
            .copied()
            .filter(|n| tree.tag(*n).is_context(1));
        Ok(Layout {
            node,
            fields,
            signed_attrs,
            signature_algorithm,
            signature,
            unsigned_attrs,
        })
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    pub fn version(&mut self) -> Result<u32, CmsError> {
        let layout = self.layout()?;
        self.tree().uint(layout.fields[0])
    }

    pub fn identifier(&mut self) -> Result<CertIdentifier, CmsError> {
        let layout = self.layout()?;
        let der = self.tree().encode(layout.fields[1]);
        Ok(CertIdentifier::decode(&mut Decoder::new(&der))?)
    }

    pub fn digest_algorithm(&mut self) -> Result<HashAlgId, CmsError> {
        let layout = self.layout()?;
        let tree = self.tree();
        let oid_node = tree.expect_child(layout.fields[2], 0, "digest algorithm")?;
        let oid = tree.oid(oid_node)?;
        oid_to_hash(&oid).ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("digest {oid}")))
    }

    pub fn signature_algorithm(&mut self) -> Result<Oid, CmsError> {
        let layout = self.layout()?;
        let tree = self.tree();
        let oid_node = tree.expect_child(layout.signature_algorithm, 0, "signature algorithm")?;
        tree.oid(oid_node)
    }

    pub fn signature(&mut self) -> Result<Vec<u8>, CmsError> {
        let layout = self.layout()?;
        self.tree().octets(layout.signature)
    }

    pub fn set_signature(&mut self, signature: &[u8]) -> Result<(), CmsError> {
        let layout = self.layout()?;
        let tree = self.tree();
        let mut enc = Encoder::new();
        enc.write_octet_string(signature);
        let fresh = tree.graft(&enc.finish())?;
        tree.replace(layout.signature, fresh)
    }

    // -----------------------------------------------------------------------
    // Attributes
    // -----------------------------------------------------------------------

    fn attribute_set(&mut self, signed: bool, create: bool) -> Result<Option<NodeId>, CmsError> {
        let layout = self.layout()?;
        let existing = if signed {
            layout.signed_attrs
        } else {
            layout.unsigned_attrs
        };
        if existing.is_some() || !create {
            return Ok(existing);
        }
        let tree = self.tree();
        let set = tree.new_constructed(Tag::context(u32::from(!signed), true));
        if signed {
            tree.insert(layout.node, 3, set)?;
        } else {
            tree.push(layout.node, set)?;
        }
        Ok(Some(set))
    }

    fn attributes(&mut self, signed: bool) -> Result<Vec<Attribute>, CmsError> {
        let Some(set) = self.attribute_set(signed, false)? else {
            return Ok(Vec::new());
        };
        let tree = self.tree();
        let mut attrs = Vec::new();
        for node in tree.children(set)? {
            attrs.push(Attribute::from_der(&tree.encode(node))?);
        }
        Ok(attrs)
    }

    fn attribute(&mut self, signed: bool, oid: &Oid) -> Result<Option<Attribute>, CmsError> {
        Ok(self.attributes(signed)?.into_iter().find(|a| a.oid == *oid))
    }

    /// Replace the attribute of the same type, or append it.
    fn set_attribute(&mut self, signed: bool, attr: &Attribute) -> Result<(), CmsError> {
        let set = self
            .attribute_set(signed, true)?
            .ok_or_else(|| CmsError::structure("attribute set unavailable"))?;
        let tree = self.tree();
        let fresh = tree.graft(&attr.to_der())?;
        let mut existing = None;
        for node in tree.children(set)? {
            let oid_node = tree.expect_child(node, 0, "attrType")?;
            if tree.oid(oid_node)? == attr.oid {
                existing = Some(node);
                break;
            }
        }
        match existing {
            Some(old) => tree.replace(old, fresh)?,
            None => tree.push(set, fresh)?,
        }
        tree.sort_children(set)
    }

    pub fn has_signed_attributes(&mut self) -> Result<bool, CmsError> {
        Ok(self.layout()?.signed_attrs.is_some())
    }

    pub fn signed_attributes(&mut self) -> Result<Vec<Attribute>, CmsError> {
        self.attributes(true)
    }

    pub fn has_signed_attribute(&mut self, oid: &Oid) -> Result<bool, CmsError> {
        Ok(self.attribute(true, oid)?.is_some())
    }

    pub fn signed_attribute(&mut self, oid: &Oid) -> Result<Option<Attribute>, CmsError> {
        self.attribute(true, oid)
    }

    pub fn set_signed_attribute(&mut self, attr: &Attribute) -> Result<(), CmsError> {
        self.set_attribute(true, attr)
    }

    pub fn unsigned_attributes(&mut self) -> Result<Vec<Attribute>, CmsError> {
        self.attributes(false)
    }

    pub fn has_unsigned_attribute(&mut self, oid: &Oid) -> Result<bool, CmsError> {
        Ok(self.attribute(false, oid)?.is_some())
    }

    pub fn unsigned_attribute(&mut self, oid: &Oid) -> Result<Option<Attribute>, CmsError> {
        self.attribute(false, oid)
    }

    pub fn set_unsigned_attribute(&mut self, attr: &Attribute) -> Result<(), CmsError> {
        self.set_attribute(false, attr)
    }

    /// The S/MIME capabilities signed attribute, in preference order.
    pub fn smime_capabilities(&mut self) -> Result<Option<Vec<SmimeCapability>>, CmsError> {
        let Some(attr) = self.signed_attribute(&known::smime_capabilities())? else {
            return Ok(None);
        };
        let value = attr
            .first_value()
            .ok_or_else(|| CmsError::structure("empty smimeCapabilities attribute"))?;
        Ok(Some(SmimeCapability::decode_list(value)?))
    }

    pub fn set_smime_capabilities(&mut self, caps: &[SmimeCapability]) -> Result<(), CmsError> {
        let attr = Attribute::single(known::smime_capabilities(), SmimeCapability::encode_list(caps));
        self.set_signed_attribute(&attr)
    }

    /// The ESS signing certificate attribute, v2 preferred.
    pub fn signing_certificate(&mut self) -> Result<Option<SigningCertificate>, CmsError> {
        for (oid, v2) in [
            (known::id_aa_signing_certificate_v2(), true),
            (known::id_aa_signing_certificate(), false),
        ] {
            if let Some(attr) = self.signed_attribute(&oid)? {
                let value = attr
                    .first_value()
                    .ok_or_else(|| CmsError::structure("empty signing certificate attribute"))?;
                return Ok(Some(SigningCertificate::decode(value, v2)?));
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Certificates
    // -----------------------------------------------------------------------

    fn matches(&mut self, cert: &Certificate, check_usage: bool) -> Result<bool, CmsError> {
        if let Some(sc) = self.signing_certificate()? {
            match sc.certs.first() {
                Some(id) if id.matches(cert) => {}
                _ => return Ok(false),
            }
        }
        let sid = self.identifier()?;
        let usages: &[u16] = if check_usage { &SIGNING_USAGES } else { &[] };
        Ok(cert.matches_identifier(&sid, usages))
    }

    /// True when `cert` is named by the ESS attribute (if any) and the
    /// signer identifier, and may sign.
    pub fn matches_certificate(&mut self, cert: &Certificate) -> Result<bool, CmsError> {
        self.matches(cert, true)
    }

    /// The signer's certificate among the message certificates.
    pub fn certificate(&mut self) -> Result<Option<Certificate>, CmsError> {
        for cert in self.data.certificates()? {
            if self.matches(&cert, true)? {
                return Ok(Some(cert));
            }
        }
        Ok(None)
    }

    /// Signer certificate carrying the public half of `key`.
    pub(crate) fn certificate_for_key(
        &mut self,
        key: &PrivateKey,
    ) -> Result<Option<Certificate>, CmsError> {
        for cert in self.data.certificates()? {
            if key.matches_public_key(&cert.public_key) && self.matches(&cert, false)? {
                return Ok(Some(cert));
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------------

    /// Switch the digest algorithm, refreshing messageDigest and the ESS
    /// certificate hash.
    pub fn set_hash(&mut self, hash: HashAlgId) -> Result<(), CmsError> {
        let layout = self.layout()?;
        let tree = self.tree();
        let oid_node = tree.expect_child(layout.fields[2], 0, "digest algorithm")?;
        if tree.oid(oid_node)? != hash_to_oid(hash) {
            let fresh = tree.graft(&digest_algorithm_der(hash))?;
            tree.replace(layout.fields[2], fresh)?;
        }

        if layout.signed_attrs.is_some() {
            self.refresh_message_digest(false)?;
            if let Some(mut sc) = self.signing_certificate()? {
                let mut found = None;
                for cert in self.data.certificates()? {
                    if self.matches(&cert, false)? {
                        found = Some(cert);
                        break;
                    }
                }
                let cert = found.ok_or_else(|| {
                    CmsError::InsufficientSetup(
                        "unable to find the certificate named by the signing certificate attribute"
                            .into(),
                    )
                })?;
                let issuer_serial = sc.certs.first().and_then(|c| c.issuer_serial.clone());
                let updated = EssCertId {
                    hash,
                    cert_hash: digest(hash, &cert.raw),
                    issuer_serial,
                };
                match sc.certs.first_mut() {
                    Some(first) => *first = updated,
                    None => sc.certs.push(updated),
                }
                self.set_signed_attribute(&sc.to_attribute())?;
            }
        }
        self.data.recalculate_hash_algorithms()
    }

    fn refresh_message_digest(&mut self, strict: bool) -> Result<(), CmsError> {
        let hash = self.digest_algorithm()?;
        let md = match self.data.content_digest(hash) {
            Ok(md) => md,
            Err(CmsError::InsufficientSetup(_)) if !strict => return Ok(()),
            Err(e) => return Err(e),
        };
        self.set_signed_attribute(&message_digest_attribute(&md))
    }

    /// Set the signature algorithm for `key` and switch to its digest.
    pub fn identify_signature_algorithm(&mut self, key: &PrivateKey) -> Result<(), CmsError> {
        let oid = key.signature_algorithm()?;
        let params = key.signature_algorithm_params();
        let layout = self.layout()?;
        let tree = self.tree();
        let fresh = tree.graft(&enc_alg_id(&oid, params.as_deref()))?;
        tree.replace(layout.signature_algorithm, fresh)?;
        self.set_hash(key.hash())
    }

    /// Bytes the signature covers: the signed attributes as a universal
    /// SET OF, else the content.
    pub fn signable_section(&mut self) -> Result<Vec<u8>, CmsError> {
        let layout = self.layout()?;
        match layout.signed_attrs {
            Some(set) => {
                let mut der = self.tree().encode(set);
                der[0] = tags::SET;
                Ok(der)
            }
            None => self.data.content_bytes(),
        }
    }

    /// Sign with `key`, filling in the algorithms and messageDigest.
    pub fn sign(&mut self, key: &PrivateKey) -> Result<(), CmsError> {
        self.identify_signature_algorithm(key)?;
        if self.has_signed_attributes()? {
            self.refresh_message_digest(true)?;
        }
        let section = self.signable_section()?;
        let signature = key.sign(&section)?;
        self.set_signature(&signature)?;
        debug!(index = self.index, hash = key.hash().name(), "signed");
        Ok(())
    }

    /// Verify this signer. With `check_ca` the certificate must also be
    /// issued by a CA certificate of the message (or be self-issued).
    pub fn validate_signature(&mut self, check_ca: bool) -> Result<bool, CmsError> {
        let hash = self.digest_algorithm()?;
        if self.has_signed_attributes()? {
            let Some(attr) = self.signed_attribute(&known::id_message_digest())? else {
                debug!(index = self.index, "no messageDigest attribute");
                return Ok(false);
            };
            let Some(value) = attr.first_value() else {
                return Ok(false);
            };
            let claimed = parse_message_digest(value)?;
            let actual = self.data.content_digest(hash)?;
            if !bool::from(claimed.as_slice().ct_eq(actual.as_slice())) {
                debug!(index = self.index, "messageDigest mismatch");
                return Ok(false);
            }
        }

        let Some(cert) = self.certificate()? else {
            debug!(index = self.index, "no certificate for signer");
            return Ok(false);
        };
        let sig_oid = self.signature_algorithm()?;
        let (pkey, sig_hash) = signature_oid_parts(&sig_oid)
            .ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("signature {sig_oid}")))?;
        // bare rsaEncryption signs with the signer's digest
        let sig_hash = sig_hash.unwrap_or(hash);
        if cert.public_key.key_type() != Some(pkey) {
            return Ok(false);
        }
        if check_ca && !self.issued_by_ca(&cert)? {
            debug!(index = self.index, "signer certificate has no CA in the message");
            return Ok(false);
        }

        let section = self.signable_section()?;
        let signature = self.signature()?;
        match verify_digest_signature(
            &cert.public_key,
            sig_hash,
            &digest(sig_hash, &section),
            &signature,
        ) {
            Ok(valid) => Ok(valid),
            Err(e) => {
                debug!(index = self.index, error = %e, "signature did not verify");
                Ok(false)
            }
        }
    }

    fn issued_by_ca(&mut self, cert: &Certificate) -> Result<bool, CmsError> {
        for issuer in self.data.certificates()? {
            let same = issuer.raw == cert.raw;
            if cert.issuer != issuer.subject || !(same || issuer.is_ca()) {
                continue;
            }
            match cert.verify_signature(&issuer) {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    debug!(index = self.index, issuer = %issuer.subject, "issuer signature mismatch")
                }
                Err(e) => {
                    warn!(index = self.index, issuer = %issuer.subject, error = %e, "issuer key unusable")
                }
            }
        }
        Ok(false)
    }

    /// Re-point this signer at `cert`: the certificate set, the identifier
    /// (issuer and serial number) and the ESS certificate id follow.
    pub fn copy_signing_x509_attributes(&mut self, cert: &Certificate) -> Result<(), CmsError> {
        let present = self.data.certificates()?.iter().any(|c| c.raw == cert.raw);
        match self.certificate()? {
            Some(old) if !present => {
                let mut users = 0;
                for index in 0..self.data.signer_count()? {
                    if Signer::new(self.data, index).matches_certificate(&old)? {
                        users += 1;
                    }
                }
                if users == 1 {
                    self.data.replace_certificate(&old, cert)?;
                } else {
                    self.data.add_certificate(cert)?;
                }
            }
            _ => {
                self.data.add_certificate(cert)?;
            }
        }

        if let Some(mut sc) = self.signing_certificate()? {
            let hash = sc.certs.first().map_or(HashAlgId::Sha256, |c| c.hash);
            let updated = EssCertId::for_certificate(cert, hash);
            match sc.certs.first_mut() {
                Some(first) => *first = updated,
                None => sc.certs.push(updated),
            }
            self.set_signed_attribute(&sc.to_attribute())?;
        }

        let id = CertIdentifier::from_certificate(cert, IdentifierKind::IssuerAndSerialNumber)?;
        let layout = self.layout()?;
        let tree = self.tree();
        let fresh = tree.graft(&id.to_der())?;
        tree.replace(layout.fields[1], fresh)?;
        set_version(tree, layout.fields[0], 1)?;
        self.data.update_version()
    }
}
