//! DigestedData (RFC 5652 section 7).
//!
//! ```text
//! DigestedData ::= SEQUENCE {
//!     version          CMSVersion,
//!     digestAlgorithm  DigestAlgorithmIdentifier,
//!     encapContentInfo EncapsulatedContentInfo,
//!     digest           Digest }
//! ```

use std::fmt;

use cmskit_crypto::hash::digest;
use cmskit_types::{CmsError, HashAlgId};
use cmskit_utils::asn1::Encoder;
use cmskit_utils::oid::{known, Oid};
use subtle::ConstantTimeEq;
use tracing::debug;

use super::config::CmsConfig;
use super::tree::{NodeId, Tree};
use super::{body_node, content_info_tree, open_content_info, read_algorithm, CmsContent, ContentType};
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_octet};
use crate::oid_mapping::{hash_to_oid, oid_to_hash};

const VERSION: usize = 0;
const DIGEST_ALGORITHM: usize = 1;
const ENCAP_CONTENT_INFO: usize = 2;
const DIGEST: usize = 3;

/// A DigestedData message.
pub struct DigestedData {
    tree: Tree,
    config: CmsConfig,
}

impl fmt::Debug for DigestedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestedData")
            .field("config", &self.config)
            .field("encoded", &self.has_encoded())
            .finish()
    }
}

impl CmsContent for DigestedData {
    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn config(&self) -> &CmsConfig {
        &self.config
    }

    fn content_type(&self) -> ContentType {
        ContentType::DigestedData
    }

    fn compile(&mut self) -> Result<(), CmsError> {
        self.tree.realize()
    }
}

impl DigestedData {
    /// Encapsulate `data` as id-data with its `hash` digest.
    pub fn new(data: &[u8], hash: HashAlgId) -> Result<Self, CmsError> {
        Self::with_config(data, hash, CmsConfig::default())
    }

    pub fn with_config(data: &[u8], hash: HashAlgId, config: CmsConfig) -> Result<Self, CmsError> {
        let mut encap = known::id_data().to_der();
        encap.extend_from_slice(&enc_explicit_ctx(0, &enc_octet(data)));
        let mut body = Encoder::new();
        body.write_uint(0)
            .write_raw(&enc_alg_id(&hash_to_oid(hash), None))
            .write_sequence(&encap)
            .write_octet_string(&digest(hash, data));
        let mut seq = Encoder::new();
        seq.write_sequence(&body.finish());
        let tree = content_info_tree(ContentType::DigestedData, &seq.finish())?;
        debug!(hash = hash.name(), len = data.len(), "built DigestedData");
        Ok(Self { tree, config })
    }

    /// Decode a PEM or DER DigestedData message.
    pub fn load(input: &[u8]) -> Result<Self, CmsError> {
        Self::load_with(input, CmsConfig::default())
    }

    pub fn load_with(input: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let (tree, content_type) = open_content_info(input)?;
        if content_type != ContentType::DigestedData {
            return Err(CmsError::UnsupportedContentType(format!(
                "expected digestedData, found {content_type:?}"
            )));
        }
        Self::from_tree(tree, config)
    }

    pub(crate) fn from_tree(mut tree: Tree, config: CmsConfig) -> Result<Self, CmsError> {
        let body = body_node(&mut tree)?;
        if !tree.tag(body).is_universal(0x10) {
            return Err(CmsError::structure("DigestedData is not a SEQUENCE"));
        }
        let kids = tree.children(body)?;
        if kids.len() != 4 {
            return Err(CmsError::structure(format!(
                "DigestedData has {} fields, expected 4",
                kids.len()
            )));
        }
        let shape = [
            (kids[VERSION], 0x02, "version"),
            (kids[DIGEST_ALGORITHM], 0x10, "digestAlgorithm"),
            (kids[ENCAP_CONTENT_INFO], 0x10, "encapContentInfo"),
            (kids[DIGEST], 0x04, "digest"),
        ];
        for (node, number, what) in shape {
            if !tree.tag(node).is_universal(number) {
                return Err(CmsError::structure(format!("malformed {what}")));
            }
        }
        Ok(Self { tree, config })
    }

    fn field(&mut self, index: usize, what: &str) -> Result<NodeId, CmsError> {
        let body = body_node(&mut self.tree)?;
        self.tree.expect_child(body, index, what)
    }

    pub fn version(&mut self) -> Result<u32, CmsError> {
        let node = self.field(VERSION, "version")?;
        self.tree.uint(node)
    }

    pub fn algorithm(&mut self) -> Result<HashAlgId, CmsError> {
        let node = self.field(DIGEST_ALGORITHM, "digestAlgorithm")?;
        let (oid, _) = read_algorithm(&mut self.tree, node)?;
        oid_to_hash(&oid).ok_or_else(|| CmsError::UnsupportedAlgorithm(format!("digest {oid}")))
    }

    pub fn encapsulated_content_type(&mut self) -> Result<Oid, CmsError> {
        let encap = self.field(ENCAP_CONTENT_INFO, "encapContentInfo")?;
        let oid_node = self.tree.expect_child(encap, 0, "eContentType")?;
        self.tree.oid(oid_node)
    }

    /// The encapsulated content, if present.
    pub fn content(&mut self) -> Result<Option<Vec<u8>>, CmsError> {
        let encap = self.field(ENCAP_CONTENT_INFO, "encapContentInfo")?;
        let Some(explicit) = self.tree.child(encap, 1)? else {
            return Ok(None);
        };
        let octets = self.tree.expect_child(explicit, 0, "eContent")?;
        Ok(Some(self.tree.octets(octets)?))
    }

    /// The stored digest value.
    pub fn digest(&mut self) -> Result<Vec<u8>, CmsError> {
        let node = self.field(DIGEST, "digest")?;
        self.tree.octets(node)
    }

    /// Recompute the digest over the content and compare it in constant time.
    pub fn validate(&mut self) -> Result<bool, CmsError> {
        let hash = self.algorithm()?;
        let content = self.content()?.ok_or_else(|| {
            CmsError::InsufficientSetup("DigestedData carries no content to hash".into())
        })?;
        let expected = self.digest()?;
        let actual = digest(hash, &content);
        let ok = bool::from(actual.as_slice().ct_eq(expected.as_slice()));
        debug!(hash = hash.name(), ok, "validated DigestedData");
        Ok(ok)
    }
}
