//! CMS (Cryptographic Message Syntax, RFC 5652).
//!
//! [`load`] decodes a `ContentInfo` and routes it to one of the message
//! types: [`SignedData`], [`EnvelopedData`] (which also covers
//! `EncryptedData`), [`DigestedData`] and [`CompressedData`]. Every message
//! is backed by a lazily decoded [`tree::Tree`], so messages that are loaded
//! and re-encoded without edits come back byte for byte.

mod attributes;
mod compressed;
mod config;
mod digested;
mod enveloped;
mod recipient;
mod signed;
mod signer;
pub mod tree;

use std::fmt;

use base64::Engine as _;
use cmskit_types::CmsError;
use cmskit_utils::asn1::Encoder;
use cmskit_utils::oid::{known, Oid};
use cmskit_utils::pem;
use tracing::debug;

use tree::{NodeId, Tree};

pub use attributes::{Attribute, EssCertId, IssuerSerial, SigningCertificate, SmimeCapability};
pub use compressed::CompressedData;
pub use config::{CmsConfig, CmsConfigBuilder, OutputFormat};
pub use digested::DigestedData;
pub use enveloped::EnvelopedData;
pub use recipient::{
    KekRecipient, KeyAgreeRecipient, KeyTransRecipient, Originator, OtherRecipient,
    PasswordRecipient, Pbkdf2Params, RecipientEncryptedKey, RecipientInfo, Secret,
};
pub use signed::SignedData;
pub use signer::{Signer, SignerInfo};

/// PEM label for armored messages.
pub const PEM_LABEL: &str = "CMS";

/// Content types a `ContentInfo` may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Data,
    SignedData,
    EnvelopedData,
    EncryptedData,
    DigestedData,
    CompressedData,
}

impl ContentType {
    pub fn oid(self) -> Oid {
        match self {
            Self::Data => known::id_data(),
            Self::SignedData => known::id_signed_data(),
            Self::EnvelopedData => known::id_enveloped_data(),
            Self::EncryptedData => known::id_encrypted_data(),
            Self::DigestedData => known::id_digested_data(),
            Self::CompressedData => known::id_ct_compressed_data(),
        }
    }

    pub fn from_oid(oid: &Oid) -> Option<Self> {
        [
            Self::Data,
            Self::SignedData,
            Self::EnvelopedData,
            Self::EncryptedData,
            Self::DigestedData,
            Self::CompressedData,
        ]
        .into_iter()
        .find(|ct| ct.oid() == *oid)
    }
}

/// Behaviour shared by every message type.
pub trait CmsContent {
    fn tree(&self) -> &Tree;

    fn config(&self) -> &CmsConfig;

    fn content_type(&self) -> ContentType;

    /// Normalize the message by re-parsing its current encoding.
    /// Consecutive calls produce identical encodings.
    fn compile(&mut self) -> Result<(), CmsError>;

    fn to_der(&self) -> Vec<u8> {
        self.tree().encoded()
    }

    fn to_pem(&self) -> String {
        pem::encode(PEM_LABEL, &self.to_der())
    }

    /// Wire bytes in `format`.
    fn encode(&self, format: OutputFormat) -> Vec<u8> {
        match format {
            OutputFormat::Pem => self.to_pem().into_bytes(),
            OutputFormat::Der => self.to_der(),
        }
    }

    /// Text form: PEM, or unarmored base64 for [`OutputFormat::Der`].
    fn to_string_with(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Pem => self.to_pem(),
            OutputFormat::Der => base64::engine::general_purpose::STANDARD.encode(self.to_der()),
        }
    }

    /// True when the message still holds the encoding it was loaded from.
    fn has_encoded(&self) -> bool {
        self.tree().has_encoded(self.tree().root())
    }
}

macro_rules! impl_display {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.to_string_with(self.config().output_format))
                }
            }
        )+
    };
}

impl_display!(SignedData, EnvelopedData, DigestedData, CompressedData);

/// A decoded message of any supported content type.
#[derive(Debug)]
pub enum CmsMessage {
    Signed(SignedData),
    /// EnvelopedData, or EncryptedData when it has no recipients.
    Enveloped(EnvelopedData),
    Digested(DigestedData),
    Compressed(CompressedData),
}

impl CmsMessage {
    fn inner(&self) -> &dyn CmsContent {
        match self {
            Self::Signed(m) => m,
            Self::Enveloped(m) => m,
            Self::Digested(m) => m,
            Self::Compressed(m) => m,
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.inner().content_type()
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.inner().to_der()
    }

    pub fn to_pem(&self) -> String {
        self.inner().to_pem()
    }

    pub fn as_signed(&mut self) -> Option<&mut SignedData> {
        match self {
            Self::Signed(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_enveloped(&mut self) -> Option<&mut EnvelopedData> {
        match self {
            Self::Enveloped(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_digested(&mut self) -> Option<&mut DigestedData> {
        match self {
            Self::Digested(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_compressed(&mut self) -> Option<&mut CompressedData> {
        match self {
            Self::Compressed(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for CmsMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner();
        f.write_str(&inner.to_string_with(inner.config().output_format))
    }
}

/// Decode a PEM or DER message with the default configuration.
pub fn load(input: &[u8]) -> Result<CmsMessage, CmsError> {
    load_with(input, CmsConfig::default())
}

/// Decode a PEM or DER message, attaching `config` to the result.
pub fn load_with(input: &[u8], config: CmsConfig) -> Result<CmsMessage, CmsError> {
    let (tree, content_type) = open_content_info(input)?;
    debug!(?content_type, "loaded ContentInfo");
    Ok(match content_type {
        ContentType::SignedData => CmsMessage::Signed(SignedData::from_tree(tree, config)?),
        ContentType::EnvelopedData | ContentType::EncryptedData => {
            CmsMessage::Enveloped(EnvelopedData::from_tree(tree, config)?)
        }
        ContentType::DigestedData => CmsMessage::Digested(DigestedData::from_tree(tree, config)?),
        ContentType::CompressedData => {
            CmsMessage::Compressed(CompressedData::from_tree(tree, config)?)
        }
        ContentType::Data => {
            return Err(CmsError::UnsupportedContentType(
                "id-data has no message structure".into(),
            ))
        }
    })
}

/// Strip armor, wrap the element in a tree and read its content type.
pub(crate) fn open_content_info(input: &[u8]) -> Result<(Tree, ContentType), CmsError> {
    let der = pem::strip_armor(input).map_err(CmsError::decode)?;
    let mut tree = Tree::from_der(&der)?;
    let root = tree.root();
    if !tree.tag(root).is_universal(0x10) {
        return Err(CmsError::structure("ContentInfo is not a SEQUENCE"));
    }
    let oid_node = tree.expect_child(root, 0, "contentType")?;
    let oid = tree.oid(oid_node)?;
    let content_type = ContentType::from_oid(&oid)
        .ok_or_else(|| CmsError::UnsupportedContentType(oid.to_string()))?;
    let explicit = tree.expect_child(root, 1, "content")?;
    if !tree.tag(explicit).is_context(0) || !tree.tag(explicit).constructed {
        return Err(CmsError::structure("content is not [0] EXPLICIT"));
    }
    tree.expect_child(explicit, 0, "content body")?;
    Ok((tree, content_type))
}

/// Tree for `ContentInfo { contentType, [0] EXPLICIT body }`.
pub(crate) fn content_info_tree(content_type: ContentType, body: &[u8]) -> Result<Tree, CmsError> {
    let mut inner = Encoder::new();
    inner.write_oid(&content_type.oid().to_der_value());
    inner.write_context_specific(0, true, body);
    let mut outer = Encoder::new();
    outer.write_sequence(&inner.finish());
    Tree::from_der(&outer.finish())
}

/// The payload SEQUENCE inside `[0] EXPLICIT`.
pub(crate) fn body_node(tree: &mut Tree) -> Result<NodeId, CmsError> {
    let root = tree.root();
    let explicit = tree.expect_child(root, 1, "content")?;
    tree.expect_child(explicit, 0, "content body")
}

/// Set an INTEGER version node, leaving it untouched when unchanged.
pub(crate) fn set_version(tree: &mut Tree, node: NodeId, version: u32) -> Result<(), CmsError> {
    if tree.uint(node)? == version {
        return Ok(());
    }
    let fresh = tree.new_uint(u64::from(version));
    tree.replace(node, fresh)
}

/// Set the outer `contentType` OID.
pub(crate) fn set_content_type(tree: &mut Tree, content_type: ContentType) -> Result<(), CmsError> {
    let root = tree.root();
    let oid_node = tree.expect_child(root, 0, "contentType")?;
    if tree.oid(oid_node)? == content_type.oid() {
        return Ok(());
    }
    tree.set_content(oid_node, content_type.oid().to_der_value())
}

/// Parse `AlgorithmIdentifier` from a node, returning the OID and the
/// complete parameter encoding.
pub(crate) fn read_algorithm(
    tree: &mut Tree,
    node: NodeId,
) -> Result<(Oid, Option<Vec<u8>>), CmsError> {
    if !tree.tag(node).is_universal(0x10) {
        return Err(CmsError::structure("AlgorithmIdentifier is not a SEQUENCE"));
    }
    let oid_node = tree.expect_child(node, 0, "algorithm")?;
    let oid = tree.oid(oid_node)?;
    let params = tree.child(node, 1)?.map(|p| tree.encode(p));
    Ok((oid, params))
}
