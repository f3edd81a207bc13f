//! CompressedData (RFC 3274), zlib only.
//!
//! ```text
//! CompressedData ::= SEQUENCE {
//!     version              CMSVersion,
//!     compressionAlgorithm CompressionAlgorithmIdentifier,
//!     encapContentInfo     EncapsulatedContentInfo }
//! ```

use std::fmt;
use std::io::{Read, Write};

use cmskit_types::CmsError;
use cmskit_utils::asn1::Encoder;
use cmskit_utils::oid::{known, Oid};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use super::config::CmsConfig;
use super::tree::{NodeId, Tree};
use super::{body_node, content_info_tree, open_content_info, read_algorithm, CmsContent, ContentType};
use crate::encoding::{enc_alg_id, enc_explicit_ctx, enc_octet};

const VERSION: usize = 0;
const COMPRESSION_ALGORITHM: usize = 1;
const ENCAP_CONTENT_INFO: usize = 2;

/// A CompressedData message.
pub struct CompressedData {
    tree: Tree,
    config: CmsConfig,
}

impl fmt::Debug for CompressedData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedData")
            .field("config", &self.config)
            .field("encoded", &self.has_encoded())
            .finish()
    }
}

impl CmsContent for CompressedData {
    fn tree(&self) -> &Tree {
        &self.tree
    }

    fn config(&self) -> &CmsConfig {
        &self.config
    }

    fn content_type(&self) -> ContentType {
        ContentType::CompressedData
    }

    fn compile(&mut self) -> Result<(), CmsError> {
        self.tree.realize()
    }
}

impl CompressedData {
    /// Compress `data` with zlib and encapsulate it as id-data.
    pub fn new(data: &[u8]) -> Result<Self, CmsError> {
        Self::with_config(data, CmsConfig::default())
    }

    pub fn with_config(data: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(data)
            .map_err(|e| CmsError::structure(format!("zlib compression failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| CmsError::structure(format!("zlib compression failed: {e}")))?;

        let mut encap = known::id_data().to_der();
        encap.extend_from_slice(&enc_explicit_ctx(0, &enc_octet(&compressed)));
        let mut body = Encoder::new();
        body.write_uint(0)
            .write_raw(&enc_alg_id(&known::id_alg_zlib_compress(), None))
            .write_sequence(&encap);
        let mut seq = Encoder::new();
        seq.write_sequence(&body.finish());
        let tree = content_info_tree(ContentType::CompressedData, &seq.finish())?;
        debug!(len = data.len(), compressed = compressed.len(), "built CompressedData");
        Ok(Self { tree, config })
    }

    /// Decode a PEM or DER CompressedData message.
    pub fn load(input: &[u8]) -> Result<Self, CmsError> {
        Self::load_with(input, CmsConfig::default())
    }

    pub fn load_with(input: &[u8], config: CmsConfig) -> Result<Self, CmsError> {
        let (tree, content_type) = open_content_info(input)?;
        if content_type != ContentType::CompressedData {
            return Err(CmsError::UnsupportedContentType(format!(
                "expected compressedData, found {content_type:?}"
            )));
        }
        Self::from_tree(tree, config)
    }

    pub(crate) fn from_tree(mut tree: Tree, config: CmsConfig) -> Result<Self, CmsError> {
        let body = body_node(&mut tree)?;
        if !tree.tag(body).is_universal(0x10) {
            return Err(CmsError::structure("CompressedData is not a SEQUENCE"));
        }
        let kids = tree.children(body)?;
        if kids.len() != 3 {
            return Err(CmsError::structure(format!(
                "CompressedData has {} fields, expected 3",
                kids.len()
            )));
        }
        let shape = [
            (kids[VERSION], 0x02, "version"),
            (kids[COMPRESSION_ALGORITHM], 0x10, "compressionAlgorithm"),
            (kids[ENCAP_CONTENT_INFO], 0x10, "encapContentInfo"),
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

    pub fn algorithm(&mut self) -> Result<Oid, CmsError> {
        let node = self.field(COMPRESSION_ALGORITHM, "compressionAlgorithm")?;
        Ok(read_algorithm(&mut self.tree, node)?.0)
    }

    pub fn encapsulated_content_type(&mut self) -> Result<Oid, CmsError> {
        let encap = self.field(ENCAP_CONTENT_INFO, "encapContentInfo")?;
        let oid_node = self.tree.expect_child(encap, 0, "eContentType")?;
        self.tree.oid(oid_node)
    }

    /// The compressed octets as stored.
    pub fn compressed_content(&mut self) -> Result<Option<Vec<u8>>, CmsError> {
        let encap = self.field(ENCAP_CONTENT_INFO, "encapContentInfo")?;
        let Some(explicit) = self.tree.child(encap, 1)? else {
            return Ok(None);
        };
        let octets = self.tree.expect_child(explicit, 0, "eContent")?;
        Ok(Some(self.tree.octets(octets)?))
    }

    /// The decompressed content.
    pub fn content(&mut self) -> Result<Vec<u8>, CmsError> {
        let alg = self.algorithm()?;
        if alg != known::id_alg_zlib_compress() {
            return Err(CmsError::UnsupportedAlgorithm(format!("compression {alg}")));
        }
        let compressed = self.compressed_content()?.ok_or_else(|| {
            CmsError::InsufficientSetup("CompressedData carries no content".into())
        })?;
        let mut out = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| CmsError::decode(format!("zlib stream: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_roundtrip() {
        let text = b"hello, world!".repeat(40);
        let mut msg = CompressedData::new(&text).unwrap();
        assert_eq!(msg.version().unwrap(), 0);
        assert_eq!(msg.algorithm().unwrap(), known::id_alg_zlib_compress());
        let stored = msg.compressed_content().unwrap().unwrap();
        assert!(stored.len() < text.len());
        // zlib header, deflate with a 32K window
        assert_eq!(stored[0], 0x78);

        let mut loaded = CompressedData::load(msg.to_pem().as_bytes()).unwrap();
        assert_eq!(loaded.content().unwrap(), text);
        assert_eq!(loaded.encapsulated_content_type().unwrap(), known::id_data());
    }

    #[test]
    fn test_compressed_empty_content() {
        let mut msg = CompressedData::new(b"").unwrap();
        assert!(msg.content().unwrap().is_empty());
    }

    #[test]
    fn test_compressed_unknown_algorithm() {
        let mut encap = known::id_data().to_der();
        encap.extend_from_slice(&enc_explicit_ctx(0, &enc_octet(b"xx")));
        let mut body = Encoder::new();
        body.write_uint(0)
            .write_raw(&enc_alg_id(&Oid::new(&[1, 2, 3, 4]), None))
            .write_sequence(&encap);
        let mut seq = Encoder::new();
        seq.write_sequence(&body.finish());
        let tree = content_info_tree(ContentType::CompressedData, &seq.finish()).unwrap();
        let mut msg = CompressedData::from_tree(tree, CmsConfig::default()).unwrap();
        assert!(matches!(
            msg.content().unwrap_err(),
            CmsError::UnsupportedAlgorithm(_)
        ));
    }

    #[test]
    fn test_compressed_corrupt_stream() {
        let mut encap = known::id_data().to_der();
        encap.extend_from_slice(&enc_explicit_ctx(0, &enc_octet(&[0x78, 0x9c, 0xff, 0xff])));
        let mut body = Encoder::new();
        body.write_uint(0)
            .write_raw(&enc_alg_id(&known::id_alg_zlib_compress(), None))
            .write_sequence(&encap);
        let mut seq = Encoder::new();
        seq.write_sequence(&body.finish());
        let tree = content_info_tree(ContentType::CompressedData, &seq.finish()).unwrap();
        let mut msg = CompressedData::from_tree(tree, CmsConfig::default()).unwrap();
        assert!(matches!(msg.content().unwrap_err(), CmsError::Decode(_)));
    }

    #[test]
    fn test_compressed_rejects_other_types() {
        let digested =
            crate::cms::DigestedData::new(b"x", cmskit_types::HashAlgId::Sha256).unwrap();
        assert!(matches!(
            CompressedData::load(&digested.to_der()).unwrap_err(),
            CmsError::UnsupportedContentType(_)
        ));
    }
}
